//! Minimal columnar frame used for synthetic partitions
//!
//! Every column holds `i64` values. A frame may carry an index column that is
//! kept apart from the regular columns, the way a dataframe index is: it does
//! not show up in [`Frame::schema`] and is dropped by joins.

use serde::{Deserialize, Serialize};

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Int64,
}

impl DType {
    /// Width of one value in bytes
    pub fn itemsize(&self) -> usize {
        match self {
            DType::Int64 => 8,
        }
    }
}

/// A named, typed column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: DType,
}

impl Field {
    pub fn int64(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: DType::Int64,
        }
    }
}

/// Ordered column descriptors of a frame or dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Sum of the byte widths of all columns (one row)
    pub fn row_width(&self) -> usize {
        self.fields.iter().map(|f| f.dtype.itemsize()).sum()
    }

    /// Schema without the named column
    pub fn without(&self, name: &str) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| f.name != name)
                .cloned()
                .collect(),
        }
    }

    /// Output schema of an equi-join on `on`
    ///
    /// The join column comes first, then the remaining left columns, then the
    /// remaining right columns. Names present on both sides get `_x`/`_y`
    /// suffixes.
    pub fn joined(&self, right: &Schema, on: &str) -> Self {
        let mut fields = vec![Field::int64(on)];
        for f in self.fields.iter().filter(|f| f.name != on) {
            let name = if right.contains(&f.name) {
                format!("{}_x", f.name)
            } else {
                f.name.clone()
            };
            fields.push(Field { name, dtype: f.dtype });
        }
        for f in right.fields.iter().filter(|f| f.name != on) {
            let name = if self.contains(&f.name) {
                format!("{}_y", f.name)
            } else {
                f.name.clone()
            };
            fields.push(Field { name, dtype: f.dtype });
        }
        Self { fields }
    }
}

/// A single named column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub values: Vec<i64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// One partition's worth of rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    columns: Vec<Column>,
    index: Option<Column>,
}

impl Frame {
    /// Build a frame from columns of equal length
    ///
    /// Returns `None` if the column lengths differ.
    pub fn new(columns: Vec<Column>) -> Option<Self> {
        if let Some(first) = columns.first() {
            if columns.iter().any(|c| c.values.len() != first.values.len()) {
                return None;
            }
        }
        Some(Self {
            columns,
            index: None,
        })
    }

    /// Empty frame with the columns of `schema`
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema
                .fields()
                .iter()
                .map(|f| Column::new(f.name.clone(), Vec::new()))
                .collect(),
            index: None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns
            .first()
            .or(self.index.as_ref())
            .map(|c| c.values.len())
            .unwrap_or(0)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[i64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn index(&self) -> Option<&Column> {
        self.index.as_ref()
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::int64(c.name.clone()))
                .collect(),
        )
    }

    /// Size of the column data in bytes (index included)
    pub fn nbytes(&self) -> usize {
        let cols: usize = self.columns.iter().map(|c| c.values.len()).sum();
        let index = self.index.as_ref().map(|c| c.values.len()).unwrap_or(0);
        (cols + index) * DType::Int64.itemsize()
    }

    /// Remove a column, returning `false` if it does not exist
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        self.columns.len() != before
    }

    /// Move a column into the index and sort rows by it
    pub fn set_index(&mut self, name: &str) -> bool {
        let Some(pos) = self.columns.iter().position(|c| c.name == name) else {
            return false;
        };
        let index = self.columns.remove(pos);
        let mut order: Vec<usize> = (0..index.values.len()).collect();
        order.sort_by_key(|&i| index.values[i]);
        self.index = Some(index);
        self.take_rows(&order);
        true
    }

    /// Attach an index without reordering (used when decoding)
    pub(crate) fn with_index(mut self, index: Option<Column>) -> Self {
        self.index = index;
        self
    }

    /// Keep only the given rows, in the given order
    pub fn take_rows(&mut self, rows: &[usize]) {
        for column in self.columns.iter_mut().chain(self.index.iter_mut()) {
            column.values = rows.iter().map(|&r| column.values[r]).collect();
        }
    }

    /// New frame holding the given rows, in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Frame {
        let mut out = self.clone();
        out.take_rows(rows);
        out
    }

    /// Append the rows of `other`, matching columns by name
    ///
    /// Returns `false` (and leaves `self` untouched) on a column mismatch.
    pub fn append(&mut self, other: &Frame) -> bool {
        if self.columns.len() != other.columns.len()
            || self.index.is_some() != other.index.is_some()
        {
            return false;
        }
        let mut sources = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match other.column(&column.name) {
                Some(values) => sources.push(values),
                None => return false,
            }
        }
        for (column, values) in self.columns.iter_mut().zip(sources) {
            column.values.extend_from_slice(values);
        }
        if let (Some(mine), Some(theirs)) = (self.index.as_mut(), other.index.as_ref()) {
            mine.values.extend_from_slice(&theirs.values);
        }
        true
    }

    /// Concatenate frames that share a schema
    pub fn concat(schema: &Schema, frames: &[Frame]) -> Option<Frame> {
        let mut iter = frames.iter();
        let mut out = match iter.next() {
            Some(first) => first.clone(),
            None => return Some(Frame::empty(schema)),
        };
        for frame in iter {
            if !out.append(frame) {
                return None;
            }
        }
        Some(out)
    }
}
