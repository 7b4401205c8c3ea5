//! Row routing, wire encoding, and local joins for the in-process engine

use crate::error::ClusterError;
use crate::frame::{Column, Frame, Schema};
use bytes::{Buf, BufMut, BytesMut};
use std::collections::HashMap;

/// Output partition for `key` among `n` partitions
pub(crate) fn hash_partition(key: i64, n: usize) -> usize {
    // splitmix64 finalizer
    let mut z = key as u64;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z % n as u64) as usize
}

fn route(frame: &Frame, targets: Vec<usize>, n: usize) -> Vec<Frame> {
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (row, target) in targets.into_iter().enumerate() {
        rows[target].push(row);
    }
    rows.iter().map(|r| frame.select_rows(r)).collect()
}

fn column_or_err<'a>(frame: &'a Frame, column: &str) -> Result<&'a [i64], ClusterError> {
    frame
        .column(column)
        .ok_or_else(|| ClusterError::unknown_column(column))
}

/// Split a frame into `n` pieces by hashing `column`
pub(crate) fn split_by_hash(
    frame: &Frame,
    column: &str,
    n: usize,
) -> Result<Vec<Frame>, ClusterError> {
    let values = column_or_err(frame, column)?;
    let targets = values.iter().map(|&v| hash_partition(v, n)).collect();
    Ok(route(frame, targets, n))
}

/// Partition a value falls into given sorted `divisions`
///
/// Values below the first division land in the first partition, values at or
/// above the last one land in the last partition.
pub(crate) fn division_of(value: i64, divisions: &[i64]) -> usize {
    let parts = divisions.len().saturating_sub(1).max(1);
    divisions
        .partition_point(|&d| d <= value)
        .saturating_sub(1)
        .min(parts - 1)
}

/// Split a frame into range partitions of `column`
pub(crate) fn split_by_divisions(
    frame: &Frame,
    column: &str,
    divisions: &[i64],
) -> Result<Vec<Frame>, ClusterError> {
    let values = column_or_err(frame, column)?;
    let n = divisions.len().saturating_sub(1).max(1);
    let targets = values.iter().map(|&v| division_of(v, divisions)).collect();
    Ok(route(frame, targets, n))
}

/// `n` equal-width divisions covering `[lo, hi]`
pub(crate) fn uniform_divisions(lo: i64, hi: i64, n: usize) -> Vec<i64> {
    let n = n.max(1);
    let span = hi as i128 - lo as i128;
    (0..=n)
        .map(|k| (lo as i128 + span * k as i128 / n as i128) as i64)
        .collect()
}

/// Inner hash join of two co-located frames
///
/// The output follows `out_schema`: join column, left columns, right columns.
pub(crate) fn hash_join(
    left: &Frame,
    right: &Frame,
    on: &str,
    out_schema: &Schema,
) -> Result<Frame, ClusterError> {
    let left_keys = column_or_err(left, on)?;
    let right_keys = column_or_err(right, on)?;

    let mut table: HashMap<i64, Vec<usize>> = HashMap::with_capacity(right_keys.len());
    for (row, &key) in right_keys.iter().enumerate() {
        table.entry(key).or_default().push(row);
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for (row, key) in left_keys.iter().enumerate() {
        if let Some(matches) = table.get(key) {
            for &m in matches {
                left_rows.push(row);
                right_rows.push(m);
            }
        }
    }

    let gather = |values: &[i64], rows: &[usize]| -> Vec<i64> {
        rows.iter().map(|&r| values[r]).collect()
    };
    let sources = left
        .columns()
        .iter()
        .filter(|c| c.name != on)
        .map(|c| (c, left_rows.as_slice()))
        .chain(
            right
                .columns()
                .iter()
                .filter(|c| c.name != on)
                .map(|c| (c, right_rows.as_slice())),
        );

    let mut columns = vec![Column::new(on, gather(left_keys, left_rows.as_slice()))];
    for (field, (source, rows)) in out_schema.fields().iter().skip(1).zip(sources) {
        columns.push(Column::new(field.name.clone(), gather(&source.values, rows)));
    }
    if columns.len() != out_schema.len() {
        return Err(ClusterError::materialization(
            "join",
            format!(
                "expected {} output columns, produced {}",
                out_schema.len(),
                columns.len()
            ),
        ));
    }
    Frame::new(columns)
        .ok_or_else(|| ClusterError::materialization("join", "ragged output columns"))
}

/// Encoded size of a frame in bytes
pub(crate) fn encoded_len(frame: &Frame) -> usize {
    let column_len = |c: &Column| 2 + c.name.len() + 8 * c.values.len();
    let header = 4 + 1 + 8;
    header
        + frame.columns().iter().map(column_len).sum::<usize>()
        + frame.index().map(column_len).unwrap_or(0)
}

fn put_column(buf: &mut BytesMut, column: &Column) {
    buf.put_u16_le(column.name.len() as u16);
    buf.put_slice(column.name.as_bytes());
    for &v in &column.values {
        buf.put_i64_le(v);
    }
}

/// Serialize a frame into `buf`
///
/// Layout: `u32` column count, `u8` index flag, `u64` row count, then each
/// column (index last) as `u16` name length, name, row count `i64` values.
pub(crate) fn encode_into(frame: &Frame, buf: &mut BytesMut) {
    buf.reserve(encoded_len(frame));
    buf.put_u32_le(frame.columns().len() as u32);
    buf.put_u8(u8::from(frame.index().is_some()));
    buf.put_u64_le(frame.num_rows() as u64);
    for column in frame.columns() {
        put_column(buf, column);
    }
    if let Some(index) = frame.index() {
        put_column(buf, index);
    }
}

fn truncated(what: &str) -> ClusterError {
    ClusterError::materialization("decode", format!("truncated {}", what))
}

fn get_column(buf: &mut &[u8], rows: usize) -> Result<Column, ClusterError> {
    if buf.remaining() < 2 {
        return Err(truncated("column header"));
    }
    let name_len = buf.get_u16_le() as usize;
    if buf.remaining() < name_len {
        return Err(truncated("column name"));
    }
    let name = String::from_utf8(buf[..name_len].to_vec())
        .map_err(|e| ClusterError::materialization("decode", e.to_string()))?;
    buf.advance(name_len);
    if buf.remaining() < rows * 8 {
        return Err(truncated("column values"));
    }
    let values = (0..rows).map(|_| buf.get_i64_le()).collect();
    Ok(Column::new(name, values))
}

/// Deserialize a frame written by [`encode_into`]
pub(crate) fn decode(mut buf: &[u8]) -> Result<Frame, ClusterError> {
    if buf.remaining() < 13 {
        return Err(truncated("frame header"));
    }
    let ncols = buf.get_u32_le() as usize;
    let has_index = buf.get_u8() != 0;
    let rows = buf.get_u64_le() as usize;

    let mut columns = Vec::with_capacity(ncols);
    for _ in 0..ncols {
        columns.push(get_column(&mut buf, rows)?);
    }
    let index = if has_index {
        Some(get_column(&mut buf, rows)?)
    } else {
        None
    };
    let frame = Frame::new(columns)
        .ok_or_else(|| ClusterError::materialization("decode", "ragged columns"))?;
    Ok(frame.with_index(index))
}
