//! The chunk format shared with the log pipeline: concatenated msgpack `[tag, time, record]`
//! arrays.
use std::io::Cursor;

use serde_json::Value;

use crate::error::ChunkError;
use crate::event::{is_truthy, InboundRecord, Properties};

/// Serialize one entry. In import mode an integer `time` carried by the record replaces the
/// pipeline's timestamp, so back-dated events keep their original time.
pub fn format(
    tag: &str,
    time: i64,
    record: &Properties,
    use_import: bool,
) -> Result<Vec<u8>, ChunkError> {
    let time = if use_import {
        record
            .get("time")
            .filter(|v| is_truthy(v))
            .and_then(Value::as_i64)
            .unwrap_or(time)
    } else {
        time
    };

    Ok(rmp_serde::to_vec(&(tag, time, record))?)
}

/// Serialize a whole chunk.
pub fn encode_chunk(records: &[InboundRecord], use_import: bool) -> Result<Vec<u8>, ChunkError> {
    let mut chunk = Vec::new();
    for r in records {
        chunk.extend(format(&r.tag, r.time, &r.record, use_import)?);
    }
    Ok(chunk)
}

pub fn decode_chunk(bytes: &[u8]) -> Result<Vec<InboundRecord>, ChunkError> {
    let mut cursor = Cursor::new(bytes);
    let mut records = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let (tag, time, record): (String, i64, Properties) = rmp_serde::from_read(&mut cursor)
            .map_err(|source| ChunkError::Decode {
                index: records.len(),
                source,
            })?;
        records.push(InboundRecord::new(tag, time, record));
    }

    Ok(records)
}
