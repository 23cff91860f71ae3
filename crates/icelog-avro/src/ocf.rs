//! A hand-rolled Avro Object Container File (OCF) writer and header reader.
//!
//! `apache-avro`'s own [`apache_avro::Writer`] regenerates the schema JSON
//! from its parsed, in-memory `Schema` when it writes the file header, and
//! drops any attribute it does not recognise — including the Iceberg
//! `field-id`/`element-id`/`key-id`/`value-id` annotations this crate needs
//! to preserve byte-for-byte. So the header here is
//! built by hand from the exact schema text the caller supplies; only the
//! data blocks are encoded through `apache_avro::to_avro_datum`, which is a
//! pure codec and has no schema-text output of its own to corrupt.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use apache_avro::types::Value;
use apache_avro::Schema;

use icelog_core::error::SyncError;
use icelog_core::Result;

const MAGIC: &[u8; 4] = b"Obj\x01";

fn encode_zigzag_varint(n: i64) -> Vec<u8> {
    let mut zigzag = ((n << 1) ^ (n >> 63)) as u64;
    let mut out = Vec::new();
    loop {
        let mut byte = (zigzag & 0x7f) as u8;
        zigzag >>= 7;
        if zigzag != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if zigzag == 0 {
            break;
        }
    }
    out
}

fn decode_zigzag_varint(bytes: &[u8], pos: &mut usize) -> i64 {
    let mut result: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = bytes[*pos];
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    ((result >> 1) as i64) ^ -((result & 1) as i64)
}

fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = encode_zigzag_varint(data.len() as i64);
    out.extend_from_slice(data);
    out
}

fn decode_bytes(bytes: &[u8], pos: &mut usize) -> Vec<u8> {
    let len = decode_zigzag_varint(bytes, pos) as usize;
    let out = bytes[*pos..*pos + len].to_vec();
    *pos += len;
    out
}

/// Writes a complete OCF file: header with the literal `schema_json` text,
/// followed by one data block holding `records` encoded against `schema`.
pub fn write_container(
    path: &Path,
    schema_json: &str,
    schema: &Schema,
    records: &[Value],
) -> Result<i64> {
    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);

    // header metadata map: one block of two key/value pairs, then terminator.
    buf.extend(encode_zigzag_varint(2));
    buf.extend(encode_bytes(b"avro.schema"));
    buf.extend(encode_bytes(schema_json.as_bytes()));
    buf.extend(encode_bytes(b"avro.codec"));
    buf.extend(encode_bytes(b"null"));
    buf.extend(encode_zigzag_varint(0));

    let sync_marker = *uuid::Uuid::new_v4().as_bytes();
    buf.extend_from_slice(&sync_marker);

    let mut body = Vec::new();
    for record in records {
        let datum = apache_avro::to_avro_datum(schema, record.clone())
            .map_err(|e| SyncError::AvroWriteFailed { source: e.into() })?;
        body.extend(datum);
    }

    buf.extend(encode_zigzag_varint(records.len() as i64));
    buf.extend(encode_zigzag_varint(body.len() as i64));
    buf.extend(body);
    buf.extend_from_slice(&sync_marker);

    let mut file = File::create(path).map_err(SyncError::Io)?;
    file.write_all(&buf).map_err(SyncError::Io)?;

    Ok(buf.len() as i64)
}

/// Reads back the raw schema JSON text embedded in an OCF file's header,
/// exactly as the writer stored it (no round-trip through a parsed `Schema`).
pub fn read_schema_json(path: &Path) -> Result<String> {
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(SyncError::Io)?
        .read_to_end(&mut bytes)
        .map_err(SyncError::Io)?;

    if bytes.len() < 4 || &bytes[0..4] != MAGIC {
        return Err(SyncError::AvroWriteFailed {
            source: anyhow::anyhow!("not an Avro object container file: {}", path.display()),
        });
    }

    let mut pos = 4usize;
    let mut schema_json = None;
    loop {
        let count = decode_zigzag_varint(&bytes, &mut pos);
        if count == 0 {
            break;
        }
        let entries = count.unsigned_abs() as usize;
        for _ in 0..entries {
            let key = decode_bytes(&bytes, &mut pos);
            let value = decode_bytes(&bytes, &mut pos);
            if key == b"avro.schema" {
                schema_json = Some(String::from_utf8_lossy(&value).into_owned());
            }
        }
    }

    schema_json.ok_or_else(|| SyncError::AvroWriteFailed {
        source: anyhow::anyhow!("avro.schema metadata missing in {}", path.display()),
    })
}

/// Reads all records out of an OCF file by delegating the data-block codec
/// to `apache_avro`'s own reader, parsing the schema from the embedded text.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let schema_json = read_schema_json(path)?;
    let schema = Schema::parse_str(&schema_json)
        .map_err(|e| SyncError::AvroWriteFailed { source: e.into() })?;
    let file = File::open(path).map_err(SyncError::Io)?;
    let reader = apache_avro::Reader::with_schema(&schema, file)
        .map_err(|e| SyncError::AvroWriteFailed { source: e.into() })?;
    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SyncError::AvroWriteFailed { source: e.into() })
}
