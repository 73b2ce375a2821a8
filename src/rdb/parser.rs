//! The snapshot reader: header, metadata, database sections, expiry
//! prefixes, and string values. Keys that are already expired at load time
//! are dropped.

use std::collections::HashMap;

use crate::key_value_store::{now_ms, DataType, Value};
use crate::rdb::encoding::{Cursor, LengthValue, RdbError};

const OPCODE_METADATA: u8 = 0xFA;
const OPCODE_RESIZE_DB: u8 = 0xFB;
const OPCODE_EXPIRY_MS: u8 = 0xFC;
const OPCODE_EXPIRY_SECONDS: u8 = 0xFD;
const OPCODE_SELECT_DB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;

const VALUE_TYPE_STRING: u8 = 0x00;

#[derive(Debug, Default, PartialEq)]
pub struct RdbContents {
    pub version: String,
    pub metadata: HashMap<String, String>,
    pub entries: Vec<(String, Value)>,
}

/// Decodes a complete snapshot image.
pub fn parse(bytes: &[u8]) -> Result<RdbContents, RdbError> {
    let mut cursor = Cursor::new(bytes);

    if cursor.take(5)? != b"REDIS" {
        return Err(RdbError::InvalidMagic);
    }
    let version =
        String::from_utf8(cursor.take(4)?.to_vec()).map_err(|_| RdbError::InvalidString)?;

    let mut contents = RdbContents {
        version,
        ..RdbContents::default()
    };

    let load_time = now_ms();
    let mut pending_expiry: Option<i64> = None;

    while !cursor.is_at_end() {
        let opcode = cursor.read_u8()?;

        match opcode {
            OPCODE_METADATA => {
                let key = cursor.read_string()?;
                let value = cursor.read_string()?;
                contents.metadata.insert(key, value);
            }
            OPCODE_SELECT_DB => {
                // Single-database store: the index is read and ignored.
                let _ = cursor.read_length()?;
            }
            OPCODE_RESIZE_DB => {
                let _ = read_plain_length(&mut cursor)?;
                let _ = read_plain_length(&mut cursor)?;
            }
            OPCODE_EXPIRY_SECONDS => {
                pending_expiry = Some(cursor.read_u32_le()? as i64 * 1000);
            }
            OPCODE_EXPIRY_MS => {
                pending_expiry = Some(cursor.read_u64_le()? as i64);
            }
            OPCODE_EOF => {
                let _ = cursor.take(8)?;
                break;
            }
            value_type => {
                let expires_at = pending_expiry.take();
                let (key, value) = read_key_value(&mut cursor, value_type)?;

                let entry = Value {
                    data: value,
                    expires_at,
                };
                if !entry.is_expired(load_time) {
                    contents.entries.push((key, entry));
                }
            }
        }
    }

    Ok(contents)
}

fn read_key_value(cursor: &mut Cursor, value_type: u8) -> Result<(String, DataType), RdbError> {
    let opcode_position = cursor.position().saturating_sub(1);

    match value_type {
        VALUE_TYPE_STRING => {
            let key = cursor.read_string()?;
            let value = cursor.read_string()?;
            Ok((key, DataType::String(value)))
        }
        other => Err(RdbError::UnknownValueType(other, opcode_position)),
    }
}

fn read_plain_length(cursor: &mut Cursor) -> Result<usize, RdbError> {
    match cursor.read_length()? {
        LengthValue::Length(length) => Ok(length),
        LengthValue::Encoded(tag) => Err(RdbError::UnsupportedEncoding(tag)),
    }
}
