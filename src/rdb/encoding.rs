//! Byte-level primitives of the snapshot format: a bounds-checked cursor,
//! the variable-width length encoding, and string reads (including the
//! integer-as-string special encodings).

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("unexpected end of snapshot at byte {0}")]
    UnexpectedEof(usize),
    #[error("snapshot does not start with the REDIS magic string")]
    InvalidMagic,
    #[error("unknown value type {0:#04x} at byte {1}")]
    UnknownValueType(u8, usize),
    #[error("unsupported string encoding {0:#04x}")]
    UnsupportedEncoding(u8),
    #[error("snapshot contains an invalid UTF-8 string")]
    InvalidString,
}

pub struct Cursor<'a> {
    bytes: &'a [u8],
    position: usize,
}

/// A decoded length field: either a plain byte count or one of the special
/// string encodings.
pub enum LengthValue {
    Length(usize),
    Encoded(u8),
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], RdbError> {
        if self.position + count > self.bytes.len() {
            return Err(RdbError::UnexpectedEof(self.position));
        }

        let slice = &self.bytes[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, RdbError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32, RdbError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, RdbError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Decodes a length field. The top two bits select the width: 6-bit
    /// immediate, 14-bit big-endian, 32-bit big-endian, or a special string
    /// encoding tag.
    pub fn read_length(&mut self) -> Result<LengthValue, RdbError> {
        let first = self.read_u8()?;

        match first >> 6 {
            0b00 => Ok(LengthValue::Length((first & 0x3F) as usize)),
            0b01 => {
                let second = self.read_u8()?;
                Ok(LengthValue::Length(
                    (((first & 0x3F) as usize) << 8) | second as usize,
                ))
            }
            0b10 => {
                let bytes = self.take(4)?;
                Ok(LengthValue::Length(u32::from_be_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3],
                ]) as usize))
            }
            _ => Ok(LengthValue::Encoded(first & 0x3F)),
        }
    }

    /// Reads a string: either `length` raw bytes or an integer special
    /// encoding rendered in decimal.
    pub fn read_string(&mut self) -> Result<String, RdbError> {
        match self.read_length()? {
            LengthValue::Length(length) => {
                let bytes = self.take(length)?;
                String::from_utf8(bytes.to_vec()).map_err(|_| RdbError::InvalidString)
            }
            LengthValue::Encoded(0) => {
                let value = self.read_u8()? as i8;
                Ok(value.to_string())
            }
            LengthValue::Encoded(1) => {
                let bytes = self.take(2)?;
                Ok(i16::from_le_bytes([bytes[0], bytes[1]]).to_string())
            }
            LengthValue::Encoded(2) => {
                let bytes = self.take(4)?;
                Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).to_string())
            }
            LengthValue::Encoded(tag) => Err(RdbError::UnsupportedEncoding(tag)),
        }
    }
}
