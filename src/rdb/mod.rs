//! Snapshot (RDB) file support: a reader for the subset of the format this
//! store consumes, and the minimal snapshot a primary embeds in a full
//! resynchronization.

mod encoding;
mod parser;

pub use encoding::RdbError;
pub use parser::{parse, RdbContents};

/// A minimal valid snapshot: magic + version header, end-of-file opcode,
/// and a zero checksum (which readers treat as "checksum disabled").
pub fn empty_snapshot() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(18);
    bytes.extend_from_slice(b"REDIS0011");
    bytes.push(0xFF);
    bytes.extend_from_slice(&[0u8; 8]);
    bytes
}
