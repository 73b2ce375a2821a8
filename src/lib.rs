//! A Redis-compatible in-memory data store.
//!
//! Speaks RESP over TCP and supports:
//!
//! - String, list, stream, and sorted-set (including geo) entries with
//!   lazy expiry
//! - Blocking reads (BLPOP, XREAD BLOCK) with FIFO wakeups
//! - Transactions (MULTI/EXEC/DISCARD) and pub/sub
//! - Primary→replica replication with full resynchronization, byte-accurate
//!   offset accounting, and the WAIT acknowledgement barrier
//! - Optional append-only durability with three fsync policies, and
//!   snapshot-file loading at startup
//!
//! Concurrency follows one task per connection on Tokio; the keyspace,
//! waiter registries, and replication state are the shared resources, each
//! behind its own lock, held together for the duration of a command.

pub mod aof;
pub mod commands;
pub mod connection;
pub mod geo;
pub mod handshake;
pub mod key_value_store;
pub mod rdb;
pub mod resp;
pub mod server;
pub mod state;
