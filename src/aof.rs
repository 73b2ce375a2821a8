//! Append-only durability log.
//!
//! Accepted primary-side writes are appended in their RESP wire form. Three
//! fsync policies govern when the file is forced to disk: `always` before
//! the client sees its reply, `everysec` from a background tick, `no` never.
//! On startup the log is replayed through the normal dispatch path with the
//! replay context set, so nothing is re-propagated or re-appended.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::warn;

use crate::commands::{CommandHandler, ExecutionContext};
use crate::key_value_store::KeyValueStore;
use crate::resp::parse_frame;
use crate::server::RedisServer;
use crate::state::State;

/// Connection identity used when replaying the log.
const REPLAY_ADDRESS: &str = "aof-replay";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    Always,
    EverySec,
    No,
}

impl FsyncPolicy {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "always" => Some(FsyncPolicy::Always),
            "everysec" => Some(FsyncPolicy::EverySec),
            "no" => Some(FsyncPolicy::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FsyncPolicy::Always => "always",
            FsyncPolicy::EverySec => "everysec",
            FsyncPolicy::No => "no",
        }
    }
}

#[derive(Debug)]
pub struct AofWriter {
    path: PathBuf,
    file: File,
    policy: FsyncPolicy,
    dirty: bool,
    last_sync: Instant,
}

impl AofWriter {
    pub async fn open(path: &Path, policy: FsyncPolicy) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            policy,
            dirty: false,
            last_sync: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one wire-encoded command. Under `always` the write is
    /// fsynced before returning, which is before the client reply goes out.
    pub async fn append(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.file.write_all(bytes).await?;
        self.dirty = true;

        if self.policy == FsyncPolicy::Always {
            self.sync().await?;
        }

        Ok(())
    }

    /// Background tick for `everysec`: fsync when at least a second of
    /// unsynced writes has accumulated.
    pub async fn tick(&mut self) -> std::io::Result<()> {
        if self.policy == FsyncPolicy::EverySec
            && self.dirty
            && self.last_sync.elapsed() >= Duration::from_secs(1)
        {
            self.sync().await?;
        }

        Ok(())
    }

    async fn sync(&mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        self.dirty = false;
        self.last_sync = Instant::now();
        Ok(())
    }
}

/// Replays an existing log before the server accepts clients.
///
/// Each complete frame dispatches like a freshly received command under the
/// replay context. A malformed or truncated frame stops the replay at that
/// offset with a warning; the file is left untouched. Returns the number of
/// commands applied.
pub async fn replay(
    path: &Path,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    server: &Arc<RwLock<RedisServer>>,
) -> std::io::Result<usize> {
    let bytes = tokio::fs::read(path).await?;

    let mut store_guard = store.lock().await;
    let mut state_guard = state.lock().await;
    let mut server_guard = server.write().await;

    let ctx = ExecutionContext::aof_replay();
    let mut cursor = 0;
    let mut applied = 0;

    while cursor < bytes.len() {
        match parse_frame(&bytes[cursor..]) {
            Ok(Some((frame, consumed))) => {
                cursor += consumed;

                match CommandHandler::new(frame) {
                    Ok(command) => match command.apply(
                        &ctx,
                        REPLAY_ADDRESS,
                        &mut store_guard,
                        &mut state_guard,
                        &mut server_guard,
                    ) {
                        Ok(_) => applied += 1,
                        Err(error) => {
                            warn!(command = %command.name, %error, "skipping log entry");
                        }
                    },
                    Err(error) => warn!(%error, "skipping unparseable log entry"),
                }
            }
            Ok(None) => {
                warn!(offset = cursor, "truncated frame, stopping replay");
                break;
            }
            Err(error) => {
                warn!(offset = cursor, %error, "malformed frame, stopping replay");
                break;
            }
        }
    }

    Ok(applied)
}
