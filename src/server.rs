//! Server configuration and runtime.
//!
//! [`RedisServer`] carries the invocation options, the server's replication
//! role and state (repl id, offset, connected replica links), and the AOF
//! writer. [`RedisServer::run`] wires everything together: snapshot load,
//! AOF replay, the replica bootstrap task, and the accept loop.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tracing::{error, info, warn};

use crate::aof::{self, AofWriter, FsyncPolicy};
use crate::connection::{handle_client_connection, handle_master_connection};
use crate::handshake::MasterLink;
use crate::key_value_store::KeyValueStore;
use crate::rdb;
use crate::state::State;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("invalid port flag value")]
    InvalidPortFlagValue,
    #[error("invalid master address")]
    InvalidMasterAddress,
    #[error("invalid master port")]
    InvalidMasterPort,
    #[error("invalid appendfsync policy")]
    InvalidFsyncPolicy,
}

/// The server's replication role.
#[derive(Debug, PartialEq, Clone)]
pub enum RedisRole {
    Master,
    /// Replica of the primary at `(host, port)`.
    Replica((String, u16)),
}

impl RedisRole {
    /// Redis reports replicas as "slave" in INFO.
    pub fn as_string(&self) -> &str {
        match self {
            RedisRole::Master => "master",
            RedisRole::Replica(_) => "slave",
        }
    }
}

/// An established replica connection on the primary.
#[derive(Debug)]
pub struct ReplicaLink {
    /// The connection's outbox; propagated commands are queued here and
    /// drained by the connection's writer task.
    pub outbox: mpsc::UnboundedSender<Vec<u8>>,
    pub listening_port: Option<u16>,
    pub capabilities: Vec<String>,
    /// Highest offset this replica has acknowledged.
    pub ack_offset: u64,
}

/// REPLCONF bookkeeping gathered before PSYNC promotes the connection.
#[derive(Debug, Default)]
struct PendingReplica {
    listening_port: Option<u16>,
    capabilities: Vec<String>,
}

#[derive(Debug)]
pub struct RedisServer {
    pub port: u16,
    pub role: RedisRole,
    pub dir: String,
    pub dbfilename: String,
    pub appendonly: bool,
    pub appendfilename: String,
    pub aof_dir: Option<String>,
    pub appendfsync: FsyncPolicy,
    /// 40-character replication id, generated fresh per boot.
    pub repl_id: String,
    /// On a primary the global propagation offset; on a replica the applied
    /// offset of the primary's stream.
    pub repl_offset: u64,
    /// Established replica links, keyed by connection peer address.
    pub replicas: HashMap<String, ReplicaLink>,
    pending_replicas: HashMap<String, PendingReplica>,
    ack_notify: Arc<Notify>,
    pub aof: Option<AofWriter>,
}

impl RedisServer {
    /// Parses the recognized invocation options:
    /// `--port`, `--replicaof "<host> <port>"`, `--dir`, `--dbfilename`,
    /// `--appendonly`, `--appendfilename`, `--aof-dir`, `--appendfsync`.
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);

        let mut port: Option<u16> = None;
        let mut role: Option<RedisRole> = None;
        let mut dir: Option<String> = None;
        let mut dbfilename: Option<String> = None;
        let mut appendonly = false;
        let mut appendfilename: Option<String> = None;
        let mut aof_dir: Option<String> = None;
        let mut appendfsync: Option<FsyncPolicy> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let value = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                    port = Some(validate_port(&value, CliError::InvalidPortFlagValue)?);
                }
                "--replicaof" => {
                    let value = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                    role = Some(RedisRole::Replica(validate_master_address(&value)?));
                }
                "--dir" => {
                    dir = Some(iter.next().ok_or(CliError::InvalidCommandLineFlag)?);
                }
                "--dbfilename" => {
                    dbfilename = Some(iter.next().ok_or(CliError::InvalidCommandLineFlag)?);
                }
                "--appendonly" => {
                    appendonly = true;
                }
                "--appendfilename" => {
                    appendfilename = Some(iter.next().ok_or(CliError::InvalidCommandLineFlag)?);
                }
                "--aof-dir" => {
                    aof_dir = Some(iter.next().ok_or(CliError::InvalidCommandLineFlag)?);
                }
                "--appendfsync" => {
                    let value = iter.next().ok_or(CliError::InvalidCommandLineFlag)?;
                    appendfsync =
                        Some(FsyncPolicy::parse(&value).ok_or(CliError::InvalidFsyncPolicy)?);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(RedisServer {
            port: port.unwrap_or(6379),
            role: role.unwrap_or(RedisRole::Master),
            dir: dir.unwrap_or_else(|| ".".to_string()),
            dbfilename: dbfilename.unwrap_or_else(|| "dump.rdb".to_string()),
            appendonly,
            appendfilename: appendfilename.unwrap_or_else(|| "appendonly.aof".to_string()),
            aof_dir,
            appendfsync: appendfsync.unwrap_or(FsyncPolicy::EverySec),
            repl_id: generate_repl_id(),
            repl_offset: 0,
            replicas: HashMap::new(),
            pending_replicas: HashMap::new(),
            ack_notify: Arc::new(Notify::new()),
            aof: None,
        })
    }

    pub fn is_master(&self) -> bool {
        self.role == RedisRole::Master
    }

    pub fn rdb_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }

    pub fn aof_path(&self) -> PathBuf {
        let dir = self.aof_dir.as_ref().unwrap_or(&self.dir);
        PathBuf::from(dir).join(&self.appendfilename)
    }

    /// The `[name, value]` pairs served by CONFIG GET.
    pub fn config_parameters(&self) -> Vec<(String, String)> {
        vec![
            ("dir".to_string(), self.dir.clone()),
            ("dbfilename".to_string(), self.dbfilename.clone()),
            (
                "appendonly".to_string(),
                if self.appendonly { "yes" } else { "no" }.to_string(),
            ),
            ("appendfilename".to_string(), self.appendfilename.clone()),
            (
                "appendfsync".to_string(),
                self.appendfsync.as_str().to_string(),
            ),
            ("port".to_string(), self.port.to_string()),
        ]
    }

    /// The `key:value` lines behind `INFO replication`.
    pub fn info_replication(&self) -> String {
        let mut lines = format!("# Replication\r\nrole:{}\r\n", self.role.as_string());

        match &self.role {
            RedisRole::Master => {
                lines.push_str(&format!("connected_slaves:{}\r\n", self.replicas.len()));
                lines.push_str(&format!("master_replid:{}\r\n", self.repl_id));
                lines.push_str(&format!("master_repl_offset:{}\r\n", self.repl_offset));
            }
            RedisRole::Replica((host, port)) => {
                lines.push_str(&format!("master_host:{}\r\n", host));
                lines.push_str(&format!("master_port:{}\r\n", port));
                lines.push_str(&format!("master_repl_offset:{}\r\n", self.repl_offset));
            }
        }

        lines
    }

    pub fn record_replica_port(&mut self, client_address: &str, port: u16) {
        if let Some(link) = self.replicas.get_mut(client_address) {
            link.listening_port = Some(port);
            return;
        }

        self.pending_replicas
            .entry(client_address.to_string())
            .or_default()
            .listening_port = Some(port);
    }

    pub fn record_replica_capabilities(&mut self, client_address: &str, capabilities: Vec<String>) {
        if let Some(link) = self.replicas.get_mut(client_address) {
            link.capabilities.extend(capabilities);
            return;
        }

        self.pending_replicas
            .entry(client_address.to_string())
            .or_default()
            .capabilities
            .extend(capabilities);
    }

    /// Promotes a connection into an established replica link after PSYNC.
    pub fn register_replica(&mut self, client_address: &str, outbox: mpsc::UnboundedSender<Vec<u8>>) {
        let pending = self
            .pending_replicas
            .remove(client_address)
            .unwrap_or_default();

        self.replicas.insert(
            client_address.to_string(),
            ReplicaLink {
                outbox,
                listening_port: pending.listening_port,
                capabilities: pending.capabilities,
                ack_offset: 0,
            },
        );
    }

    /// Drops everything known about a disconnected peer. Other replicas are
    /// untouched.
    pub fn remove_replica(&mut self, client_address: &str) {
        self.replicas.remove(client_address);
        self.pending_replicas.remove(client_address);
    }

    pub fn record_ack(&mut self, client_address: &str, offset: u64) {
        if let Some(link) = self.replicas.get_mut(client_address) {
            link.ack_offset = offset;
            self.ack_notify.notify_waiters();
        }
    }

    pub fn acked_count(&self, required_offset: u64) -> usize {
        self.replicas
            .values()
            .filter(|link| link.ack_offset >= required_offset)
            .count()
    }

    pub fn ack_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.ack_notify)
    }

    /// Queues `bytes` on every replica link; links whose connection is gone
    /// are dropped.
    pub fn forward_to_replicas(&mut self, bytes: &[u8]) {
        self.replicas.retain(|address, link| {
            if link.outbox.send(bytes.to_vec()).is_ok() {
                true
            } else {
                warn!(replica = %address, "dropping dead replica link");
                false
            }
        });
    }

    /// Accounts and fans out one accepted write: the offset advances by the
    /// command's wire length, every replica link receives it, and it is
    /// appended to the AOF. An AOF failure degrades durability but never
    /// fails the command.
    pub async fn propagate_write(&mut self, wire: &str) {
        self.repl_offset += wire.len() as u64;
        self.forward_to_replicas(wire.as_bytes());

        if let Some(aof) = &mut self.aof {
            if let Err(error) = aof.append(wire.as_bytes()).await {
                warn!(%error, "append-only log write failed");
            }
        }
    }

    /// Boots the server: snapshot load, AOF replay and writer setup, the
    /// replica link (when configured), and finally the accept loop. Returns
    /// an error only for fatal initialization failures.
    pub async fn run(self) -> std::io::Result<()> {
        let port = self.port;
        let role = self.role.clone();

        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let server = Arc::new(RwLock::new(self));

        load_snapshot(&server, &store).await?;
        setup_append_only(&server, &store, &state).await?;

        if let RedisRole::Replica((host, master_port)) = role {
            let master_address = format!("{}:{}", host, master_port);
            let server_clone = Arc::clone(&server);
            let store_clone = Arc::clone(&store);
            let state_clone = Arc::clone(&state);

            tokio::spawn(async move {
                run_replica_link(master_address, port, server_clone, store_clone, state_clone)
                    .await;
            });
        }

        let listener = match TcpListener::bind(format!("127.0.0.1:{}", port)).await {
            Ok(listener) => listener,
            Err(bind_error) => {
                error!(port, %bind_error, "failed to bind listener");
                return Err(bind_error);
            }
        };
        info!(port, "listening for connections");

        loop {
            match listener.accept().await {
                Ok((stream, peer_address)) => {
                    let server_clone = Arc::clone(&server);
                    let store_clone = Arc::clone(&store);
                    let state_clone = Arc::clone(&state);

                    tokio::spawn(async move {
                        handle_client_connection(
                            stream,
                            server_clone,
                            peer_address.to_string(),
                            store_clone,
                            state_clone,
                        )
                        .await;
                    });
                }
                Err(accept_error) => {
                    warn!(%accept_error, "failed to accept connection");
                }
            }
        }
    }
}

/// Loads the snapshot file into the store, when one exists. A malformed
/// snapshot is a fatal init failure.
async fn load_snapshot(
    server: &Arc<RwLock<RedisServer>>,
    store: &Arc<Mutex<KeyValueStore>>,
) -> std::io::Result<()> {
    let path = server.read().await.rdb_path();

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error),
    };

    let contents = match rdb::parse(&bytes) {
        Ok(contents) => contents,
        Err(decode_error) => {
            error!(path = %path.display(), %decode_error, "snapshot decode failed");
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                decode_error.to_string(),
            ));
        }
    };

    let loaded = contents.entries.len();
    let mut store_guard = store.lock().await;
    for (key, value) in contents.entries {
        store_guard.insert(key, value);
    }

    info!(path = %path.display(), keys = loaded, "snapshot loaded");
    Ok(())
}

/// Replays an existing log, opens the writer, and starts the `everysec`
/// tick.
async fn setup_append_only(
    server: &Arc<RwLock<RedisServer>>,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
) -> std::io::Result<()> {
    let (enabled, path, policy) = {
        let server_guard = server.read().await;
        (
            server_guard.appendonly,
            server_guard.aof_path(),
            server_guard.appendfsync,
        )
    };

    if !enabled {
        return Ok(());
    }

    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        let applied = aof::replay(&path, store, state, server).await?;
        info!(path = %path.display(), commands = applied, "append-only log replayed");
    }

    let writer = AofWriter::open(&path, policy).await?;
    server.write().await.aof = Some(writer);

    if policy == FsyncPolicy::EverySec {
        let server_clone = Arc::clone(server);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(250));
            loop {
                interval.tick().await;
                let mut server_guard = server_clone.write().await;
                if let Some(aof) = &mut server_guard.aof {
                    if let Err(error) = aof.tick().await {
                        warn!(%error, "append-only log fsync failed");
                    }
                }
            }
        });
    }

    Ok(())
}

/// The replica's connection to its primary: connect with backoff, handshake,
/// install the snapshot, then ingest the propagation stream until the link
/// drops, and start over.
async fn run_replica_link(
    master_address: String,
    listening_port: u16,
    server: Arc<RwLock<RedisServer>>,
    store: Arc<Mutex<KeyValueStore>>,
    state: Arc<Mutex<State>>,
) {
    let mut backoff = Duration::from_millis(500);

    loop {
        match connect_and_sync(
            &master_address,
            listening_port,
            &server,
            &store,
            &state,
        )
        .await
        {
            Ok(()) => {
                warn!(primary = %master_address, "replication link closed, reconnecting");
                backoff = Duration::from_millis(500);
            }
            Err(error) => {
                warn!(primary = %master_address, %error, "replication link failed");
                backoff = (backoff * 2).min(Duration::from_secs(5));
            }
        }

        tokio::time::sleep(backoff).await;
    }
}

async fn connect_and_sync(
    master_address: &str,
    listening_port: u16,
    server: &Arc<RwLock<RedisServer>>,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
) -> Result<(), crate::handshake::HandshakeError> {
    let mut link = MasterLink::connect(master_address).await?;
    let resync = link.handshake(listening_port).await?;

    info!(
        primary = %master_address,
        offset = resync.offset,
        snapshot_bytes = resync.snapshot.len(),
        "full resynchronization complete"
    );

    match rdb::parse(&resync.snapshot) {
        Ok(contents) => {
            let mut store_guard = store.lock().await;
            for (key, value) in contents.entries {
                store_guard.insert(key, value);
            }
        }
        Err(decode_error) => {
            // An undecodable snapshot payload is discarded; the propagation
            // stream still brings the replica up to date.
            warn!(%decode_error, "discarding snapshot payload");
        }
    }

    server.write().await.repl_offset = resync.offset;

    handle_master_connection(link, server, store, state).await;
    Ok(())
}

fn generate_repl_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();

    (0..40)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}

fn validate_port(port: &str, error: CliError) -> Result<u16, CliError> {
    let port_number = port.parse::<u16>().map_err(|_| error.clone())?;

    if port_number == 0 {
        return Err(error);
    }

    Ok(port_number)
}

/// Validates "host port": an IPv4 address or hostname, then a port.
fn validate_master_address(master_address: &str) -> Result<(String, u16), CliError> {
    let ipv4_regex = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap();
    let hostname_regex = Regex::new(r"^[a-zA-Z0-9\-\.]+$").unwrap();

    let parts = master_address.split_whitespace().collect::<Vec<&str>>();
    if parts.len() != 2 {
        return Err(CliError::InvalidMasterAddress);
    }

    let address = parts[0];
    let valid_address = if let Some(captures) = ipv4_regex.captures(address) {
        captures.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        })
    } else {
        hostname_regex.is_match(address)
    };

    if !valid_address {
        return Err(CliError::InvalidMasterAddress);
    }

    let port = validate_port(parts[1], CliError::InvalidMasterPort)?;
    Ok((address.to_string(), port))
}
