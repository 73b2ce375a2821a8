//! Per-connection tasks.
//!
//! Each accepted client gets a read loop plus a writer task draining the
//! connection's outbox channel; replies, pub/sub pushes, and (after PSYNC)
//! propagated writes all leave through that single channel, so frames never
//! interleave on the socket. The replica side of a replication link runs
//! [`handle_master_connection`], which applies the propagation stream
//! directly with byte-accurate offset accounting.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::commands::{CommandHandler, CommandOutcome, ExecutionContext};
use crate::handshake::MasterLink;
use crate::key_value_store::KeyValueStore;
use crate::resp::{parse_frame, RespValue};
use crate::server::RedisServer;
use crate::state::State;

/// Connection identity used when applying the primary's stream.
const PRIMARY_LINK_ADDRESS: &str = "primary-link";

pub async fn handle_client_connection(
    stream: TcpStream,
    server: Arc<RwLock<RedisServer>>,
    client_address: String,
    store: Arc<Mutex<KeyValueStore>>,
    state: Arc<Mutex<State>>,
) {
    let (mut reader, mut writer) = stream.into_split();

    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer_task = tokio::spawn(async move {
        while let Some(bytes) = outbox_rx.recv().await {
            if writer.write_all(&bytes).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let mut buffer = BytesMut::with_capacity(4096);
    // Set once PSYNC promotes this connection; from then on the peer is a
    // replica: replies are suppressed and only ACKs are expected inbound.
    let mut is_replica_sink = false;

    'connection: loop {
        match reader.read_buf(&mut buffer).await {
            Ok(0) | Err(_) => break 'connection,
            Ok(_) => {}
        }

        loop {
            let frame = match parse_frame(&buffer) {
                Ok(Some((frame, consumed))) => {
                    buffer.advance(consumed);
                    frame
                }
                Ok(None) => break,
                Err(framing_error) => {
                    // A framing error poisons the connection.
                    if !is_replica_sink {
                        let _ = outbox.send(framing_error.as_resp_string().into_bytes());
                    }
                    break 'connection;
                }
            };

            let command = match CommandHandler::new(frame) {
                Ok(command) => command,
                Err(command_error) => {
                    if !is_replica_sink
                        && outbox
                            .send(command_error.as_resp_string().into_bytes())
                            .is_err()
                    {
                        break 'connection;
                    }
                    continue;
                }
            };

            if is_replica_sink {
                ingest_replica_ack(&server, &client_address, &command).await;
                continue;
            }

            match command
                .execute(&client_address, &outbox, &store, &state, &server)
                .await
            {
                CommandOutcome::Reply(reply) => {
                    if !reply.is_empty() && outbox.send(reply.into_bytes()).is_err() {
                        break 'connection;
                    }
                }
                CommandOutcome::Quit(reply) => {
                    if !reply.is_empty() {
                        let _ = outbox.send(reply.into_bytes());
                    }
                    break 'connection;
                }
                CommandOutcome::FullResync => {
                    is_replica_sink = true;
                    info!(replica = %client_address, "replica registered after full resync");
                }
            }
        }
    }

    {
        let mut state_guard = state.lock().await;
        state_guard.cleanup_connection(&client_address);
    }
    {
        let mut server_guard = server.write().await;
        server_guard.remove_replica(&client_address);
    }

    drop(outbox);
    let _ = writer_task.await;
    debug!(client = %client_address, "connection closed");
}

/// On an established replica link the only expected inbound traffic is
/// `REPLCONF ACK <offset>`; anything else is ignored.
async fn ingest_replica_ack(
    server: &Arc<RwLock<RedisServer>>,
    client_address: &str,
    command: &CommandHandler,
) {
    if command.name != "REPLCONF" {
        return;
    }

    let is_ack = command
        .arguments
        .first()
        .map(|sub| sub.eq_ignore_ascii_case("ack"))
        .unwrap_or(false);

    let offset = command.arguments.get(1).and_then(|raw| raw.parse::<u64>().ok());

    if let (true, Some(offset)) = (is_ack, offset) {
        let mut server_guard = server.write().await;
        server_guard.record_ack(client_address, offset);
    }
}

/// Replica-side ingest of the primary's propagation stream.
///
/// Every frame is applied directly under the replay context (no reply, no
/// re-propagation) and `repl_offset` advances by the parser's consumed byte
/// count. `REPLCONF GETACK *` is the exception: the ACK carries the offset
/// as it stood *before* the GETACK itself, whose bytes are added afterward.
pub async fn handle_master_connection(
    mut link: MasterLink,
    server: &Arc<RwLock<RedisServer>>,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
) {
    loop {
        let (frame, consumed) = match link.read_frame().await {
            Ok(result) => result,
            Err(link_error) => {
                debug!(%link_error, "primary link read ended");
                return;
            }
        };

        let command = match CommandHandler::new(frame) {
            Ok(command) => command,
            Err(parse_error) => {
                warn!(%parse_error, "ignoring unparseable propagated frame");
                let mut server_guard = server.write().await;
                server_guard.repl_offset += consumed as u64;
                continue;
            }
        };

        let is_getack = command.name == "REPLCONF"
            && command
                .arguments
                .first()
                .map(|sub| sub.eq_ignore_ascii_case("getack"))
                .unwrap_or(false);

        if is_getack {
            let offset_before = server.read().await.repl_offset;
            let offset_argument = offset_before.to_string();
            let ack = RespValue::command(["REPLCONF", "ACK", offset_argument.as_str()]);

            if link.send(&ack).await.is_err() {
                return;
            }

            let mut server_guard = server.write().await;
            server_guard.repl_offset += consumed as u64;
            continue;
        }

        let mut store_guard = store.lock().await;
        let mut state_guard = state.lock().await;
        let mut server_guard = server.write().await;

        let ctx = ExecutionContext::replica();
        if let Err(apply_error) = command.apply(
            &ctx,
            PRIMARY_LINK_ADDRESS,
            &mut store_guard,
            &mut state_guard,
            &mut server_guard,
        ) {
            warn!(command = %command.name, %apply_error, "propagated command failed");
        }

        server_guard.repl_offset += consumed as u64;
    }
}
