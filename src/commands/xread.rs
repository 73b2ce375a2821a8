//! XREAD: multi-stream tailing reads, optionally blocking.
//!
//! `$` means "the current tail of this stream" and is frozen when the
//! waiter registers; entries appended while blocked are found by re-reading
//! after a wake, never by re-resolving `$`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::commands::command_error::CommandError;
use crate::commands::stream_utils::{entries_to_resp, parse_bound_id};
use crate::key_value_store::{KeyValueStore, StreamId};
use crate::resp::RespValue;
use crate::state::{State, StreamWaiter};

pub struct XreadArguments {
    block_ms: Option<u64>,
    /// `(key, raw id)` pairs; `$` still unresolved.
    pairs: Vec<(String, String)>,
}

impl XreadArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::WrongNumberOfArguments("xread".to_string()));
        }

        let (block_ms, streams_index) = match arguments[0].to_lowercase().as_str() {
            "block" => {
                let duration = arguments[1]
                    .parse::<u64>()
                    .map_err(|_| CommandError::NotAnInteger)?;

                (Some(duration), 2)
            }
            _ => (None, 0),
        };

        if !arguments
            .get(streams_index)
            .map(|token| token.eq_ignore_ascii_case("streams"))
            .unwrap_or(false)
        {
            return Err(CommandError::SyntaxError);
        }

        let rest = &arguments[streams_index + 1..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xread".to_string()));
        }

        let half = rest.len() / 2;
        let pairs = (0..half)
            .map(|i| (rest[i].clone(), rest[half + i].clone()))
            .collect();

        Ok(Self { block_ms, pairs })
    }
}

pub async fn xread(
    client_address: &str,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let resolved = {
        let mut store_guard = store.lock().await;
        resolve_positions(&mut store_guard, &xread_arguments.pairs)?
    };

    if let Some(reply) = read_streams(store, &resolved).await? {
        return Ok(reply);
    }

    let Some(block_ms) = xread_arguments.block_ms else {
        return Ok(RespValue::NullArray.encode());
    };

    let (sender, mut receiver) = mpsc::channel(resolved.len().max(1));
    {
        let mut state_guard = state.lock().await;
        for (key, after) in &resolved {
            state_guard.add_stream_waiter(
                key.clone(),
                StreamWaiter {
                    client_address: client_address.to_string(),
                    after: *after,
                    sender: sender.clone(),
                },
            );
        }
    }
    drop(sender);

    // Close the race against an XADD that landed between the read and the
    // waiter registration.
    if let Some(reply) = read_streams(store, &resolved).await? {
        let mut state_guard = state.lock().await;
        state_guard.remove_stream_waiters(client_address);
        return Ok(reply);
    }

    let woken = match block_ms {
        0 => receiver.recv().await.is_some(),
        ms => match tokio::time::timeout(Duration::from_millis(ms), receiver.recv()).await {
            Ok(message) => message.is_some(),
            Err(_) => false,
        },
    };

    {
        let mut state_guard = state.lock().await;
        state_guard.remove_stream_waiters(client_address);
    }

    if !woken {
        return Ok(RespValue::NullArray.encode());
    }

    match read_streams(store, &resolved).await? {
        Some(reply) => Ok(reply),
        None => Ok(RespValue::NullArray.encode()),
    }
}

/// Non-blocking form used inside transactions and replay contexts, where the
/// caller already holds the store lock; BLOCK is parsed but ignored.
pub fn xread_immediate(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let resolved = resolve_positions(store, &xread_arguments.pairs)?;

    match read_streams_sync(store, &resolved)? {
        Some(reply) => Ok(reply),
        None => Ok(RespValue::NullArray.encode()),
    }
}

fn resolve_positions(
    store: &mut KeyValueStore,
    pairs: &[(String, String)],
) -> Result<Vec<(String, StreamId)>, CommandError> {
    let mut resolved = Vec::with_capacity(pairs.len());

    for (key, raw_id) in pairs {
        let after = if raw_id == "$" {
            store
                .get_stream(key)?
                .and_then(|stream| stream.last_id())
                .unwrap_or(StreamId::ZERO)
        } else {
            parse_bound_id(raw_id, 0)?
        };

        resolved.push((key.clone(), after));
    }

    Ok(resolved)
}

async fn read_streams(
    store: &Arc<Mutex<KeyValueStore>>,
    positions: &[(String, StreamId)],
) -> Result<Option<String>, CommandError> {
    let mut store_guard = store.lock().await;
    read_streams_sync(&mut store_guard, positions)
}

fn read_streams_sync(
    store: &mut KeyValueStore,
    positions: &[(String, StreamId)],
) -> Result<Option<String>, CommandError> {
    let mut result = Vec::new();

    for (key, after) in positions {
        let Some(stream) = store.get_stream(key)? else {
            continue;
        };

        let entries = stream.entries_after(*after);
        if !entries.is_empty() {
            result.push(RespValue::Array(vec![
                RespValue::BulkString(key.clone()),
                entries_to_resp(&entries),
            ]));
        }
    }

    if result.is_empty() {
        return Ok(None);
    }

    Ok(Some(RespValue::Array(result).encode()))
}
