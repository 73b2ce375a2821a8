//! WAIT: the synchronous-replication ACK barrier.
//!
//! The primary pins the offset it wants acknowledged, nudges every replica
//! with `REPLCONF GETACK *`, and then parks on the server's ACK notifier
//! until enough replicas have caught up or the timeout fires. A timed-out
//! WAIT simply returns the count it observed; ACKs that arrive later update
//! link state as usual and nothing leaks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::server::RedisServer;

pub struct WaitArguments {
    number_of_replicas: usize,
    timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("wait".to_string()));
        }

        let number_of_replicas = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let timeout_ms = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(Self {
            number_of_replicas,
            timeout: match timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        })
    }
}

pub async fn wait(
    server: &Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    let (required_offset, notify) = {
        let mut server_guard = server.write().await;

        if wait_arguments.number_of_replicas == 0 || server_guard.replicas.is_empty() {
            return Ok(RespValue::Integer(0).encode());
        }

        // With no writes yet every replica trivially satisfies offset >= 0.
        if server_guard.repl_offset == 0 {
            let count = wait_arguments
                .number_of_replicas
                .min(server_guard.replicas.len());
            return Ok(RespValue::Integer(count as i64).encode());
        }

        let required = server_guard.repl_offset;
        let getack = RespValue::command(["REPLCONF", "GETACK", "*"]).encode();
        server_guard.forward_to_replicas(getack.as_bytes());
        // GETACK travels the replication stream, so it counts into the
        // offset like any propagated command.
        server_guard.repl_offset += getack.len() as u64;

        (required, server_guard.ack_notify())
    };

    let deadline = wait_arguments.timeout.map(|timeout| Instant::now() + timeout);

    loop {
        let notified = notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let count = {
            let server_guard = server.read().await;
            server_guard.acked_count(required_offset)
        };

        if count >= wait_arguments.number_of_replicas {
            return Ok(RespValue::Integer(count as i64).encode());
        }

        match deadline {
            None => notified.await,
            Some(deadline) => {
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(RespValue::Integer(count as i64).encode());
                }
            }
        }
    }
}

/// Non-blocking form used inside transactions and replay contexts: reports
/// how many replicas have already acknowledged the current offset.
pub fn wait_immediate(
    server: &RedisServer,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    if wait_arguments.number_of_replicas == 0 || server.replicas.is_empty() {
        return Ok(RespValue::Integer(0).encode());
    }

    let count = server.acked_count(server.repl_offset);
    Ok(RespValue::Integer(count as i64).encode())
}
