//! BLPOP: blocking head pop over one or more lists.
//!
//! The fast path pops under a single store lock. Otherwise a waiter is
//! registered on every key and the task parks on a channel until a push
//! wakes it or the timeout expires. Waiters on the same key are served in
//! FIFO arrival order, one wake per pushed element.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::state::{ListWaiter, State};

pub struct BlpopArguments {
    keys: Vec<String>,
    timeout_secs: f64,
}

impl BlpopArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments("blpop".to_string()));
        }

        let timeout_secs = arguments[arguments.len() - 1]
            .parse::<f64>()
            .map_err(|_| CommandError::NotAFloat)?;

        if timeout_secs < 0.0 || timeout_secs.is_nan() {
            return Err(CommandError::NotAFloat);
        }

        Ok(Self {
            keys: arguments[..arguments.len() - 1].to_vec(),
            timeout_secs,
        })
    }
}

pub async fn blpop(
    client_address: &str,
    store: &Arc<Mutex<KeyValueStore>>,
    state: &Arc<Mutex<State>>,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let blpop_arguments = BlpopArguments::parse(arguments)?;

    if let Some(reply) = locked_pop(store, &blpop_arguments.keys).await? {
        return Ok(reply);
    }

    let deadline = match blpop_arguments.timeout_secs {
        0.0 => None,
        secs => Some(Instant::now() + Duration::from_secs_f64(secs)),
    };

    loop {
        let (sender, mut receiver) = mpsc::channel(1);
        register_waiters(state, &blpop_arguments.keys, client_address, &sender).await;

        // A push may have landed between the failed pop and registration.
        if let Some(reply) = locked_pop(store, &blpop_arguments.keys).await? {
            remove_waiters(state, &blpop_arguments.keys, client_address).await;
            return Ok(reply);
        }

        let woken = match deadline {
            None => receiver.recv().await.is_some(),
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, receiver.recv()).await {
                    Ok(message) => message.is_some(),
                    Err(_) => false,
                }
            }
        };

        remove_waiters(state, &blpop_arguments.keys, client_address).await;

        if !woken {
            return Ok(RespValue::NullArray.encode());
        }

        // The wake is only a hint; a plain LPOP may have raced us to the
        // element, in which case we go back to waiting.
        if let Some(reply) = locked_pop(store, &blpop_arguments.keys).await? {
            return Ok(reply);
        }
    }
}

/// Non-blocking form used inside transactions and replay contexts, where the
/// caller already holds the store lock.
pub fn blpop_immediate(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let blpop_arguments = BlpopArguments::parse(arguments)?;

    match try_pop(store, &blpop_arguments.keys)? {
        Some(reply) => Ok(reply),
        None => Ok(RespValue::NullArray.encode()),
    }
}

async fn locked_pop(
    store: &Arc<Mutex<KeyValueStore>>,
    keys: &[String],
) -> Result<Option<String>, CommandError> {
    let mut store_guard = store.lock().await;
    try_pop(&mut store_guard, keys)
}

fn try_pop(
    store: &mut KeyValueStore,
    keys: &[String],
) -> Result<Option<String>, CommandError> {
    for key in keys {
        if let Some(list) = store.get_list_mut(key)? {
            if let Some(value) = list.pop_front() {
                return Ok(Some(RespValue::encode_array_from_strings(vec![
                    key.clone(),
                    value,
                ])));
            }
        }
    }

    Ok(None)
}

async fn register_waiters(
    state: &Arc<Mutex<State>>,
    keys: &[String],
    client_address: &str,
    sender: &mpsc::Sender<()>,
) {
    let mut state_guard = state.lock().await;

    for key in keys {
        state_guard.add_list_waiter(
            key.clone(),
            ListWaiter {
                client_address: client_address.to_string(),
                sender: sender.clone(),
            },
        );
    }
}

async fn remove_waiters(state: &Arc<Mutex<State>>, keys: &[String], client_address: &str) {
    let mut state_guard = state.lock().await;

    for key in keys {
        state_guard.remove_list_waiter(key, client_address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::rpush_and_lpush::rpush;

    #[test]
    fn test_parse_arguments() {
        assert!(BlpopArguments::parse(vec!["l".to_string(), "0".to_string()]).is_ok());
        assert!(BlpopArguments::parse(vec![
            "a".to_string(),
            "b".to_string(),
            "1.5".to_string(),
        ])
        .is_ok());
        assert_eq!(
            BlpopArguments::parse(vec!["l".to_string()]).err(),
            Some(CommandError::WrongNumberOfArguments("blpop".to_string()))
        );
        assert_eq!(
            BlpopArguments::parse(vec!["l".to_string(), "abc".to_string()]).err(),
            Some(CommandError::NotAFloat)
        );
        assert_eq!(
            BlpopArguments::parse(vec!["l".to_string(), "-1".to_string()]).err(),
            Some(CommandError::NotAFloat)
        );
    }

    #[tokio::test]
    async fn test_fast_path_pops_first_nonempty_key() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));

        {
            let mut store_guard = store.lock().await;
            let mut state_guard = state.lock().await;
            rpush(
                &mut store_guard,
                &mut state_guard,
                vec!["b".to_string(), "x".to_string()],
            )
            .unwrap();
        }

        let reply = blpop(
            "client",
            &store,
            &state,
            vec!["a".to_string(), "b".to_string(), "0".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(reply, "*2\r\n$1\r\nb\r\n$1\r\nx\r\n");
    }

    #[tokio::test]
    async fn test_timeout_returns_null_array() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));

        let reply = blpop(
            "client",
            &store,
            &state,
            vec!["empty".to_string(), "0.05".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(reply, "*-1\r\n");
    }

    #[tokio::test]
    async fn test_wakes_on_push() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));

        let store_clone = Arc::clone(&store);
        let state_clone = Arc::clone(&state);
        let pusher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut store_guard = store_clone.lock().await;
            let mut state_guard = state_clone.lock().await;
            rpush(
                &mut store_guard,
                &mut state_guard,
                vec!["q".to_string(), "job".to_string()],
            )
            .unwrap();
        });

        let reply = blpop(
            "client",
            &store,
            &state,
            vec!["q".to_string(), "5".to_string()],
        )
        .await
        .unwrap();
        pusher.await.unwrap();

        assert_eq!(reply, "*2\r\n$1\r\nq\r\n$3\r\njob\r\n");
    }

    #[test]
    fn test_blpop_immediate_never_blocks() {
        let mut store = KeyValueStore::new();

        let reply =
            blpop_immediate(&mut store, vec!["empty".to_string(), "0".to_string()]).unwrap();

        assert_eq!(reply, "*-1\r\n");
    }
}
