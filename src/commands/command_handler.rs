//! Command parsing and dispatch.
//!
//! [`CommandHandler::new`] turns a parsed RESP array into a named command.
//! Synchronous commands run through [`CommandHandler::apply`] under the
//! store/state/server locks, which the caller holds for the whole command
//! (and for a whole EXEC batch), so commands observe a total order.
//! [`CommandHandler::execute`] is the client-facing orchestrator: it layers
//! subscription-mode gating, transaction queuing, the blocking commands, and
//! write propagation on top of `apply`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};

use crate::commands::blpop::{blpop, blpop_immediate};
use crate::commands::command_error::CommandError;
use crate::commands::config_get::config_get;
use crate::commands::del::del;
use crate::commands::echo::echo;
use crate::commands::geoadd::geoadd;
use crate::commands::geodist::geodist;
use crate::commands::geopos::geopos;
use crate::commands::geosearch::geosearch;
use crate::commands::get::get;
use crate::commands::incr::{decr, decrby, incr, incrby};
use crate::commands::info::info;
use crate::commands::keys::keys;
use crate::commands::llen::llen;
use crate::commands::lpop::{lpop, rpop};
use crate::commands::lrange::lrange;
use crate::commands::ping::ping;
use crate::commands::psync::psync;
use crate::commands::pub_sub::{publish, subscribe, unsubscribe, SUBSCRIPTION_MODE_COMMANDS};
use crate::commands::replconf::replconf;
use crate::commands::rpush_and_lpush::{lpush, rpush};
use crate::commands::set::set;
use crate::commands::type_command::type_command;
use crate::commands::wait::{wait, wait_immediate};
use crate::commands::xadd::xadd;
use crate::commands::xrange::xrange;
use crate::commands::xread::{xread, xread_immediate};
use crate::commands::zadd::zadd;
use crate::commands::zcard::zcard;
use crate::commands::zrange::zrange;
use crate::commands::zrank::zrank;
use crate::commands::zrem::zrem;
use crate::commands::zscore::zscore;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::server::RedisServer;
use crate::state::State;

/// Commands whose accepted replies are appended to the AOF, forwarded to
/// every replica, and counted into the replication offset.
pub const WRITE_COMMANDS: &[&str] = &[
    "SET", "DEL", "INCR", "DECR", "INCRBY", "DECRBY", "LPUSH", "RPUSH", "LPOP", "RPOP", "BLPOP",
    "XADD", "ZADD", "ZREM", "GEOADD",
];

/// Where a command came from. Anything other than `Client` is a replay:
/// replies are suppressed or discarded by the caller and the command is
/// neither re-propagated, re-appended to the AOF, nor queued into a
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Client,
    Replica,
    AofReplay,
    Exec,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    pub source: CommandSource,
}

impl ExecutionContext {
    pub fn client() -> Self {
        ExecutionContext {
            source: CommandSource::Client,
        }
    }

    pub fn replica() -> Self {
        ExecutionContext {
            source: CommandSource::Replica,
        }
    }

    pub fn aof_replay() -> Self {
        ExecutionContext {
            source: CommandSource::AofReplay,
        }
    }

    pub fn exec() -> Self {
        ExecutionContext {
            source: CommandSource::Exec,
        }
    }

    pub fn is_replay(&self) -> bool {
        self.source != CommandSource::Client
    }
}

/// What the connection loop should do with the result of a command.
#[derive(Debug)]
pub enum CommandOutcome {
    /// Write the encoded reply (already empty for reply-less commands).
    Reply(String),
    /// Reply, then close the connection.
    Quit(String),
    /// PSYNC accepted: the header and snapshot are already queued on the
    /// connection's outbox and the link is registered; the connection is a
    /// replica sink from here on.
    FullResync,
}

/// A parsed command: uppercased name, its arguments, and the original frame
/// (kept for byte-exact propagation).
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
    pub input: RespValue,
}

impl CommandHandler {
    /// Parses an array-of-bulk-strings frame into a command.
    pub fn new(input: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = &input else {
            return Err(CommandError::UnknownCommand(String::new()));
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(s)) => s.to_uppercase(),
            _ => return Err(CommandError::UnknownCommand(String::new())),
        };

        let mut arguments = Vec::with_capacity(elements.len().saturating_sub(1));
        for element in &elements[1..] {
            match element {
                RespValue::BulkString(s) => arguments.push(s.clone()),
                _ => return Err(CommandError::UnknownCommand(name)),
            }
        }

        Ok(Self {
            name,
            arguments,
            input,
        })
    }

    /// Runs a command against state the caller has already locked.
    ///
    /// This is the whole command surface for replay contexts (replica
    /// ingest, AOF replay, EXEC batches); blocking commands degrade to
    /// their immediate forms here. The client-only commands (MULTI family,
    /// SUBSCRIBE family, PSYNC, QUIT) never reach `apply`.
    pub fn apply(
        &self,
        ctx: &ExecutionContext,
        client_address: &str,
        store: &mut KeyValueStore,
        state: &mut State,
        server: &mut RedisServer,
    ) -> Result<String, CommandError> {
        if ctx.source == CommandSource::Exec
            && WRITE_COMMANDS.contains(&self.name.as_str())
            && !server.is_master()
        {
            return Err(CommandError::ReadOnlyReplica);
        }

        let arguments = self.arguments.clone();

        match self.name.as_str() {
            "PING" => ping(arguments, state.is_in_subscription_mode(client_address)),
            "ECHO" => echo(arguments),
            "GET" => get(store, arguments),
            "SET" => set(store, arguments),
            "DEL" => del(store, arguments),
            "INCR" => incr(store, arguments),
            "DECR" => decr(store, arguments),
            "INCRBY" => incrby(store, arguments),
            "DECRBY" => decrby(store, arguments),
            "TYPE" => type_command(store, arguments),
            "KEYS" => keys(store, arguments),
            "CONFIG" => config_get(server, arguments),
            "LPUSH" => lpush(store, state, arguments),
            "RPUSH" => rpush(store, state, arguments),
            "LRANGE" => lrange(store, arguments),
            "LLEN" => llen(store, arguments),
            "LPOP" => lpop(store, arguments),
            "RPOP" => rpop(store, arguments),
            "BLPOP" => blpop_immediate(store, arguments),
            "XADD" => xadd(store, state, arguments),
            "XRANGE" => xrange(store, arguments),
            "XREAD" => xread_immediate(store, arguments),
            "ZADD" => zadd(store, arguments),
            "ZRANGE" => zrange(store, arguments),
            "ZRANK" => zrank(store, arguments),
            "ZSCORE" => zscore(store, arguments),
            "ZREM" => zrem(store, arguments),
            "ZCARD" => zcard(store, arguments),
            "GEOADD" => geoadd(store, arguments),
            "GEOPOS" => geopos(store, arguments),
            "GEODIST" => geodist(store, arguments),
            "GEOSEARCH" => geosearch(store, arguments),
            "PUBLISH" => publish(state, arguments),
            "INFO" => info(server, arguments),
            "REPLCONF" => replconf(client_address, server, arguments),
            "WAIT" => wait_immediate(server, arguments),
            "SUBSCRIBE" | "UNSUBSCRIBE" if ctx.is_replay() => {
                Err(CommandError::NotAllowedInTransaction(self.name.clone()))
            }
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }

    /// Client-facing execution: gating, transactions, blocking commands,
    /// PSYNC, and write propagation around [`CommandHandler::apply`].
    pub async fn execute(
        &self,
        client_address: &str,
        outbox: &mpsc::UnboundedSender<Vec<u8>>,
        store: &Arc<Mutex<KeyValueStore>>,
        state: &Arc<Mutex<State>>,
        server: &Arc<RwLock<RedisServer>>,
    ) -> CommandOutcome {
        {
            let state_guard = state.lock().await;
            if state_guard.is_in_subscription_mode(client_address)
                && !SUBSCRIPTION_MODE_COMMANDS.contains(&self.name.as_str())
            {
                return CommandOutcome::Reply(
                    CommandError::NotAllowedInSubscriptionMode(self.name.clone())
                        .as_resp_string(),
                );
            }
        }

        match self.name.as_str() {
            "QUIT" => {
                return CommandOutcome::Quit(
                    RespValue::SimpleString("OK".to_string()).encode(),
                );
            }
            "MULTI" => {
                let mut state_guard = state.lock().await;
                return match state_guard.start_transaction(client_address.to_string()) {
                    Ok(()) => CommandOutcome::Reply(
                        RespValue::SimpleString("OK".to_string()).encode(),
                    ),
                    Err(error) => {
                        CommandOutcome::Reply(CommandError::from(error).as_resp_string())
                    }
                };
            }
            "EXEC" => return self.execute_transaction(client_address, store, state, server).await,
            "DISCARD" => {
                let mut state_guard = state.lock().await;
                return match state_guard.take_transaction(client_address) {
                    Some(_) => CommandOutcome::Reply(
                        RespValue::SimpleString("OK".to_string()).encode(),
                    ),
                    None => CommandOutcome::Reply(
                        CommandError::DiscardWithoutMulti.as_resp_string(),
                    ),
                };
            }
            _ => {}
        }

        // Inside MULTI everything else queues instead of running.
        {
            let mut state_guard = state.lock().await;
            if state_guard.is_in_transaction(client_address) {
                return match state_guard.queue_command(client_address, self.clone()) {
                    Ok(()) => CommandOutcome::Reply(
                        RespValue::SimpleString("QUEUED".to_string()).encode(),
                    ),
                    Err(error) => {
                        CommandOutcome::Reply(CommandError::from(error).as_resp_string())
                    }
                };
            }
        }

        if WRITE_COMMANDS.contains(&self.name.as_str()) {
            let server_guard = server.read().await;
            if !server_guard.is_master() {
                return CommandOutcome::Reply(CommandError::ReadOnlyReplica.as_resp_string());
            }
        }

        match self.name.as_str() {
            "SUBSCRIBE" => {
                let mut state_guard = state.lock().await;
                let result = subscribe(
                    client_address,
                    outbox,
                    &mut state_guard,
                    self.arguments.clone(),
                );
                CommandOutcome::Reply(
                    result.unwrap_or_else(|error| error.as_resp_string()),
                )
            }
            "UNSUBSCRIBE" => {
                let mut state_guard = state.lock().await;
                let result = unsubscribe(client_address, &mut state_guard, self.arguments.clone());
                CommandOutcome::Reply(
                    result.unwrap_or_else(|error| error.as_resp_string()),
                )
            }
            "BLPOP" => {
                match blpop(client_address, store, state, self.arguments.clone()).await {
                    Ok(reply) => {
                        // Like every other accepted write, including the
                        // timed-out null-array reply.
                        let mut server_guard = server.write().await;
                        server_guard.propagate_write(&self.input.encode()).await;
                        CommandOutcome::Reply(reply)
                    }
                    Err(error) => CommandOutcome::Reply(error.as_resp_string()),
                }
            }
            "XREAD" => {
                let result = xread(client_address, store, state, self.arguments.clone()).await;
                CommandOutcome::Reply(
                    result.unwrap_or_else(|error| error.as_resp_string()),
                )
            }
            "WAIT" => {
                let result = wait(server, self.arguments.clone()).await;
                CommandOutcome::Reply(
                    result.unwrap_or_else(|error| error.as_resp_string()),
                )
            }
            "PSYNC" => {
                // Header, snapshot, and link registration happen under one
                // server lock, so no propagated write can land between the
                // offset in the header and the link joining the fan-out set.
                let mut server_guard = server.write().await;
                match psync(&server_guard, self.arguments.clone()) {
                    Ok((header, snapshot)) => {
                        let mut payload = header.into_bytes();
                        payload
                            .extend_from_slice(format!("${}\r\n", snapshot.len()).as_bytes());
                        payload.extend_from_slice(&snapshot);

                        if outbox.send(payload).is_err() {
                            return CommandOutcome::Quit(String::new());
                        }

                        server_guard.register_replica(client_address, outbox.clone());
                        CommandOutcome::FullResync
                    }
                    Err(error) => CommandOutcome::Reply(error.as_resp_string()),
                }
            }
            _ => {
                let mut store_guard = store.lock().await;
                let mut state_guard = state.lock().await;
                let mut server_guard = server.write().await;

                let ctx = ExecutionContext::client();
                match self.apply(
                    &ctx,
                    client_address,
                    &mut store_guard,
                    &mut state_guard,
                    &mut server_guard,
                ) {
                    Ok(reply) => {
                        if WRITE_COMMANDS.contains(&self.name.as_str()) {
                            server_guard.propagate_write(&self.input.encode()).await;
                        }
                        CommandOutcome::Reply(reply)
                    }
                    Err(error) => CommandOutcome::Reply(error.as_resp_string()),
                }
            }
        }
    }

    /// EXEC: run the queued commands back-to-back under one set of locks so
    /// the batch is contiguous in the global command order. Replies are
    /// collected into a single array; per-command errors become that
    /// command's element. Queued writes are not propagated.
    async fn execute_transaction(
        &self,
        client_address: &str,
        store: &Arc<Mutex<KeyValueStore>>,
        state: &Arc<Mutex<State>>,
        server: &Arc<RwLock<RedisServer>>,
    ) -> CommandOutcome {
        let queued = {
            let mut state_guard = state.lock().await;
            state_guard.take_transaction(client_address)
        };

        let Some(commands) = queued else {
            return CommandOutcome::Reply(CommandError::ExecWithoutMulti.as_resp_string());
        };

        let mut store_guard = store.lock().await;
        let mut state_guard = state.lock().await;
        let mut server_guard = server.write().await;

        let ctx = ExecutionContext::exec();
        let mut body = String::new();
        for command in &commands {
            match command.apply(
                &ctx,
                client_address,
                &mut store_guard,
                &mut state_guard,
                &mut server_guard,
            ) {
                Ok(reply) => body.push_str(&reply),
                Err(error) => body.push_str(&error.as_resp_string()),
            }
        }

        CommandOutcome::Reply(format!("*{}\r\n{}", commands.len(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> CommandHandler {
        CommandHandler::new(RespValue::command(parts.to_vec())).unwrap()
    }

    fn shared() -> (
        Arc<Mutex<KeyValueStore>>,
        Arc<Mutex<State>>,
        Arc<RwLock<RedisServer>>,
        mpsc::UnboundedSender<Vec<u8>>,
    ) {
        let (outbox, _inbox) = mpsc::unbounded_channel();
        (
            Arc::new(Mutex::new(KeyValueStore::new())),
            Arc::new(Mutex::new(State::new())),
            Arc::new(RwLock::new(
                RedisServer::new(vec!["riptide".to_string()]).unwrap(),
            )),
            outbox,
        )
    }

    async fn run(
        handler: &CommandHandler,
        address: &str,
        shared: &(
            Arc<Mutex<KeyValueStore>>,
            Arc<Mutex<State>>,
            Arc<RwLock<RedisServer>>,
            mpsc::UnboundedSender<Vec<u8>>,
        ),
    ) -> String {
        match handler
            .execute(address, &shared.3, &shared.0, &shared.1, &shared.2)
            .await
        {
            CommandOutcome::Reply(reply) => reply,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_new_uppercases_and_collects_arguments() {
        let handler = command(&["set", "key", "value"]);
        assert_eq!(handler.name, "SET");
        assert_eq!(handler.arguments, vec!["key", "value"]);
    }

    #[test]
    fn test_new_rejects_non_command_frames() {
        assert!(CommandHandler::new(RespValue::Integer(5)).is_err());
        assert!(CommandHandler::new(RespValue::Array(vec![RespValue::Integer(5)])).is_err());
    }

    #[tokio::test]
    async fn test_unknown_command_reply() {
        let shared = shared();
        let reply = run(&command(&["FLY", "me"]), "c", &shared).await;
        assert_eq!(reply, "-ERR unknown command 'FLY'\r\n");
    }

    #[tokio::test]
    async fn test_transaction_queues_and_executes_atomically() {
        let shared = shared();

        assert_eq!(run(&command(&["MULTI"]), "c", &shared).await, "+OK\r\n");
        assert_eq!(
            run(&command(&["INCR", "counter"]), "c", &shared).await,
            "+QUEUED\r\n"
        );
        assert_eq!(
            run(&command(&["INCR", "counter"]), "c", &shared).await,
            "+QUEUED\r\n"
        );

        // Nothing executed yet.
        assert!(shared.0.lock().await.get("counter").is_none());

        assert_eq!(
            run(&command(&["EXEC"]), "c", &shared).await,
            "*2\r\n:1\r\n:2\r\n"
        );
    }

    #[tokio::test]
    async fn test_exec_and_discard_without_multi() {
        let shared = shared();

        assert_eq!(
            run(&command(&["EXEC"]), "c", &shared).await,
            "-ERR EXEC without MULTI\r\n"
        );
        assert_eq!(
            run(&command(&["DISCARD"]), "c", &shared).await,
            "-ERR DISCARD without MULTI\r\n"
        );
    }

    #[tokio::test]
    async fn test_discard_drops_queue() {
        let shared = shared();

        run(&command(&["MULTI"]), "c", &shared).await;
        run(&command(&["SET", "k", "v"]), "c", &shared).await;
        assert_eq!(run(&command(&["DISCARD"]), "c", &shared).await, "+OK\r\n");

        assert!(shared.0.lock().await.get("k").is_none());
        assert_eq!(
            run(&command(&["GET", "k"]), "c", &shared).await,
            "$-1\r\n"
        );
    }

    #[tokio::test]
    async fn test_transactions_are_per_connection() {
        let shared = shared();

        run(&command(&["MULTI"]), "one", &shared).await;
        assert_eq!(
            run(&command(&["SET", "k", "v"]), "one", &shared).await,
            "+QUEUED\r\n"
        );

        // Another connection is unaffected by the open transaction.
        assert_eq!(
            run(&command(&["SET", "other", "x"]), "two", &shared).await,
            "+OK\r\n"
        );
    }

    #[tokio::test]
    async fn test_subscription_mode_gating() {
        let shared = shared();

        let reply = run(&command(&["SUBSCRIBE", "news"]), "c", &shared).await;
        assert_eq!(reply, "*3\r\n$9\r\nsubscribe\r\n$4\r\nnews\r\n:1\r\n");

        let reply = run(&command(&["GET", "k"]), "c", &shared).await;
        assert!(
            reply.starts_with("-ERR Can't execute 'GET'"),
            "reply {:?}",
            reply
        );

        // PING is allowed and switches to the array form.
        assert_eq!(
            run(&command(&["PING"]), "c", &shared).await,
            "*2\r\n$4\r\npong\r\n$0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn test_write_propagation_updates_offset_and_links() {
        let shared = shared();
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();
        shared
            .2
            .write()
            .await
            .register_replica("replica-1", link_tx);

        let set = command(&["SET", "x", "1"]);
        assert_eq!(run(&set, "c", &shared).await, "+OK\r\n");

        let wire = set.input.encode();
        assert_eq!(
            shared.2.read().await.repl_offset,
            wire.len() as u64,
            "offset advances by the wire length"
        );
        assert_eq!(link_rx.try_recv().unwrap(), wire.into_bytes());

        // Reads are not propagated.
        run(&command(&["GET", "x"]), "c", &shared).await;
        assert!(link_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_exec_does_not_propagate_queued_writes() {
        let shared = shared();
        let (link_tx, mut link_rx) = mpsc::unbounded_channel();
        shared
            .2
            .write()
            .await
            .register_replica("replica-1", link_tx);

        run(&command(&["MULTI"]), "c", &shared).await;
        run(&command(&["SET", "k", "v"]), "c", &shared).await;
        run(&command(&["EXEC"]), "c", &shared).await;

        assert!(link_rx.try_recv().is_err());
        assert_eq!(shared.2.read().await.repl_offset, 0);
    }

    #[tokio::test]
    async fn test_replica_rejects_client_writes() {
        let (outbox, _inbox) = mpsc::unbounded_channel();
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let server = Arc::new(RwLock::new(
            RedisServer::new(vec![
                "riptide".to_string(),
                "--replicaof".to_string(),
                "127.0.0.1 6399".to_string(),
            ])
            .unwrap(),
        ));

        let outcome = command(&["SET", "k", "v"])
            .execute("c", &outbox, &store, &state, &server)
            .await;

        match outcome {
            CommandOutcome::Reply(reply) => {
                assert_eq!(
                    reply,
                    "-READONLY You can't write against a read only replica.\r\n"
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        // Reads still served.
        let outcome = command(&["GET", "k"])
            .execute("c", &outbox, &store, &state, &server)
            .await;
        match outcome {
            CommandOutcome::Reply(reply) => assert_eq!(reply, "$-1\r\n"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quit() {
        let shared = shared();
        let outcome = command(&["QUIT"])
            .execute("c", &shared.3, &shared.0, &shared.1, &shared.2)
            .await;

        match outcome {
            CommandOutcome::Quit(reply) => assert_eq!(reply, "+OK\r\n"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_psync_registers_link_and_queues_full_resync() {
        let (outbox, mut inbox) = mpsc::unbounded_channel();
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let state = Arc::new(Mutex::new(State::new()));
        let server = Arc::new(RwLock::new(
            RedisServer::new(vec!["riptide".to_string()]).unwrap(),
        ));

        let outcome = command(&["PSYNC", "?", "-1"])
            .execute("replica", &outbox, &store, &state, &server)
            .await;

        assert!(matches!(outcome, CommandOutcome::FullResync));
        assert!(server.read().await.replicas.contains_key("replica"));

        let payload = inbox.try_recv().unwrap();
        let text = String::from_utf8_lossy(&payload);
        assert!(text.starts_with("+FULLRESYNC "));
        assert!(text.contains("REDIS"), "snapshot follows the header");
    }
}
