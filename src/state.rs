//! Shared per-connection registries: blocking waiters, transaction queues,
//! and pub/sub channel membership. Connections are identified by their peer
//! address; everything registered here is torn down on disconnect.

use std::collections::{HashMap, HashSet, VecDeque};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::commands::CommandHandler;
use crate::key_value_store::StreamId;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("MULTI calls can not be nested")]
    TransactionAlreadyActive,
    #[error("no active transaction")]
    NoActiveTransaction,
}

/// A connection blocked in BLPOP, waiting for one of its keys' lists to gain
/// an element. A multi-key BLPOP registers one waiter per key, all sharing
/// the same channel.
#[derive(Debug)]
pub struct ListWaiter {
    pub client_address: String,
    pub sender: mpsc::Sender<()>,
}

/// A connection blocked in XREAD, waiting for an entry past `after`.
///
/// `after` is frozen at registration time; `$` was already resolved to the
/// stream tail before the waiter was created.
#[derive(Debug)]
pub struct StreamWaiter {
    pub client_address: String,
    pub after: StreamId,
    pub sender: mpsc::Sender<()>,
}

#[derive(Debug, Default)]
pub struct State {
    /// FIFO queues of BLPOP waiters per key.
    list_waiters: HashMap<String, VecDeque<ListWaiter>>,
    /// XREAD waiters per key.
    stream_waiters: HashMap<String, Vec<StreamWaiter>>,
    /// Queued transaction commands per connection; presence means MULTI is
    /// active even while the queue is empty.
    transactions: HashMap<String, Vec<CommandHandler>>,
    /// channel → subscriber address → connection outbox.
    channels: HashMap<String, HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
    /// Subscriber address → channels, for subscription-mode gating.
    subscriptions: HashMap<String, HashSet<String>>,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    pub fn add_list_waiter(&mut self, key: String, waiter: ListWaiter) {
        self.list_waiters.entry(key).or_default().push_back(waiter);
    }

    pub fn remove_list_waiter(&mut self, key: &str, client_address: &str) {
        if let Some(waiters) = self.list_waiters.get_mut(key) {
            waiters.retain(|waiter| waiter.client_address != client_address);
        }
    }

    /// Wakes up to `pushed` waiters on `key`, oldest first, one per pushed
    /// element. Waiters whose receiving side is already gone are discarded
    /// without consuming a wake.
    pub fn notify_list_waiters(&mut self, key: &str, pushed: usize) {
        let Some(waiters) = self.list_waiters.get_mut(key) else {
            return;
        };

        let mut woken = 0;
        while woken < pushed {
            let Some(waiter) = waiters.pop_front() else {
                break;
            };

            match waiter.sender.try_send(()) {
                // A full channel means the waiter was already woken through
                // another of its keys; it still consumes this wake.
                Ok(()) | Err(mpsc::error::TrySendError::Full(())) => woken += 1,
                Err(mpsc::error::TrySendError::Closed(())) => {}
            }
        }
    }

    pub fn add_stream_waiter(&mut self, key: String, waiter: StreamWaiter) {
        self.stream_waiters.entry(key).or_default().push(waiter);
    }

    pub fn remove_stream_waiters(&mut self, client_address: &str) {
        for waiters in self.stream_waiters.values_mut() {
            waiters.retain(|waiter| waiter.client_address != client_address);
        }
    }

    /// Wakes every XREAD waiter on `key` whose frozen after-id lies before
    /// the freshly appended `id`. Woken waiters are removed; they re-read
    /// the stream themselves.
    pub fn notify_stream_waiters(&mut self, key: &str, id: StreamId) {
        let Some(waiters) = self.stream_waiters.get_mut(key) else {
            return;
        };

        waiters.retain(|waiter| {
            if id > waiter.after {
                let _ = waiter.sender.try_send(());
                false
            } else {
                true
            }
        });
    }

    pub fn start_transaction(&mut self, client_address: String) -> Result<(), StateError> {
        if self.transactions.contains_key(&client_address) {
            return Err(StateError::TransactionAlreadyActive);
        }

        self.transactions.insert(client_address, Vec::new());
        Ok(())
    }

    pub fn is_in_transaction(&self, client_address: &str) -> bool {
        self.transactions.contains_key(client_address)
    }

    pub fn queue_command(
        &mut self,
        client_address: &str,
        command: CommandHandler,
    ) -> Result<(), StateError> {
        match self.transactions.get_mut(client_address) {
            Some(queue) => {
                queue.push(command);
                Ok(())
            }
            None => Err(StateError::NoActiveTransaction),
        }
    }

    /// Removes and returns the queued commands, ending the transaction.
    pub fn take_transaction(&mut self, client_address: &str) -> Option<Vec<CommandHandler>> {
        self.transactions.remove(client_address)
    }

    /// Registers `client_address` on `channel`; returns the number of
    /// channels the client is subscribed to afterwards.
    pub fn subscribe(
        &mut self,
        client_address: &str,
        channel: String,
        outbox: mpsc::UnboundedSender<Vec<u8>>,
    ) -> usize {
        self.channels
            .entry(channel.clone())
            .or_default()
            .insert(client_address.to_string(), outbox);
        self.subscriptions
            .entry(client_address.to_string())
            .or_default()
            .insert(channel);

        self.subscription_count(client_address)
    }

    /// Removes `client_address` from `channel`; returns the number of
    /// channels the client remains subscribed to.
    pub fn unsubscribe(&mut self, client_address: &str, channel: &str) -> usize {
        if let Some(subscribers) = self.channels.get_mut(channel) {
            subscribers.remove(client_address);
            if subscribers.is_empty() {
                self.channels.remove(channel);
            }
        }

        if let Some(channels) = self.subscriptions.get_mut(client_address) {
            channels.remove(channel);
            if channels.is_empty() {
                self.subscriptions.remove(client_address);
            }
        }

        self.subscription_count(client_address)
    }

    pub fn subscription_count(&self, client_address: &str) -> usize {
        self.subscriptions
            .get(client_address)
            .map(|channels| channels.len())
            .unwrap_or(0)
    }

    pub fn subscribed_channels(&self, client_address: &str) -> Vec<String> {
        self.subscriptions
            .get(client_address)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_in_subscription_mode(&self, client_address: &str) -> bool {
        self.subscription_count(client_address) > 0
    }

    /// Fans `message` out to every subscriber of `channel` through its
    /// connection outbox. Returns the receiver count; subscribers whose
    /// outbox is closed are dropped from the channel.
    pub fn publish(&mut self, channel: &str, message: &[u8]) -> usize {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|_, outbox| match outbox.send(message.to_vec()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });

        if subscribers.is_empty() {
            self.channels.remove(channel);
        }

        delivered
    }

    /// Drops everything a disconnecting client registered: subscriptions,
    /// transaction state, and pending blocking waiters.
    pub fn cleanup_connection(&mut self, client_address: &str) {
        for channel in self.subscribed_channels(client_address) {
            self.unsubscribe(client_address, &channel);
        }

        self.transactions.remove(client_address);
        self.remove_stream_waiters(client_address);

        for waiters in self.list_waiters.values_mut() {
            waiters.retain(|waiter| waiter.client_address != client_address);
        }
    }
}
