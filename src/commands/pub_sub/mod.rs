mod publish;
mod subscribe;
mod unsubscribe;

pub use publish::publish;
pub use subscribe::subscribe;
pub use unsubscribe::unsubscribe;

/// Commands a connection may still issue while in subscription mode.
pub const SUBSCRIPTION_MODE_COMMANDS: &[&str] = &[
    "PING",
    "SUBSCRIBE",
    "UNSUBSCRIBE",
    "PSUBSCRIBE",
    "PUNSUBSCRIBE",
    "QUIT",
];
