use thiserror::Error;

use crate::key_value_store::WrongType;
use crate::resp::RespValue;
use crate::state::StateError;

/// Command-level failures. Each variant renders to the stable RESP error
/// message clients match on; none of them mutate state, propagate to
/// replicas, or reach the append-only log.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(String),
    #[error("syntax error")]
    SyntaxError,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("value is not a valid float")]
    NotAFloat,
    #[error("invalid expire time in set")]
    InvalidExpireTime,
    #[error("invalid longitude")]
    InvalidLongitude,
    #[error("invalid latitude")]
    InvalidLatitude,
    #[error("unsupported unit provided. please use m, km, mi, or ft")]
    UnsupportedUnit,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("Operation against a key holding the wrong kind of value")]
    WrongTypeOperation,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("The ID specified in XADD must be greater than 0-0")]
    StreamIdZero,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    StreamIdTooSmall,
    #[error("Invalid stream ID specified as stream command argument")]
    InvalidStreamId,
    #[error("{0}")]
    Transaction(#[from] StateError),
    #[error(
        "Can't execute '{0}': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context"
    )]
    NotAllowedInSubscriptionMode(String),
    #[error("You can't write against a read only replica.")]
    ReadOnlyReplica,
    #[error("{0} is not allowed in transactions")]
    NotAllowedInTransaction(String),
    #[error("Invalid PSYNC request")]
    InvalidPsyncRequest,
}

impl From<WrongType> for CommandError {
    fn from(_: WrongType) -> Self {
        CommandError::WrongTypeOperation
    }
}

impl CommandError {
    /// The RESP wire form: `-<PREFIX> <message>\r\n`.
    pub fn as_resp_string(&self) -> String {
        let message = match self {
            CommandError::WrongTypeOperation => format!("WRONGTYPE {}", self),
            CommandError::ReadOnlyReplica => format!("READONLY {}", self),
            other => format!("ERR {}", other),
        };

        RespValue::Error(message).encode()
    }
}
