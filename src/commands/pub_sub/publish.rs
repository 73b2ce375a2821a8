use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::state::State;

/// Handles PUBLISH. Fans the `["message", channel, payload]` frame out to
/// every subscriber's outbox and returns the receiver count.
pub fn publish(state: &mut State, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 2 {
        return Err(CommandError::WrongNumberOfArguments("publish".to_string()));
    }

    let message = RespValue::Array(vec![
        RespValue::BulkString("message".to_string()),
        RespValue::BulkString(arguments[0].clone()),
        RespValue::BulkString(arguments[1].clone()),
    ])
    .encode();

    let delivered = state.publish(&arguments[0], message.as_bytes());

    Ok(RespValue::Integer(delivered as i64).encode())
}
