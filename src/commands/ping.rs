use crate::commands::command_error::CommandError;
use crate::resp::RespValue;

/// Handles PING. In subscription mode the reply is the two-element array
/// `["pong", ""]` instead of the usual simple string.
pub fn ping(arguments: Vec<String>, in_subscription_mode: bool) -> Result<String, CommandError> {
    match arguments.len() {
        0 if in_subscription_mode => Ok(RespValue::Array(vec![
            RespValue::BulkString("pong".to_string()),
            RespValue::BulkString("".to_string()),
        ])
        .encode()),
        0 => Ok(RespValue::SimpleString("PONG".to_string()).encode()),
        1 => Ok(RespValue::BulkString(arguments[0].clone()).encode()),
        _ => Err(CommandError::WrongNumberOfArguments("ping".to_string())),
    }
}
