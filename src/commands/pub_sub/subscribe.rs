use tokio::sync::mpsc;

use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::state::State;

/// Handles SUBSCRIBE. Emits one `["subscribe", channel, count]` frame per
/// channel, where count is the connection's subscription total after that
/// channel was added.
pub fn subscribe(
    client_address: &str,
    outbox: &mpsc::UnboundedSender<Vec<u8>>,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("subscribe".to_string()));
    }

    let mut reply = String::new();

    for channel in arguments {
        let count = state.subscribe(client_address, channel.clone(), outbox.clone());

        reply.push_str(
            &RespValue::Array(vec![
                RespValue::BulkString("subscribe".to_string()),
                RespValue::BulkString(channel),
                RespValue::Integer(count as i64),
            ])
            .encode(),
        );
    }

    Ok(reply)
}
