use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::state::State;

/// Handles UNSUBSCRIBE. With no channel arguments every current
/// subscription is dropped; each removal emits its own
/// `["unsubscribe", channel, remaining]` frame.
pub fn unsubscribe(
    client_address: &str,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let channels = if arguments.is_empty() {
        let mut subscribed = state.subscribed_channels(client_address);
        subscribed.sort();
        subscribed
    } else {
        arguments
    };

    if channels.is_empty() {
        return Ok(RespValue::Array(vec![
            RespValue::BulkString("unsubscribe".to_string()),
            RespValue::NullBulkString,
            RespValue::Integer(0),
        ])
        .encode());
    }

    let mut reply = String::new();
    for channel in channels {
        let remaining = state.unsubscribe(client_address, &channel);

        reply.push_str(
            &RespValue::Array(vec![
                RespValue::BulkString("unsubscribe".to_string()),
                RespValue::BulkString(channel),
                RespValue::Integer(remaining as i64),
            ])
            .encode(),
        );
    }

    Ok(reply)
}
