use crate::commands::command_error::CommandError;
use crate::commands::stream_utils::{entries_to_resp, parse_bound_id};
use crate::key_value_store::{KeyValueStore, StreamId};
use crate::resp::RespValue;

pub struct XrangeArguments {
    key: String,
    start: StreamId,
    end: StreamId,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("xrange".to_string()));
        }

        // `-`/`+` are the open-ended sentinels; a bare millisecond defaults
        // its sequence to 0 at the start and MAX at the end.
        let start = match arguments[1].as_str() {
            "-" => StreamId::ZERO,
            token => parse_bound_id(token, 0)?,
        };
        let end = match arguments[2].as_str() {
            "+" => StreamId::MAX,
            token => parse_bound_id(token, u64::MAX)?,
        };

        Ok(Self {
            key: arguments[0].clone(),
            start,
            end,
        })
    }
}

pub fn xrange(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let Some(stream) = store.get_stream(&xrange_arguments.key)? else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let entries = stream.range(xrange_arguments.start, xrange_arguments.end);

    Ok(entries_to_resp(&entries).encode())
}
