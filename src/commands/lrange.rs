use crate::commands::command_error::CommandError;
use crate::key_value_store::{clamp_range, KeyValueStore};
use crate::resp::RespValue;

pub struct LrangeArguments {
    key: String,
    start: i64,
    stop: i64,
}

impl LrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("lrange".to_string()));
        }

        let start = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let stop = arguments[2]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(Self {
            key: arguments[0].clone(),
            start,
            stop,
        })
    }
}

/// Handles LRANGE. Indices are inclusive, negatives count from the tail,
/// and out-of-range indices clamp rather than error.
pub fn lrange(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let lrange_arguments = LrangeArguments::parse(arguments)?;

    let Some(list) = store.get_list_mut(&lrange_arguments.key)? else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let Some((start, stop)) = clamp_range(lrange_arguments.start, lrange_arguments.stop, list.len())
    else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let elements = list
        .iter()
        .skip(start)
        .take(stop - start + 1)
        .map(|value| RespValue::BulkString(value.clone()))
        .collect();

    Ok(RespValue::Array(elements).encode())
}
