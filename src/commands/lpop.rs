//! LPOP and RPOP, with the optional count form.
//!
//! Without a count the reply is a single bulk string (null when nothing can
//! be popped); with a count it is an array (empty when nothing can be
//! popped).

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct PopArguments {
    key: String,
    count: Option<usize>,
}

impl PopArguments {
    pub fn parse(arguments: Vec<String>, command: &str) -> Result<Self, CommandError> {
        if arguments.is_empty() || arguments.len() > 2 {
            return Err(CommandError::WrongNumberOfArguments(command.to_string()));
        }

        let count = match arguments.get(1) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| CommandError::NotAnInteger)?),
            None => None,
        };

        Ok(Self {
            key: arguments[0].clone(),
            count,
        })
    }
}

pub fn lpop(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    pop(store, arguments, true)
}

pub fn rpop(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    pop(store, arguments, false)
}

fn pop(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
    left: bool,
) -> Result<String, CommandError> {
    let pop_arguments = PopArguments::parse(arguments, if left { "lpop" } else { "rpop" })?;

    let list = store.get_list_mut(&pop_arguments.key)?;

    match pop_arguments.count {
        None => {
            let popped = list.and_then(|list| if left { list.pop_front() } else { list.pop_back() });

            match popped {
                Some(value) => Ok(RespValue::BulkString(value).encode()),
                None => Ok(RespValue::NullBulkString.encode()),
            }
        }
        Some(count) => {
            let mut popped = Vec::new();

            if let Some(list) = list {
                while popped.len() < count {
                    let value = if left { list.pop_front() } else { list.pop_back() };
                    match value {
                        Some(value) => popped.push(RespValue::BulkString(value)),
                        None => break,
                    }
                }
            }

            Ok(RespValue::Array(popped).encode())
        }
    }
}
