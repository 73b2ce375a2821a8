use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::state::State;

pub struct PushArguments {
    key: String,
    values: Vec<String>,
}

impl PushArguments {
    pub fn parse(arguments: Vec<String>, command: &str) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments(command.to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            values: arguments[1..].to_vec(),
        })
    }
}

/// Handles RPUSH: appends values in argument order.
pub fn rpush(
    store: &mut KeyValueStore,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    push(store, state, arguments, false)
}

/// Handles LPUSH: each value is pushed to the head in turn, so the final
/// head order is the reverse of the argument order.
pub fn lpush(
    store: &mut KeyValueStore,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    push(store, state, arguments, true)
}

fn push(
    store: &mut KeyValueStore,
    state: &mut State,
    arguments: Vec<String>,
    left: bool,
) -> Result<String, CommandError> {
    let push_arguments =
        PushArguments::parse(arguments, if left { "lpush" } else { "rpush" })?;

    let list = store.get_or_create_list(&push_arguments.key)?;
    let pushed = push_arguments.values.len();

    for value in push_arguments.values {
        if left {
            list.push_front(value);
        } else {
            list.push_back(value);
        }
    }

    let length = list.len();
    state.notify_list_waiters(&push_arguments.key, pushed);

    Ok(RespValue::Integer(length as i64).encode())
}
