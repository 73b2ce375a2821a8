use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

/// Handles DEL. Expired entries count as already gone.
pub fn del(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("del".to_string()));
    }

    let mut removed = 0;

    for key in &arguments {
        if store.get(key).is_some() {
            store.remove(key);
            removed += 1;
        }
    }

    Ok(RespValue::Integer(removed).encode())
}
