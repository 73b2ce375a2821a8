use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub fn llen(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments("llen".to_string()));
    }

    let length = match store.get_list_mut(&arguments[0])? {
        Some(list) => list.len(),
        None => 0,
    };

    Ok(RespValue::Integer(length as i64).encode())
}
