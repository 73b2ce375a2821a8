use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub fn type_command(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments("type".to_string()));
    }

    Ok(RespValue::SimpleString(store.type_name_of(&arguments[0]).to_string()).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_value_store::{DataType, Stream, Value};

    #[test]
    fn test_type_command() {
        let mut store = KeyValueStore::new();
        store.insert(
            "s".to_string(),
            Value::new(DataType::String("x".to_string())),
        );
        store.insert("st".to_string(), Value::new(DataType::Stream(Stream::new())));

        let test_cases = vec![
            ("s", "+string\r\n"),
            ("st", "+stream\r\n"),
            ("missing", "+none\r\n"),
        ];

        for (key, expected) in test_cases {
            assert_eq!(
                type_command(&mut store, vec![key.to_string()]),
                Ok(expected.to_string()),
                "TYPE {}",
                key
            );
        }
    }
}
