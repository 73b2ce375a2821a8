use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct GetArguments {
    key: String,
}

impl GetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("get".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// Handles GET. Absent and expired keys both read as null.
pub fn get(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    match store.get_string(&get_arguments.key)? {
        Some(value) => Ok(RespValue::BulkString(value.clone()).encode()),
        None => Ok(RespValue::NullBulkString.encode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_value_store::{now_ms, DataType, Value};

    #[test]
    fn test_get() {
        let mut store = KeyValueStore::new();
        store.insert(
            "k".to_string(),
            Value::new(DataType::String("v".to_string())),
        );
        store.insert(
            "expired".to_string(),
            Value {
                data: DataType::String("v".to_string()),
                expires_at: Some(now_ms() - 10),
            },
        );
        store.insert(
            "list".to_string(),
            Value::new(DataType::Array(Default::default())),
        );

        let test_cases = vec![
            (vec!["k".to_string()], Ok("$1\r\nv\r\n".to_string())),
            (vec!["missing".to_string()], Ok("$-1\r\n".to_string())),
            (vec!["expired".to_string()], Ok("$-1\r\n".to_string())),
            (
                vec!["list".to_string()],
                Err(CommandError::WrongTypeOperation),
            ),
            (
                vec![],
                Err(CommandError::WrongNumberOfArguments("get".to_string())),
            ),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(
                get(&mut store, arguments.clone()),
                expected,
                "GET {:?}",
                arguments
            );
        }
    }
}
