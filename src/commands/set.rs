use crate::commands::command_error::CommandError;
use crate::key_value_store::{now_ms, DataType, KeyValueStore, Value};
use crate::resp::RespValue;

pub struct SetArguments {
    key: String,
    value: String,
    expires_at: Option<i64>,
}

impl SetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::WrongNumberOfArguments("set".to_string()));
        }

        let mut expires_at = None;

        if arguments.len() == 4 {
            let unit_ms = match arguments[2].to_lowercase().as_str() {
                "px" => 1,
                "ex" => 1000,
                _ => return Err(CommandError::SyntaxError),
            };

            let duration = arguments[3]
                .parse::<i64>()
                .map_err(|_| CommandError::InvalidExpireTime)?;

            if duration <= 0 {
                return Err(CommandError::InvalidExpireTime);
            }

            expires_at = Some(now_ms() + duration * unit_ms);
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expires_at,
        })
    }
}

/// Handles SET. Overwrites any prior entry regardless of its kind.
pub fn set(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    store.insert(
        set_arguments.key,
        Value {
            data: DataType::String(set_arguments.value),
            expires_at: set_arguments.expires_at,
        },
    );

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_any_kind() {
        let mut store = KeyValueStore::new();
        store.insert(
            "k".to_string(),
            Value::new(DataType::Array(Default::default())),
        );

        let result = set(
            &mut store,
            vec!["k".to_string(), "v".to_string()],
        );
        assert_eq!(result, Ok("+OK\r\n".to_string()));
        assert_eq!(store.get_string("k").unwrap(), Some(&"v".to_string()));
    }

    #[test]
    fn test_set_with_expiry_options() {
        let mut store = KeyValueStore::new();

        let before = now_ms();
        set(
            &mut store,
            vec![
                "k".to_string(),
                "v".to_string(),
                "PX".to_string(),
                "100".to_string(),
            ],
        )
        .unwrap();

        let deadline = store.get("k").unwrap().expires_at.unwrap();
        assert!(deadline >= before + 100 && deadline <= now_ms() + 100);

        set(
            &mut store,
            vec![
                "k".to_string(),
                "v".to_string(),
                "EX".to_string(),
                "5".to_string(),
            ],
        )
        .unwrap();
        let deadline = store.get("k").unwrap().expires_at.unwrap();
        assert!(deadline >= before + 5_000);
    }

    #[test]
    fn test_set_argument_errors() {
        let mut store = KeyValueStore::new();

        let test_cases = vec![
            (
                vec!["k".to_string()],
                CommandError::WrongNumberOfArguments("set".to_string()),
            ),
            (
                vec![
                    "k".to_string(),
                    "v".to_string(),
                    "XX".to_string(),
                    "100".to_string(),
                ],
                CommandError::SyntaxError,
            ),
            (
                vec![
                    "k".to_string(),
                    "v".to_string(),
                    "PX".to_string(),
                    "abc".to_string(),
                ],
                CommandError::InvalidExpireTime,
            ),
            (
                vec![
                    "k".to_string(),
                    "v".to_string(),
                    "PX".to_string(),
                    "0".to_string(),
                ],
                CommandError::InvalidExpireTime,
            ),
            (
                vec![
                    "k".to_string(),
                    "v".to_string(),
                    "EX".to_string(),
                    "-1".to_string(),
                ],
                CommandError::InvalidExpireTime,
            ),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(
                set(&mut store, arguments.clone()),
                Err(expected),
                "SET {:?}",
                arguments
            );
        }
    }
}
