use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub fn zrank(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 2 {
        return Err(CommandError::WrongNumberOfArguments("zrank".to_string()));
    }

    let rank = store
        .get_sorted_set(&arguments[0])?
        .and_then(|set| set.rank(&arguments[1]));

    match rank {
        Some(rank) => Ok(RespValue::Integer(rank as i64).encode()),
        None => Ok(RespValue::NullBulkString.encode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::zadd::zadd;

    #[test]
    fn test_zrank() {
        let mut store = KeyValueStore::new();
        zadd(
            &mut store,
            vec![
                "z".to_string(),
                "2".to_string(),
                "b".to_string(),
                "1".to_string(),
                "a".to_string(),
            ],
        )
        .unwrap();

        let test_cases = vec![
            (vec!["z".to_string(), "a".to_string()], ":0\r\n"),
            (vec!["z".to_string(), "b".to_string()], ":1\r\n"),
            (vec!["z".to_string(), "missing".to_string()], "$-1\r\n"),
            (vec!["nokey".to_string(), "a".to_string()], "$-1\r\n"),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(
                zrank(&mut store, arguments.clone()),
                Ok(expected.to_string()),
                "ZRANK {:?}",
                arguments
            );
        }
    }
}
