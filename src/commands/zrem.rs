use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

/// Handles ZREM. Removing the last member destroys the key.
pub fn zrem(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() < 2 {
        return Err(CommandError::WrongNumberOfArguments("zrem".to_string()));
    }

    let key = arguments[0].clone();

    let Some(set) = store.get_sorted_set_mut(&key)? else {
        return Ok(RespValue::Integer(0).encode());
    };

    let mut removed = 0;
    for member in &arguments[1..] {
        if set.remove(member) {
            removed += 1;
        }
    }

    let emptied = set.is_empty();
    if emptied {
        store.remove(&key);
    }

    Ok(RespValue::Integer(removed).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::zadd::zadd;

    #[test]
    fn test_zrem() {
        let mut store = KeyValueStore::new();
        zadd(
            &mut store,
            vec![
                "z".to_string(),
                "1".to_string(),
                "a".to_string(),
                "2".to_string(),
                "b".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(
            zrem(
                &mut store,
                vec!["z".to_string(), "a".to_string(), "missing".to_string()],
            ),
            Ok(":1\r\n".to_string())
        );
        assert_eq!(
            zrem(&mut store, vec!["z".to_string(), "b".to_string()]),
            Ok(":1\r\n".to_string())
        );
        assert!(
            store.get("z").is_none(),
            "removing the last member destroys the key"
        );
        assert_eq!(
            zrem(&mut store, vec!["z".to_string(), "a".to_string()]),
            Ok(":0\r\n".to_string())
        );
    }
}
