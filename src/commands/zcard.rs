use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub fn zcard(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments("zcard".to_string()));
    }

    let cardinality = match store.get_sorted_set(&arguments[0])? {
        Some(set) => set.len(),
        None => 0,
    };

    Ok(RespValue::Integer(cardinality as i64).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::zadd::zadd;

    #[test]
    fn test_zcard() {
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
            zcard(&mut store, vec!["z".to_string()]),
            Ok(":2\r\n".to_string())
        );
        assert_eq!(
            zcard(&mut store, vec!["missing".to_string()]),
            Ok(":0\r\n".to_string())
        );
    }
}
