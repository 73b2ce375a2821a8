use crate::commands::command_error::CommandError;
use crate::commands::zset_utils::format_score;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub fn zscore(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 2 {
        return Err(CommandError::WrongNumberOfArguments("zscore".to_string()));
    }

    let score = store
        .get_sorted_set(&arguments[0])?
        .and_then(|set| set.score(&arguments[1]));

    match score {
        Some(score) => Ok(RespValue::BulkString(format_score(score)).encode()),
        None => Ok(RespValue::NullBulkString.encode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::zadd::zadd;

    #[test]
    fn test_zscore() {
        let mut store = KeyValueStore::new();
        zadd(
            &mut store,
            vec!["z".to_string(), "1.5".to_string(), "a".to_string()],
        )
        .unwrap();

        assert_eq!(
            zscore(&mut store, vec!["z".to_string(), "a".to_string()]),
            Ok("$3\r\n1.5\r\n".to_string())
        );
        assert_eq!(
            zscore(&mut store, vec!["z".to_string(), "missing".to_string()]),
            Ok("$-1\r\n".to_string())
        );
        assert_eq!(
            zscore(&mut store, vec!["nokey".to_string(), "a".to_string()]),
            Ok("$-1\r\n".to_string())
        );
    }
}
