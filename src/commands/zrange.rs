use crate::commands::command_error::CommandError;
use crate::commands::zset_utils::format_score;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZrangeArguments {
    key: String,
    start: i64,
    stop: i64,
    with_scores: bool,
}

impl ZrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 && arguments.len() != 4 {
            return Err(CommandError::WrongNumberOfArguments("zrange".to_string()));
        }

        let start = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let stop = arguments[2]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        let with_scores = match arguments.get(3) {
            Some(token) if token.eq_ignore_ascii_case("withscores") => true,
            Some(_) => return Err(CommandError::SyntaxError),
            None => false,
        };

        Ok(Self {
            key: arguments[0].clone(),
            start,
            stop,
            with_scores,
        })
    }
}

/// Handles ZRANGE over `(score asc, member asc)` order. `WITHSCORES`
/// interleaves each member with its score.
pub fn zrange(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let zrange_arguments = ZrangeArguments::parse(arguments)?;

    let Some(set) = store.get_sorted_set(&zrange_arguments.key)? else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let mut reply = Vec::new();
    for (member, score) in set.range(zrange_arguments.start, zrange_arguments.stop) {
        reply.push(RespValue::BulkString(member));
        if zrange_arguments.with_scores {
            reply.push(RespValue::BulkString(format_score(score)));
        }
    }

    Ok(RespValue::Array(reply).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::zadd::zadd;

    fn seeded_store() -> KeyValueStore {
        let mut store = KeyValueStore::new();
        zadd(
            &mut store,
            vec![
                "z".to_string(),
                "3".to_string(),
                "c".to_string(),
                "1".to_string(),
                "a".to_string(),
                "2".to_string(),
                "b".to_string(),
            ],
        )
        .unwrap();
        store
    }

    #[test]
    fn test_zrange_order_and_negatives() {
        let mut store = seeded_store();

        assert_eq!(
            zrange(
                &mut store,
                vec!["z".to_string(), "0".to_string(), "-1".to_string()],
            ),
            Ok("*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n".to_string())
        );
        assert_eq!(
            zrange(
                &mut store,
                vec!["z".to_string(), "-2".to_string(), "-1".to_string()],
            ),
            Ok("*2\r\n$1\r\nb\r\n$1\r\nc\r\n".to_string())
        );
    }

    #[test]
    fn test_zrange_with_scores_interleaves() {
        let mut store = seeded_store();

        assert_eq!(
            zrange(
                &mut store,
                vec![
                    "z".to_string(),
                    "0".to_string(),
                    "1".to_string(),
                    "WITHSCORES".to_string(),
                ],
            ),
            Ok("*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n".to_string())
        );
    }

    #[test]
    fn test_zrange_missing_key_and_errors() {
        let mut store = KeyValueStore::new();

        assert_eq!(
            zrange(
                &mut store,
                vec!["missing".to_string(), "0".to_string(), "-1".to_string()],
            ),
            Ok("*0\r\n".to_string())
        );
        assert_eq!(
            zrange(
                &mut store,
                vec![
                    "z".to_string(),
                    "0".to_string(),
                    "-1".to_string(),
                    "NOTANOPTION".to_string(),
                ],
            ),
            Err(CommandError::SyntaxError)
        );
    }
}
