use crate::commands::command_error::CommandError;
use crate::geo;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

/// Handles GEOPOS. Each requested member maps to a `[longitude, latitude]`
/// pair decoded from its score, or a null array when absent.
pub fn geopos(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() < 2 {
        return Err(CommandError::WrongNumberOfArguments("geopos".to_string()));
    }

    let set = store.get_sorted_set(&arguments[0])?;

    let mut reply = Vec::with_capacity(arguments.len() - 1);
    for member in &arguments[1..] {
        let score = set.as_ref().and_then(|set| set.score(member));

        match score {
            Some(score) => {
                let (longitude, latitude) = geo::decode(score as u64);
                reply.push(RespValue::Array(vec![
                    RespValue::BulkString(format!("{:.17}", longitude)),
                    RespValue::BulkString(format!("{:.17}", latitude)),
                ]));
            }
            None => reply.push(RespValue::NullArray),
        }
    }

    Ok(RespValue::Array(reply).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::geoadd::geoadd;

    #[test]
    fn test_geopos_round_trips_within_cell() {
        let mut store = KeyValueStore::new();
        geoadd(
            &mut store,
            vec![
                "p".to_string(),
                "13.361389".to_string(),
                "38.115556".to_string(),
                "Palermo".to_string(),
            ],
        )
        .unwrap();

        let reply = geopos(
            &mut store,
            vec!["p".to_string(), "Palermo".to_string(), "ghost".to_string()],
        )
        .unwrap();

        assert!(reply.starts_with("*2\r\n"));
        assert!(reply.contains("13.36138"), "longitude in reply: {}", reply);
        assert!(reply.contains("38.11555"), "latitude in reply: {}", reply);
        assert!(reply.ends_with("*-1\r\n"), "missing member is null");
    }

    #[test]
    fn test_geopos_missing_key() {
        let mut store = KeyValueStore::new();

        assert_eq!(
            geopos(&mut store, vec!["none".to_string(), "m".to_string()]),
            Ok("*1\r\n*-1\r\n".to_string())
        );
    }
}
