use crate::commands::command_error::CommandError;
use crate::commands::zset_utils::parse_score;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZaddArguments {
    key: String,
    pairs: Vec<(f64, String)>,
}

impl ZaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 || arguments[1..].len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("zadd".to_string()));
        }

        let mut pairs = Vec::with_capacity((arguments.len() - 1) / 2);
        for chunk in arguments[1..].chunks(2) {
            pairs.push((parse_score(&chunk[0])?, chunk[1].clone()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            pairs,
        })
    }
}

/// Handles ZADD. Returns the number of members that were newly added;
/// existing members get their score updated without affecting the count.
pub fn zadd(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let zadd_arguments = ZaddArguments::parse(arguments)?;

    let set = store.get_or_create_sorted_set(&zadd_arguments.key)?;
    let mut added = 0;

    for (score, member) in zadd_arguments.pairs {
        if set.insert(member, score) {
            added += 1;
        }
    }

    Ok(RespValue::Integer(added).encode())
}
