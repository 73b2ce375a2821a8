use globset::Glob;

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

/// Handles KEYS. Patterns support `*`, `?`, character classes `[…]` with
/// ranges, and `\` escaping, via glob matching.
pub fn keys(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments("keys".to_string()));
    }

    let matcher = Glob::new(&arguments[0])
        .map_err(|_| CommandError::SyntaxError)?
        .compile_matcher();

    let mut matched: Vec<String> = store
        .live_keys()
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .collect();
    matched.sort();

    Ok(RespValue::Array(matched.into_iter().map(RespValue::BulkString).collect()).encode())
}
