use globset::Glob;

use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::server::RedisServer;

/// Handles CONFIG GET. Returns a flat `[name, value, …]` array of every
/// configuration parameter matching any of the glob patterns.
pub fn config_get(server: &RedisServer, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() < 2 || !arguments[0].eq_ignore_ascii_case("get") {
        return Err(CommandError::WrongNumberOfArguments("config".to_string()));
    }

    let mut matchers = Vec::with_capacity(arguments.len() - 1);
    for pattern in &arguments[1..] {
        matchers.push(
            Glob::new(&pattern.to_lowercase())
                .map_err(|_| CommandError::SyntaxError)?
                .compile_matcher(),
        );
    }

    let mut reply = Vec::new();
    for (name, value) in server.config_parameters() {
        if matchers.iter().any(|matcher| matcher.is_match(&name)) {
            reply.push(RespValue::BulkString(name));
            reply.push(RespValue::BulkString(value));
        }
    }

    Ok(RespValue::Array(reply).encode())
}
