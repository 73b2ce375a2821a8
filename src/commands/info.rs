use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::server::RedisServer;

/// Handles INFO. Only the replication section carries data; it is returned
/// for the bare form and for `INFO replication` alike.
pub fn info(server: &RedisServer, arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() > 1 {
        return Err(CommandError::WrongNumberOfArguments("info".to_string()));
    }

    Ok(RespValue::BulkString(server.info_replication()).encode())
}
