use crate::commands::command_error::CommandError;
use crate::resp::RespValue;
use crate::server::RedisServer;

/// Handles REPLCONF on the primary side.
///
/// `listening-port` and `capa` arrive during a replica's handshake and are
/// recorded against the pending link; `ACK <offset>` arrives on an
/// established link and updates its offset without producing a reply (the
/// empty string tells the connection loop to write nothing).
pub fn replconf(
    client_address: &str,
    server: &mut RedisServer,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    if arguments.is_empty() {
        return Err(CommandError::WrongNumberOfArguments("replconf".to_string()));
    }

    match arguments[0].to_lowercase().as_str() {
        "listening-port" => {
            let port = arguments
                .get(1)
                .and_then(|raw| raw.parse::<u16>().ok())
                .ok_or(CommandError::SyntaxError)?;

            server.record_replica_port(client_address, port);
            Ok(RespValue::SimpleString("OK".to_string()).encode())
        }
        "capa" => {
            server.record_replica_capabilities(client_address, arguments[1..].to_vec());
            Ok(RespValue::SimpleString("OK".to_string()).encode())
        }
        "ack" => {
            let offset = arguments
                .get(1)
                .and_then(|raw| raw.parse::<u64>().ok())
                .ok_or(CommandError::SyntaxError)?;

            server.record_ack(client_address, offset);
            Ok(String::new())
        }
        _ => Ok(RespValue::SimpleString("OK".to_string()).encode()),
    }
}
