use crate::commands::command_error::CommandError;
use crate::rdb;
use crate::resp::RespValue;
use crate::server::RedisServer;

pub struct PsyncArguments {
    repl_id: String,
}

impl PsyncArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("psync".to_string()));
        }

        if arguments[1] != "-1" && arguments[1].parse::<u64>().is_err() {
            return Err(CommandError::InvalidPsyncRequest);
        }

        Ok(Self {
            repl_id: arguments[0].clone(),
        })
    }
}

/// Handles PSYNC on the primary. Always answers with a full resynchronization:
/// the `FULLRESYNC` header followed by a raw snapshot payload. The caller
/// registers the connection as a replica link once both are on the wire.
pub fn psync(
    server: &RedisServer,
    arguments: Vec<String>,
) -> Result<(String, Vec<u8>), CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    if psync_arguments.repl_id != "?" && psync_arguments.repl_id != server.repl_id {
        return Err(CommandError::InvalidPsyncRequest);
    }

    let header = RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        server.repl_id, server.repl_offset
    ))
    .encode();

    Ok((header, rdb::empty_snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psync_full_resync_reply() {
        let server = RedisServer::new(vec!["riptide".to_string()]).unwrap();

        let (header, snapshot) = psync(
            &server,
            vec!["?".to_string(), "-1".to_string()],
        )
        .unwrap();

        assert_eq!(
            header,
            format!("+FULLRESYNC {} 0\r\n", server.repl_id)
        );
        assert!(snapshot.starts_with(b"REDIS"));
    }

    #[test]
    fn test_psync_rejects_foreign_repl_id() {
        let server = RedisServer::new(vec!["riptide".to_string()]).unwrap();

        assert_eq!(
            psync(
                &server,
                vec!["0123456789012345678901234567890123456789".to_string(), "-1".to_string()],
            )
            .err(),
            Some(CommandError::InvalidPsyncRequest)
        );
        assert_eq!(
            psync(&server, vec!["?".to_string()]).err(),
            Some(CommandError::WrongNumberOfArguments("psync".to_string()))
        );
    }
}
