use crate::commands::command_error::CommandError;
use crate::resp::RespValue;

pub fn echo(arguments: Vec<String>) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments("echo".to_string()));
    }

    Ok(RespValue::BulkString(arguments[0].clone()).encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        assert_eq!(
            echo(vec!["hey".to_string()]),
            Ok("$3\r\nhey\r\n".to_string())
        );
        assert_eq!(
            echo(vec![]),
            Err(CommandError::WrongNumberOfArguments("echo".to_string()))
        );
    }
}
