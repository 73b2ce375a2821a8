//! Stream id parsing shared by XADD, XRANGE, and XREAD.

use crate::commands::command_error::CommandError;
use crate::key_value_store::{StreamEntry, StreamId};
use crate::resp::RespValue;

/// An id argument as XADD accepts it.
#[derive(Debug, PartialEq)]
pub enum XaddId {
    /// `*`: auto milliseconds and sequence.
    Auto,
    /// `<ms>-*`: explicit milliseconds, auto sequence.
    AutoSequence(u64),
    /// `<ms>-<seq>`.
    Explicit(StreamId),
}

pub fn parse_xadd_id(token: &str) -> Result<XaddId, CommandError> {
    if token == "*" {
        return Ok(XaddId::Auto);
    }

    let Some((ms_part, seq_part)) = token.split_once('-') else {
        return Err(CommandError::InvalidStreamId);
    };

    let ms = ms_part
        .parse::<u64>()
        .map_err(|_| CommandError::InvalidStreamId)?;

    if seq_part == "*" {
        return Ok(XaddId::AutoSequence(ms));
    }

    let seq = seq_part
        .parse::<u64>()
        .map_err(|_| CommandError::InvalidStreamId)?;

    Ok(XaddId::Explicit(StreamId::new(ms, seq)))
}

/// Parses an XRANGE/XREAD boundary id. A missing sequence defaults to
/// `default_seq` (0 for range starts and XREAD positions, MAX for range
/// ends). The `-`/`+` sentinels are handled by the caller.
pub fn parse_bound_id(token: &str, default_seq: u64) -> Result<StreamId, CommandError> {
    match token.split_once('-') {
        Some((ms_part, seq_part)) => {
            let ms = ms_part
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidStreamId)?;
            let seq = seq_part
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidStreamId)?;
            Ok(StreamId::new(ms, seq))
        }
        None => {
            let ms = token
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidStreamId)?;
            Ok(StreamId::new(ms, default_seq))
        }
    }
}

/// Renders entries as the nested `[id, [field, value, …]]` arrays XRANGE and
/// XREAD reply with.
pub fn entries_to_resp(entries: &[&StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let fields = entry
                    .fields
                    .iter()
                    .flat_map(|(field, value)| {
                        [
                            RespValue::BulkString(field.clone()),
                            RespValue::BulkString(value.clone()),
                        ]
                    })
                    .collect();

                RespValue::Array(vec![
                    RespValue::BulkString(entry.id.to_string()),
                    RespValue::Array(fields),
                ])
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xadd_id() {
        let test_cases = vec![
            ("*", Ok(XaddId::Auto)),
            ("5-*", Ok(XaddId::AutoSequence(5))),
            ("0-*", Ok(XaddId::AutoSequence(0))),
            ("1526919030474-0", Ok(XaddId::Explicit(StreamId::new(1526919030474, 0)))),
            ("0-0", Ok(XaddId::Explicit(StreamId::ZERO))),
            ("abc", Err(CommandError::InvalidStreamId)),
            ("1-2-3", Err(CommandError::InvalidStreamId)),
            ("-5", Err(CommandError::InvalidStreamId)),
            ("5-", Err(CommandError::InvalidStreamId)),
            ("5", Err(CommandError::InvalidStreamId)),
            ("1-x", Err(CommandError::InvalidStreamId)),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_xadd_id(input), expected, "parsing {:?}", input);
        }
    }

    #[test]
    fn test_parse_bound_id() {
        let test_cases = vec![
            ("5", 0, Ok(StreamId::new(5, 0))),
            ("5", u64::MAX, Ok(StreamId::new(5, u64::MAX))),
            ("5-3", 0, Ok(StreamId::new(5, 3))),
            ("5-3", u64::MAX, Ok(StreamId::new(5, 3))),
            ("x", 0, Err(CommandError::InvalidStreamId)),
            ("5-x", 0, Err(CommandError::InvalidStreamId)),
        ];

        for (input, default_seq, expected) in test_cases {
            assert_eq!(
                parse_bound_id(input, default_seq),
                expected,
                "parsing {:?} with default seq {}",
                input,
                default_seq
            );
        }
    }

    #[test]
    fn test_entries_to_resp() {
        let entry = StreamEntry {
            id: StreamId::new(1, 2),
            fields: vec![
                ("temperature".to_string(), "36".to_string()),
                ("humidity".to_string(), "95".to_string()),
            ],
        };

        let encoded = entries_to_resp(&[&entry]).encode();
        assert_eq!(
            encoded,
            "*1\r\n*2\r\n$3\r\n1-2\r\n*4\r\n$11\r\ntemperature\r\n$2\r\n36\r\n$8\r\nhumidity\r\n$2\r\n95\r\n"
        );
    }
}
