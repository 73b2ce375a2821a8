//! RESP wire protocol framing.
//!
//! The parser consumes an append-only byte buffer and yields one frame at a
//! time together with the number of bytes it occupied on the wire. Callers
//! keep unconsumed bytes in their buffer; `Ok(None)` means "need more bytes"
//! and no progress is discarded. A hard `RespError` poisons the connection.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP type byte: {0}")]
    UnknownTypeByte(u8),
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
}

impl RespError {
    pub fn as_resp_string(&self) -> String {
        RespValue::Error(format!("ERR Protocol error: {}", self)).encode()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
    NullArray,
}

impl RespValue {
    /// Serializes the frame into its RESP wire form.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(s) => format!("-{}\r\n", s),
            RespValue::Integer(i) => format!(":{}\r\n", i),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());
                for element in elements {
                    encoded.push_str(&element.encode());
                }
                encoded
            }
            RespValue::NullArray => "*-1\r\n".to_string(),
        }
    }

    /// Encodes a flat list of strings as an array of bulk strings.
    pub fn encode_array_from_strings<I, S>(items: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            items
                .into_iter()
                .map(|item| RespValue::BulkString(item.into()))
                .collect(),
        )
        .encode()
    }

    /// Builds the array-of-bulk-strings form used for every outbound command
    /// (primary→replica propagation and the replica handshake).
    pub fn command<I, S>(parts: I) -> RespValue
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|part| RespValue::BulkString(part.into()))
                .collect(),
        )
    }
}

/// Attempts to parse one complete frame from the start of `buffer`.
///
/// Returns `Ok(Some((frame, consumed)))` on success, where `consumed` is the
/// exact number of wire bytes the frame occupied; for a canonical
/// array-of-bulk-strings command this equals `frame.encode().len()`, which is
/// what replica offset accounting relies on. Returns `Ok(None)` when the
/// buffer holds only a prefix of a frame.
pub fn parse_frame(buffer: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    parse_at(buffer, 0)
}

/// Attempts to parse the raw snapshot payload frame `$<n>\r\n<n bytes>`.
///
/// Unlike a bulk string there is no trailing CRLF; this frame appears exactly
/// once on a replication link, directly after the `FULLRESYNC` reply. The
/// caller primes this mode explicitly, then returns to [`parse_frame`].
pub fn parse_raw_payload(buffer: &[u8]) -> Result<Option<(Vec<u8>, usize)>, RespError> {
    if buffer.is_empty() {
        return Ok(None);
    }

    if buffer[0] != b'$' {
        return Err(RespError::InvalidBulkString);
    }

    let Some(header_end) = find_crlf(buffer, 1) else {
        return Ok(None);
    };

    let length = parse_usize(&buffer[1..header_end])?;
    let payload_start = header_end + 2;

    if buffer.len() < payload_start + length {
        return Ok(None);
    }

    Ok(Some((
        buffer[payload_start..payload_start + length].to_vec(),
        payload_start + length,
    )))
}

fn parse_at(buffer: &[u8], cursor: usize) -> Result<Option<(RespValue, usize)>, RespError> {
    if cursor >= buffer.len() {
        return Ok(None);
    }

    let Some(line_end) = find_crlf(buffer, cursor + 1) else {
        return Ok(None);
    };

    let line = str::from_utf8(&buffer[cursor + 1..line_end]).map_err(|_| RespError::InvalidUtf8)?;

    match buffer[cursor] {
        b'+' => Ok(Some((
            RespValue::SimpleString(line.to_string()),
            line_end + 2,
        ))),
        b'-' => Ok(Some((RespValue::Error(line.to_string()), line_end + 2))),
        b':' => {
            let value = line
                .parse::<i64>()
                .map_err(|_| RespError::FailedToParseInteger)?;
            Ok(Some((RespValue::Integer(value), line_end + 2)))
        }
        b'$' => parse_bulk_string(buffer, line, line_end + 2),
        b'*' => parse_array(buffer, line, line_end + 2),
        other => Err(RespError::UnknownTypeByte(other)),
    }
}

fn parse_bulk_string(
    buffer: &[u8],
    length_line: &str,
    content_start: usize,
) -> Result<Option<(RespValue, usize)>, RespError> {
    if length_line == "-1" {
        return Ok(Some((RespValue::NullBulkString, content_start)));
    }

    let length = parse_usize(length_line.as_bytes())?;
    let content_end = content_start + length;

    if buffer.len() < content_end + 2 {
        return Ok(None);
    }

    if &buffer[content_end..content_end + 2] != b"\r\n" {
        return Err(RespError::InvalidBulkString);
    }

    let content =
        str::from_utf8(&buffer[content_start..content_end]).map_err(|_| RespError::InvalidUtf8)?;

    Ok(Some((
        RespValue::BulkString(content.to_string()),
        content_end + 2,
    )))
}

fn parse_array(
    buffer: &[u8],
    length_line: &str,
    mut cursor: usize,
) -> Result<Option<(RespValue, usize)>, RespError> {
    if length_line == "-1" {
        return Ok(Some((RespValue::NullArray, cursor)));
    }

    let length = parse_usize(length_line.as_bytes()).map_err(|_| RespError::InvalidArray)?;
    let mut elements = Vec::with_capacity(length);

    while elements.len() < length {
        match parse_at(buffer, cursor)? {
            Some((element, next_cursor)) => {
                elements.push(element);
                cursor = next_cursor;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((RespValue::Array(elements), cursor)))
}

fn parse_usize(digits: &[u8]) -> Result<usize, RespError> {
    str::from_utf8(digits)
        .map_err(|_| RespError::InvalidUtf8)?
        .parse::<usize>()
        .map_err(|_| RespError::FailedToParseInteger)
}

fn find_crlf(buffer: &[u8], from: usize) -> Option<usize> {
    if from >= buffer.len() {
        return None;
    }

    buffer[from..]
        .windows(2)
        .position(|window| window == b"\r\n")
        .map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let test_cases = vec![
            (RespValue::SimpleString("OK".to_string()), "+OK\r\n"),
            (
                RespValue::Error("ERR syntax error".to_string()),
                "-ERR syntax error\r\n",
            ),
            (RespValue::Integer(42), ":42\r\n"),
            (RespValue::Integer(-3), ":-3\r\n"),
            (RespValue::BulkString("hello".to_string()), "$5\r\nhello\r\n"),
            (RespValue::BulkString("".to_string()), "$0\r\n\r\n"),
            (RespValue::NullBulkString, "$-1\r\n"),
            (RespValue::NullArray, "*-1\r\n"),
            (RespValue::Array(Vec::new()), "*0\r\n"),
            (
                RespValue::Array(vec![
                    RespValue::BulkString("GET".to_string()),
                    RespValue::BulkString("key".to_string()),
                ]),
                "*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n",
            ),
            (
                RespValue::Array(vec![
                    RespValue::BulkString("message".to_string()),
                    RespValue::BulkString("news".to_string()),
                    RespValue::Integer(1),
                ]),
                "*3\r\n$7\r\nmessage\r\n$4\r\nnews\r\n:1\r\n",
            ),
        ];

        for (value, expected) in test_cases {
            assert_eq!(value.encode(), expected, "encoding {:?}", value);
        }
    }

    #[test]
    fn test_parse_frame_complete() {
        let test_cases = vec![
            ("+PONG\r\n", RespValue::SimpleString("PONG".to_string())),
            ("-ERR oops\r\n", RespValue::Error("ERR oops".to_string())),
            (":1000\r\n", RespValue::Integer(1000)),
            (":-5\r\n", RespValue::Integer(-5)),
            ("$4\r\nPING\r\n", RespValue::BulkString("PING".to_string())),
            ("$-1\r\n", RespValue::NullBulkString),
            ("*-1\r\n", RespValue::NullArray),
            (
                "*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n",
                RespValue::Array(vec![
                    RespValue::BulkString("ECHO".to_string()),
                    RespValue::BulkString("hey".to_string()),
                ]),
            ),
            (
                "*2\r\n*1\r\n$1\r\na\r\n:7\r\n",
                RespValue::Array(vec![
                    RespValue::Array(vec![RespValue::BulkString("a".to_string())]),
                    RespValue::Integer(7),
                ]),
            ),
        ];

        for (input, expected) in test_cases {
            let result = parse_frame(input.as_bytes());
            assert_eq!(
                result,
                Ok(Some((expected, input.len()))),
                "parsing {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_frame_consumed_matches_encoded_length() {
        let command = RespValue::command(["SET", "key", "value"]);
        let encoded = command.encode();

        let (parsed, consumed) = parse_frame(encoded.as_bytes()).unwrap().unwrap();
        assert_eq!(parsed, command);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_parse_frame_incomplete() {
        let test_cases = vec![
            "",
            "+PON",
            "$5\r\nhel",
            "$5\r\nhello",
            "*2\r\n$4\r\nECHO\r\n",
            "*2\r\n$4\r\nECHO\r\n$3\r\nhe",
        ];

        for input in test_cases {
            assert_eq!(
                parse_frame(input.as_bytes()),
                Ok(None),
                "parsing incomplete input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_frame_leaves_trailing_bytes() {
        let input = b"+OK\r\n:5\r\n";
        let (first, consumed) = parse_frame(input).unwrap().unwrap();

        assert_eq!(first, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);

        let (second, consumed) = parse_frame(&input[consumed..]).unwrap().unwrap();
        assert_eq!(second, RespValue::Integer(5));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_parse_frame_errors() {
        let test_cases = vec![
            ("?what\r\n", RespError::UnknownTypeByte(b'?')),
            (":notanumber\r\n", RespError::FailedToParseInteger),
            ("$abc\r\nxx\r\n", RespError::FailedToParseInteger),
            ("$2\r\nxxyy\r\n", RespError::InvalidBulkString),
        ];

        for (input, expected) in test_cases {
            assert_eq!(
                parse_frame(input.as_bytes()),
                Err(expected),
                "parsing {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_raw_payload() {
        // No trailing CRLF after the payload bytes.
        let mut input = b"$5\r\nREDIS".to_vec();
        input.extend_from_slice(b"+OK\r\n");

        let (payload, consumed) = parse_raw_payload(&input).unwrap().unwrap();
        assert_eq!(payload, b"REDIS");
        assert_eq!(consumed, 9);
        assert_eq!(&input[consumed..], b"+OK\r\n");
    }

    #[test]
    fn test_parse_raw_payload_incomplete() {
        assert_eq!(parse_raw_payload(b""), Ok(None));
        assert_eq!(parse_raw_payload(b"$10\r\nabc"), Ok(None));
        assert_eq!(parse_raw_payload(b"$10"), Ok(None));
    }

    #[test]
    fn test_parse_raw_payload_wrong_frame() {
        assert_eq!(
            parse_raw_payload(b"+FULLRESYNC\r\n"),
            Err(RespError::InvalidBulkString)
        );
    }

    #[test]
    fn test_encode_array_from_strings() {
        assert_eq!(
            RespValue::encode_array_from_strings(vec!["mylist".to_string(), "value".to_string()]),
            "*2\r\n$6\r\nmylist\r\n$5\r\nvalue\r\n"
        );
    }
}
