use crate::commands::command_error::CommandError;
use crate::commands::stream_utils::{parse_xadd_id, XaddId};
use crate::key_value_store::{now_ms, KeyValueStore, StreamEntry, StreamId};
use crate::resp::RespValue;
use crate::state::State;

pub struct XaddArguments {
    key: String,
    id: XaddId,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xadd".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            id: parse_xadd_id(&arguments[1])?,
            fields: arguments[2..]
                .chunks(2)
                .map(|chunk| (chunk[0].clone(), chunk[1].clone()))
                .collect(),
        })
    }
}

/// Handles XADD. The id is validated (and auto-generated where requested)
/// against the stream's current tail before anything is appended, so a
/// rejected id leaves the stream untouched and never creates the key.
pub fn xadd(
    store: &mut KeyValueStore,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let last_id = store
        .get_stream(&xadd_arguments.key)?
        .and_then(|stream| stream.last_id());
    let id = resolve_id(xadd_arguments.id, last_id)?;

    let stream = store.get_or_create_stream(&xadd_arguments.key)?;
    stream.append(StreamEntry {
        id,
        fields: xadd_arguments.fields,
    });

    state.notify_stream_waiters(&xadd_arguments.key, id);

    Ok(RespValue::BulkString(id.to_string()).encode())
}

/// Applies the id rules against the current tail:
///
/// - `*`: milliseconds from the wall clock, bumped onto the tail's
///   millisecond when the clock lags it; sequence per the auto rule.
/// - `<ms>-*`: sequence 0 for a fresh millisecond, last+1 within the tail's
///   millisecond, 1 only for `0-*` on an empty stream.
/// - explicit ids must be greater than the tail, and `0-0` is always
///   rejected.
fn resolve_id(id: XaddId, last_id: Option<StreamId>) -> Result<StreamId, CommandError> {
    match id {
        XaddId::Auto => {
            let ms = now_ms().max(0) as u64;

            match last_id {
                Some(last) if ms <= last.ms => next_in_ms(last),
                _ => Ok(StreamId::new(ms, 0)),
            }
        }
        XaddId::AutoSequence(ms) => match last_id {
            None => Ok(StreamId::new(ms, if ms == 0 { 1 } else { 0 })),
            Some(last) => {
                if ms < last.ms {
                    Err(CommandError::StreamIdTooSmall)
                } else if ms == last.ms {
                    next_in_ms(last)
                } else {
                    Ok(StreamId::new(ms, 0))
                }
            }
        },
        XaddId::Explicit(id) => {
            if id == StreamId::ZERO {
                return Err(CommandError::StreamIdZero);
            }

            match last_id {
                Some(last) if id <= last => Err(CommandError::StreamIdTooSmall),
                _ => Ok(id),
            }
        }
    }
}

fn next_in_ms(last: StreamId) -> Result<StreamId, CommandError> {
    let seq = last
        .seq
        .checked_add(1)
        .ok_or(CommandError::StreamIdTooSmall)?;

    Ok(StreamId::new(last.ms, seq))
}
