//! Integer counters: INCR, DECR, INCRBY, DECRBY.
//!
//! An absent key counts from zero; a string that does not parse as a signed
//! 64-bit integer, or an operation that would overflow one, fails without
//! mutating.

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore, Value};
use crate::resp::RespValue;

pub fn incr(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let key = single_key(arguments, "incr")?;
    apply_delta(store, &key, 1)
}

pub fn decr(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let key = single_key(arguments, "decr")?;
    apply_delta(store, &key, -1)
}

pub fn incrby(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let (key, delta) = key_and_delta(arguments, "incrby")?;
    apply_delta(store, &key, delta)
}

pub fn decrby(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let (key, delta) = key_and_delta(arguments, "decrby")?;
    apply_delta(store, &key, delta.checked_neg().ok_or(CommandError::NotAnInteger)?)
}

fn single_key(arguments: Vec<String>, command: &str) -> Result<String, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::WrongNumberOfArguments(command.to_string()));
    }

    Ok(arguments[0].clone())
}

fn key_and_delta(arguments: Vec<String>, command: &str) -> Result<(String, i64), CommandError> {
    if arguments.len() != 2 {
        return Err(CommandError::WrongNumberOfArguments(command.to_string()));
    }

    let delta = arguments[1]
        .parse::<i64>()
        .map_err(|_| CommandError::NotAnInteger)?;

    Ok((arguments[0].clone(), delta))
}

fn apply_delta(store: &mut KeyValueStore, key: &str, delta: i64) -> Result<String, CommandError> {
    match store.get_mut(key) {
        Some(Value {
            data: DataType::String(value),
            ..
        }) => {
            let current = value
                .parse::<i64>()
                .map_err(|_| CommandError::NotAnInteger)?;
            let next = current.checked_add(delta).ok_or(CommandError::NotAnInteger)?;

            *value = next.to_string();
            Ok(RespValue::Integer(next).encode())
        }
        Some(_) => Err(CommandError::WrongTypeOperation),
        None => {
            store.insert(
                key.to_string(),
                Value::new(DataType::String(delta.to_string())),
            );
            Ok(RespValue::Integer(delta).encode())
        }
    }
}
