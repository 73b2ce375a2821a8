use crate::commands::command_error::CommandError;
use crate::geo::{self, DistanceUnit};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct GeodistArguments {
    key: String,
    from: String,
    to: String,
    unit: DistanceUnit,
}

impl GeodistArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 && arguments.len() != 4 {
            return Err(CommandError::WrongNumberOfArguments("geodist".to_string()));
        }

        let unit = match arguments.get(3) {
            Some(token) => DistanceUnit::parse(token).ok_or(CommandError::UnsupportedUnit)?,
            None => DistanceUnit::Meters,
        };

        Ok(Self {
            key: arguments[0].clone(),
            from: arguments[1].clone(),
            to: arguments[2].clone(),
            unit,
        })
    }
}

/// Handles GEODIST: haversine distance between two stored members, converted
/// to the requested unit. Null when either member is absent.
pub fn geodist(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let geodist_arguments = GeodistArguments::parse(arguments)?;

    let Some(set) = store.get_sorted_set(&geodist_arguments.key)? else {
        return Ok(RespValue::NullBulkString.encode());
    };

    let (Some(from_score), Some(to_score)) = (
        set.score(&geodist_arguments.from),
        set.score(&geodist_arguments.to),
    ) else {
        return Ok(RespValue::NullBulkString.encode());
    };

    let (from_lon, from_lat) = geo::decode(from_score as u64);
    let (to_lon, to_lat) = geo::decode(to_score as u64);

    let meters = geo::haversine_distance(from_lon, from_lat, to_lon, to_lat);
    let distance = meters / geodist_arguments.unit.meters_per_unit();

    Ok(RespValue::BulkString(format!("{:.4}", distance)).encode())
}
