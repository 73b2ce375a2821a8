use crate::commands::command_error::CommandError;
use crate::geo;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct GeoaddArguments {
    key: String,
    members: Vec<(f64, f64, String)>,
}

impl GeoaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[1..].len() % 3 != 0 {
            return Err(CommandError::WrongNumberOfArguments("geoadd".to_string()));
        }

        let mut members = Vec::with_capacity((arguments.len() - 1) / 3);
        for chunk in arguments[1..].chunks(3) {
            let longitude = chunk[0]
                .parse::<f64>()
                .map_err(|_| CommandError::NotAFloat)?;
            let latitude = chunk[1]
                .parse::<f64>()
                .map_err(|_| CommandError::NotAFloat)?;

            if !geo::is_valid_longitude(longitude) {
                return Err(CommandError::InvalidLongitude);
            }
            if !geo::is_valid_latitude(latitude) {
                return Err(CommandError::InvalidLatitude);
            }

            members.push((longitude, latitude, chunk[2].clone()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            members,
        })
    }
}

/// Handles GEOADD. Positions live in a sorted set whose scores are the
/// 52-bit grid encoding cast to a double; the reply counts newly added
/// members.
pub fn geoadd(store: &mut KeyValueStore, arguments: Vec<String>) -> Result<String, CommandError> {
    let geoadd_arguments = GeoaddArguments::parse(arguments)?;

    let set = store.get_or_create_sorted_set(&geoadd_arguments.key)?;
    let mut added = 0;

    for (longitude, latitude, member) in geoadd_arguments.members {
        let score = geo::encode(longitude, latitude) as f64;
        if set.insert(member, score) {
            added += 1;
        }
    }

    Ok(RespValue::Integer(added).encode())
}
