use crate::commands::command_error::CommandError;
use crate::geo::{self, DistanceUnit};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct GeosearchArguments {
    key: String,
    longitude: f64,
    latitude: f64,
    radius_meters: f64,
}

impl GeosearchArguments {
    /// Parses `GEOSEARCH key FROMLONLAT lon lat BYRADIUS radius unit`.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 7 {
            return Err(CommandError::WrongNumberOfArguments(
                "geosearch".to_string(),
            ));
        }

        if !arguments[1].eq_ignore_ascii_case("fromlonlat")
            || !arguments[4].eq_ignore_ascii_case("byradius")
        {
            return Err(CommandError::SyntaxError);
        }

        let longitude = arguments[2]
            .parse::<f64>()
            .map_err(|_| CommandError::NotAFloat)?;
        let latitude = arguments[3]
            .parse::<f64>()
            .map_err(|_| CommandError::NotAFloat)?;

        if !geo::is_valid_longitude(longitude) {
            return Err(CommandError::InvalidLongitude);
        }
        if !geo::is_valid_latitude(latitude) {
            return Err(CommandError::InvalidLatitude);
        }

        let radius = arguments[5]
            .parse::<f64>()
            .map_err(|_| CommandError::NotAFloat)?;
        let unit = DistanceUnit::parse(&arguments[6]).ok_or(CommandError::UnsupportedUnit)?;

        Ok(Self {
            key: arguments[0].clone(),
            longitude,
            latitude,
            radius_meters: radius * unit.meters_per_unit(),
        })
    }
}

/// Handles GEOSEARCH. Every member is decoded and measured against the
/// centre; matches are returned in the underlying sorted-set score order.
pub fn geosearch(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<String, CommandError> {
    let geosearch_arguments = GeosearchArguments::parse(arguments)?;

    let Some(set) = store.get_sorted_set(&geosearch_arguments.key)? else {
        return Ok(RespValue::Array(Vec::new()).encode());
    };

    let mut matches = Vec::new();
    for (member, score) in set.iter() {
        let (longitude, latitude) = geo::decode(score as u64);
        let distance = geo::haversine_distance(
            geosearch_arguments.longitude,
            geosearch_arguments.latitude,
            longitude,
            latitude,
        );

        if distance <= geosearch_arguments.radius_meters {
            matches.push(RespValue::BulkString(member.to_string()));
        }
    }

    Ok(RespValue::Array(matches).encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::geoadd::geoadd;

    fn seeded_store() -> KeyValueStore {
        let mut store = KeyValueStore::new();
        geoadd(
            &mut store,
            vec![
                "sicily".to_string(),
                "13.361389".to_string(),
                "38.115556".to_string(),
                "Palermo".to_string(),
                "15.087269".to_string(),
                "37.502669".to_string(),
                "Catania".to_string(),
            ],
        )
        .unwrap();
        store
    }

    #[test]
    fn test_geosearch_radius_filters() {
        let mut store = seeded_store();

        // 200 km around a point between the two cities reaches both.
        let reply = geosearch(
            &mut store,
            vec![
                "sicily".to_string(),
                "FROMLONLAT".to_string(),
                "15".to_string(),
                "37".to_string(),
                "BYRADIUS".to_string(),
                "200".to_string(),
                "km".to_string(),
            ],
        )
        .unwrap();
        assert!(reply.contains("Palermo") && reply.contains("Catania"));

        // 100 km only reaches Catania.
        let reply = geosearch(
            &mut store,
            vec![
                "sicily".to_string(),
                "FROMLONLAT".to_string(),
                "15".to_string(),
                "37".to_string(),
                "BYRADIUS".to_string(),
                "100".to_string(),
                "km".to_string(),
            ],
        )
        .unwrap();
        assert!(!reply.contains("Palermo") && reply.contains("Catania"));
    }

    #[test]
    fn test_geosearch_errors_and_missing_key() {
        let mut store = KeyValueStore::new();

        assert_eq!(
            geosearch(
                &mut store,
                vec![
                    "none".to_string(),
                    "FROMLONLAT".to_string(),
                    "0".to_string(),
                    "0".to_string(),
                    "BYRADIUS".to_string(),
                    "1".to_string(),
                    "km".to_string(),
                ],
            ),
            Ok("*0\r\n".to_string())
        );
        assert_eq!(
            geosearch(
                &mut store,
                vec![
                    "k".to_string(),
                    "FROMMEMBER".to_string(),
                    "0".to_string(),
                    "0".to_string(),
                    "BYRADIUS".to_string(),
                    "1".to_string(),
                    "km".to_string(),
                ],
            ),
            Err(CommandError::SyntaxError)
        );
        assert_eq!(
            geosearch(
                &mut store,
                vec![
                    "k".to_string(),
                    "FROMLONLAT".to_string(),
                    "0".to_string(),
                    "0".to_string(),
                    "BYRADIUS".to_string(),
                    "1".to_string(),
                    "furlong".to_string(),
                ],
            ),
            Err(CommandError::UnsupportedUnit)
        );
    }
}
