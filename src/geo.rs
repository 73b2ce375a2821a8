//! Geospatial encoding over sorted-set scores.
//!
//! A coordinate pair is normalized onto a 26-bit grid per axis and the two
//! grid indices are bit-interleaved (latitude in odd positions, longitude in
//! even positions) into a 52-bit integer. 52 bits fit exactly in an IEEE-754
//! double, so the result can be stored as a sorted-set score without loss.

/// Latitude limits of the encodable area (slightly short of the poles, where
/// the web-mercator grid degenerates).
pub const LATITUDE_MIN: f64 = -85.05112878;
pub const LATITUDE_MAX: f64 = 85.05112878;
pub const LONGITUDE_MIN: f64 = -180.0;
pub const LONGITUDE_MAX: f64 = 180.0;

/// Earth radius in meters used by the haversine distance.
pub const EARTH_RADIUS_METERS: f64 = 6372797.560856;

const GRID_BITS: u32 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl DistanceUnit {
    /// Parses a unit token; `None` marks an unsupported unit.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "m" => Some(DistanceUnit::Meters),
            "km" => Some(DistanceUnit::Kilometers),
            "mi" => Some(DistanceUnit::Miles),
            "ft" => Some(DistanceUnit::Feet),
            _ => None,
        }
    }

    /// Meters per one of this unit.
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.34,
            DistanceUnit::Feet => 0.3048,
        }
    }
}

pub fn is_valid_longitude(longitude: f64) -> bool {
    !longitude.is_nan() && (LONGITUDE_MIN..=LONGITUDE_MAX).contains(&longitude)
}

pub fn is_valid_latitude(latitude: f64) -> bool {
    !latitude.is_nan() && (LATITUDE_MIN..=LATITUDE_MAX).contains(&latitude)
}

/// Encodes a validated coordinate pair into its 52-bit grid score.
pub fn encode(longitude: f64, latitude: f64) -> u64 {
    let longitude_offset =
        (longitude - LONGITUDE_MIN) / (LONGITUDE_MAX - LONGITUDE_MIN);
    let latitude_offset = (latitude - LATITUDE_MIN) / (LATITUDE_MAX - LATITUDE_MIN);

    let longitude_grid = grid_index(longitude_offset);
    let latitude_grid = grid_index(latitude_offset);

    (spread_bits(latitude_grid) << 1) | spread_bits(longitude_grid)
}

/// Decodes a 52-bit grid score back to the centre of its cell as
/// `(longitude, latitude)`.
pub fn decode(score: u64) -> (f64, f64) {
    let longitude_grid = squash_bits(score);
    let latitude_grid = squash_bits(score >> 1);

    let cell = |grid: u64, min: f64, max: f64| {
        min + (grid as f64 + 0.5) / (1u64 << GRID_BITS) as f64 * (max - min)
    };

    (
        cell(longitude_grid, LONGITUDE_MIN, LONGITUDE_MAX),
        cell(latitude_grid, LATITUDE_MIN, LATITUDE_MAX),
    )
}

/// Great-circle distance in meters between two `(longitude, latitude)` pairs.
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

fn grid_index(offset: f64) -> u64 {
    let scaled = (offset * (1u64 << GRID_BITS) as f64) as u64;

    // offset == 1.0 lands exactly on 2^26; keep it in the top cell.
    scaled.min((1u64 << GRID_BITS) - 1)
}

/// Spreads the low 26 bits of `value` so bit i lands at position 2i.
fn spread_bits(value: u64) -> u64 {
    let mut v = value & 0x3FFFFFF;
    v = (v | (v << 16)) & 0x0000FFFF0000FFFF;
    v = (v | (v << 8)) & 0x00FF00FF00FF00FF;
    v = (v | (v << 4)) & 0x0F0F0F0F0F0F0F0F;
    v = (v | (v << 2)) & 0x3333333333333333;
    v = (v | (v << 1)) & 0x5555555555555555;
    v
}

/// Inverse of [`spread_bits`]: collects every even-position bit.
fn squash_bits(value: u64) -> u64 {
    let mut v = value & 0x5555555555555555;
    v = (v | (v >> 1)) & 0x3333333333333333;
    v = (v | (v >> 2)) & 0x0F0F0F0F0F0F0F0F;
    v = (v | (v >> 4)) & 0x00FF00FF00FF00FF;
    v = (v | (v >> 8)) & 0x0000FFFF0000FFFF;
    v = (v | (v >> 16)) & 0x00000000FFFFFFFF;
    v
}
