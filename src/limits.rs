/// Allowed absolute difference between the stated and computed total.
pub const PRICING_TOLERANCE: f64 = 0.01;

pub const MIN_DURATION_HOURS: u32 = 1;
pub const MAX_DURATION_HOURS: u32 = 24;

pub const MIN_RATING_SCORE: u8 = 1;
pub const MAX_RATING_SCORE: u8 = 5;

pub const LAT_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LNG_RANGE: (f64, f64) = (-180.0, 180.0);

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_REVIEW_LEN: usize = 4096;

/// Capacity of the group-commit WAL channel.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
