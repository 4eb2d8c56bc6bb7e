pub const MAX_DATA_POINTS: usize = 50;

pub const PROBE_INTERVAL_MS: u64 = 3000;
pub const AUTO_REQUEST_INTERVAL_MS: u64 = 10_000;

// Upper bound on a single probe so a dead host still yields a timed sample.
pub const PROBE_TIMEOUT_MS: u64 = 10_000;

pub const RELEASE_TIME_STEP_MINS: i64 = 15;

pub const UI_TICK_RATE_MS: u64 = 250;
