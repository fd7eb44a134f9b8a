/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Paths defaults
pub const DEFAULT_OUTPUT_DIR: &str = "./data/filtered";
pub const DEFAULT_CONFIG_FILE: &str = "channel-filter.toml";

// Environment overrides
pub const ENV_PREFIX: &str = "CHANNEL_FILTER_";
pub const ENV_SEPARATOR: &str = "__";

// Reporting cadence
pub const DEFAULT_PLAYLIST_REPORT_INTERVAL_MS: u64 = 500;
pub const DEFAULT_GUIDE_REPORT_INTERVAL_MS: u64 = 500;
pub const DEFAULT_COUNTING_REPORT_INTERVAL_MS: u64 = 1000;

// Progress broadcast buffer
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 256;
