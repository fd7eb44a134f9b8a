pub mod crash_log;
pub mod decompression;
pub mod human_format;

pub use crash_log::CrashLog;
pub use decompression::{CompressionFormat, DecompressionService};
pub use human_format::{format_bytes, format_duration};
