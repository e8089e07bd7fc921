//! Shared utilities for wotcrawl binaries.

pub mod logging;
pub mod time;

pub use logging::{init_logging, init_tracing, LogFormat, UnknownLogFormat};
pub use time::{format_age, format_duration};
