//! Feature probe: bounded reads of a system description pseudo-file and
//! extraction of "name : value" fields from its content
//!
//! Probe failures are never fatal. Callers treat an unreadable source as
//! "no information" and fall back to other detection means.

pub mod io;
pub mod parser;

pub use io::{ProbeBuffer, ProbeError, measure_length, read_raw, read_source};
pub use parser::{extract_field, list_contains};

/// Linux CPU description source
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";
