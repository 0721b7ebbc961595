pub mod types;

pub use types::{Cap, CapabilitySet, UnknownCap};
