pub mod core;
pub mod dispatch;
pub mod ops;
pub mod probe;
pub mod registry;
pub mod simd;

pub use crate::core::{Cap, CapabilitySet};
pub use dispatch::{DispatchSlot, DispatchTable, Variant};
