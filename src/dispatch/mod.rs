//! Dispatch table: one logical function, several compiled variants,
//! resolved once to the most specialized one the machine supports
//!
//! ```text
//! static SLOT: DispatchSlot<fn(&[f32]) -> f32> = DispatchSlot::new("sum", &[
//!     Variant::new("AVX2", 30, CapabilitySet::of(&[Cap::Avx2]), sum_avx2 as SumFn),
//!     Variant::new("SSE2", 20, CapabilitySet::of(&[Cap::Sse2]), sum_sse2 as SumFn),
//!     Variant::baseline(sum_baseline as SumFn),
//! ]);
//!
//! pub fn sum(values: &[f32]) -> f32 {
//!     SLOT.entry()(values)
//! }
//! ```

pub mod slot;
pub mod table;

pub use slot::{
    Dispatch, DispatchSlot, Variant, VariantInfo, VariantListError, check_variants, select_variant,
};
pub use table::{Candidate, DispatchError, DispatchReport, DispatchTable, FunctionReport};
