//! Dispatched kernels
//!
//! Each kernel is a generic `unsafe fn` over a SIMD backend, written once and
//! instantiated per target by `dispatched!`. The AVX2 instance is compiled
//! inside a `#[target_feature(enable = "avx2")]` wrapper, so intrinsics inline
//! into it; SSE2 and NEON are part of their platform baselines.

use crate::dispatch::{Dispatch, DispatchError, DispatchTable};

/// Instantiate `$kernel` for every backend of the current platform and
/// register the instances in a dispatch slot named `$name`
///
/// `$variants` names the module holding the per-target entry points
macro_rules! dispatched {
    (
        $slot:ident in $variants:ident = $name:literal
            => $kernel:ident::<_ $(, $generic:ty)*>($($arg:ident: $ty:ty),*) $(-> $ret:ty)?
    ) => {
        mod $variants {
            use super::*;
            use crate::dispatch::Variant;
            #[allow(unused_imports)]
            use crate::simd::{Backend, Scalar};

            pub(crate) type Entry = fn($($ty),*) $(-> $ret)?;

            pub(super) fn baseline($($arg: $ty),*) $(-> $ret)? {
                // SAFETY: the scalar backend has no CPU requirements
                unsafe { $kernel::<Scalar $(, $generic)*>($($arg),*) }
            }

            #[cfg(target_arch = "x86_64")]
            pub(super) fn sse2($($arg: $ty),*) $(-> $ret)? {
                // SAFETY: SSE2 is part of the x86_64 baseline
                unsafe { $kernel::<crate::simd::Sse2 $(, $generic)*>($($arg),*) }
            }

            #[cfg(target_arch = "x86_64")]
            #[target_feature(enable = "avx2")]
            unsafe fn avx2_body($($arg: $ty),*) $(-> $ret)? {
                unsafe { $kernel::<crate::simd::Avx2 $(, $generic)*>($($arg),*) }
            }

            #[cfg(target_arch = "x86_64")]
            pub(super) fn avx2($($arg: $ty),*) $(-> $ret)? {
                // SAFETY: only reachable through the slot, which publishes an
                // entry only from the sealed registry set, and that set holds
                // AVX2 only when the running CPU has it
                unsafe { avx2_body($($arg),*) }
            }

            #[cfg(target_arch = "aarch64")]
            pub(super) fn neon($($arg: $ty),*) $(-> $ret)? {
                // SAFETY: NEON is mandatory on aarch64
                unsafe { $kernel::<crate::simd::Neon $(, $generic)*>($($arg),*) }
            }

            pub(super) const VARIANTS: &[Variant<Entry>] = &[
                #[cfg(target_arch = "x86_64")]
                Variant::new(
                    <crate::simd::Avx2 as Backend>::NAME,
                    <crate::simd::Avx2 as Backend>::PRIORITY,
                    <crate::simd::Avx2 as Backend>::REQUIRED,
                    avx2 as Entry,
                ),
                #[cfg(target_arch = "x86_64")]
                Variant::new(
                    <crate::simd::Sse2 as Backend>::NAME,
                    <crate::simd::Sse2 as Backend>::PRIORITY,
                    <crate::simd::Sse2 as Backend>::REQUIRED,
                    sse2 as Entry,
                ),
                #[cfg(target_arch = "aarch64")]
                Variant::new(
                    <crate::simd::Neon as Backend>::NAME,
                    <crate::simd::Neon as Backend>::PRIORITY,
                    <crate::simd::Neon as Backend>::REQUIRED,
                    neon as Entry,
                ),
                Variant::baseline(baseline as Entry),
            ];
        }

        pub(crate) static $slot: crate::dispatch::DispatchSlot<$variants::Entry> =
            crate::dispatch::DispatchSlot::new($name, $variants::VARIANTS);
    };
}

pub mod reorder;
pub mod target;

pub use reorder::{ReorderError, deinterleave_f32, interleave_f32, interleave_u8, swap_pairs_f32};
pub use target::dispatch_target;

/// Every dispatched function this crate defines
pub fn builtins() -> [&'static dyn Dispatch; 5] {
    [
        &reorder::INTERLEAVE_U8,
        &reorder::INTERLEAVE_F32,
        &reorder::DEINTERLEAVE_F32,
        &reorder::SWAP_PAIRS_F32,
        &target::DISPATCH_TARGET,
    ]
}

/// Register the built-in functions into `table`
pub fn register_builtins(table: &mut DispatchTable) -> Result<(), DispatchError> {
    for slot in builtins() {
        table.register(slot)?;
    }
    Ok(())
}

/// Table of the built-in functions over the process-wide registry
/// Seals the registry, like any dispatch
pub fn builtin_table() -> Result<DispatchTable, DispatchError> {
    let mut table = DispatchTable::from_registry();
    register_builtins(&mut table)?;
    Ok(table)
}
