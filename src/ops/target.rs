use crate::simd::Backend;

/// Name of the backend this instance was compiled for
#[inline(always)]
unsafe fn target_name<B: Backend>() -> &'static str {
    B::NAME
}

dispatched! {
    DISPATCH_TARGET in dispatch_target_variants = "dispatch_target"
        => target_name::<_>() -> &'static str
}

/// Target the dispatched code on this machine was built for, e.g. "AVX2"
/// Answered by the selected variant itself, not by the table
pub fn dispatch_target() -> &'static str {
    DISPATCH_TARGET.entry()()
}
