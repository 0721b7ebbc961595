use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use serde::Serialize;

use crate::core::types::CapabilitySet;
use crate::registry;

/// Published index meaning "not resolved yet"
const UNRESOLVED: usize = usize::MAX;

/// One compiled implementation of a logical function
#[derive(Debug, Clone, Copy)]
pub struct Variant<F> {
    /// Target name, e.g. "AVX2"
    pub name: &'static str,
    /// Higher is more specialized; strictly descending within a slot
    pub priority: u32,
    /// Every token the machine must have for this variant to be eligible
    pub required: CapabilitySet,
    pub entry: F,
}

impl<F> Variant<F> {
    pub const fn new(name: &'static str, priority: u32, required: CapabilitySet, entry: F) -> Self {
        Self {
            name,
            priority,
            required,
            entry,
        }
    }

    /// Zero-requirement, lowest-priority variant; always eligible
    pub const fn baseline(entry: F) -> Self {
        Self::new("baseline", 0, CapabilitySet::EMPTY, entry)
    }

    pub fn info(&self) -> VariantInfo {
        VariantInfo {
            name: self.name,
            priority: self.priority,
            required: self.required,
        }
    }
}

/// Entry-point-free view of a variant, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantInfo {
    pub name: &'static str,
    pub priority: u32,
    pub required: CapabilitySet,
}

/// Why a variant list can't back a dispatch slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantListError {
    Empty,
    NotDescending,
    MissingBaseline,
}

impl VariantListError {
    pub const fn message(self) -> &'static str {
        match self {
            VariantListError::Empty => "dispatch slot has no variants",
            VariantListError::NotDescending => {
                "dispatch variants must be sorted by strictly descending priority"
            }
            VariantListError::MissingBaseline => {
                "last dispatch variant must be a baseline with no required capabilities"
            }
        }
    }
}

/// Check a variant list: non-empty, strictly descending priority, baseline last
pub const fn check_variants<F>(variants: &[Variant<F>]) -> Result<(), VariantListError> {
    if variants.is_empty() {
        return Err(VariantListError::Empty);
    }
    let mut i = 1;
    while i < variants.len() {
        if variants[i].priority >= variants[i - 1].priority {
            return Err(VariantListError::NotDescending);
        }
        i += 1;
    }
    if !variants[variants.len() - 1].required.is_empty() {
        return Err(VariantListError::MissingBaseline);
    }
    Ok(())
}

/// Pure selection: index of the first variant whose requirements are all detected
pub fn select_variant<F>(detected: CapabilitySet, variants: &[Variant<F>]) -> Option<usize> {
    variants
        .iter()
        .position(|variant| variant.required.is_subset_of(detected))
}

/// One logical function: its variants and the index it resolved to
///
/// Resolution is lock-free. Racing first callers all compute the same index
/// from the same capability set and publish it with a compare-exchange; the
/// loser adopts the published value, so the slot never changes once set.
pub struct DispatchSlot<F: 'static> {
    name: &'static str,
    variants: &'static [Variant<F>],
    resolved: AtomicUsize,
}

impl<F: Copy + 'static> DispatchSlot<F> {
    /// Panics on an invalid variant list; in a `static` that is a compile error
    pub const fn new(name: &'static str, variants: &'static [Variant<F>]) -> Self {
        if let Err(e) = check_variants(variants) {
            panic!("{}", e.message());
        }
        Self {
            name,
            variants,
            resolved: AtomicUsize::new(UNRESOLVED),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn variants(&self) -> &'static [Variant<F>] {
        self.variants
    }

    /// Resolved variant, without triggering resolution
    pub fn resolved(&self) -> Option<&'static Variant<F>> {
        let variants = self.variants;
        match self.resolved.load(Ordering::Acquire) {
            UNRESOLVED => None,
            index => Some(&variants[index]),
        }
    }

    /// Index of the variant `detected` selects; panics if none is eligible
    fn select(&self, detected: CapabilitySet) -> usize {
        match select_variant(detected, self.variants) {
            Some(index) => index,
            None => panic!(
                "no variant of `{}` is eligible on capabilities [{}]; its variant list has no baseline",
                self.name, detected
            ),
        }
    }

    /// What `detected` would select, without touching the published variant
    pub fn simulate(&self, detected: CapabilitySet) -> &'static Variant<F> {
        let variants = self.variants;
        &variants[self.select(detected)]
    }

    /// Publish the selection for `detected`; the first publication wins for
    /// the lifetime of the process
    ///
    /// Only `resolve` calls this outside tests, with the sealed registry set,
    /// so a published entry never needs more than the machine provides.
    fn publish(&self, detected: CapabilitySet) -> &'static Variant<F> {
        if let Some(variant) = self.resolved() {
            return variant;
        }

        let variants = self.variants;
        let index = self.select(detected);
        match self
            .resolved
            .compare_exchange(UNRESOLVED, index, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                debug!("Dispatch `{}` -> {} (capabilities: {})", self.name, variants[index].name, detected);
                &variants[index]
            }
            Err(published) => &variants[published],
        }
    }

    /// Resolve against the process-wide registry (seals it)
    pub fn resolve(&self) -> &'static Variant<F> {
        match self.resolved() {
            Some(variant) => variant,
            None => self.publish(registry::capabilities()),
        }
    }

    /// Entry point of the resolved variant
    #[inline]
    pub fn entry(&self) -> F {
        self.resolve().entry
    }
}

/// Type-erased view of a slot, so slots with different signatures share a table
pub trait Dispatch: Sync {
    fn name(&self) -> &'static str;
    /// Resolve against the registry and describe the published variant
    fn resolve_info(&self) -> VariantInfo;
    /// Describe what `detected` would select; never publishes
    fn simulate_info(&self, detected: CapabilitySet) -> VariantInfo;
    fn active(&self) -> Option<VariantInfo>;
    fn candidates(&self) -> Vec<VariantInfo>;
}

impl<F: Copy + Sync + 'static> Dispatch for DispatchSlot<F> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn resolve_info(&self) -> VariantInfo {
        self.resolve().info()
    }

    fn simulate_info(&self, detected: CapabilitySet) -> VariantInfo {
        self.simulate(detected).info()
    }

    fn active(&self) -> Option<VariantInfo> {
        self.resolved().map(Variant::info)
    }

    fn candidates(&self) -> Vec<VariantInfo> {
        self.variants.iter().map(Variant::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Cap;

    type Probe = fn() -> &'static str;

    fn avx2() -> &'static str {
        "avx2"
    }
    fn sse2() -> &'static str {
        "sse2"
    }
    fn baseline() -> &'static str {
        "baseline"
    }

    const AVX2: CapabilitySet = CapabilitySet::of(&[Cap::Avx2]);
    const SSE2: CapabilitySet = CapabilitySet::of(&[Cap::Sse2]);

    const VARIANTS: [Variant<Probe>; 3] = [
        Variant::new("AVX2", 20, AVX2, avx2 as Probe),
        Variant::new("SSE2", 10, SSE2, sse2 as Probe),
        Variant::baseline(baseline as Probe),
    ];

    #[test]
    fn test_highest_priority_eligible_wins() {
        let both = CapabilitySet::of(&[Cap::Sse2, Cap::Avx2]);
        assert_eq!(select_variant(both, &VARIANTS), Some(0));
        assert_eq!(select_variant(SSE2, &VARIANTS), Some(1));
        assert_eq!(select_variant(CapabilitySet::EMPTY, &VARIANTS), Some(2));
    }

    #[test]
    fn test_disabling_falls_back() {
        let detected = CapabilitySet::of(&[Cap::Sse, Cap::Sse2, Cap::Avx, Cap::Avx2]);
        let weaker = detected.without(Cap::Avx2);
        assert_eq!(VARIANTS[select_variant(weaker, &VARIANTS).unwrap()].name, "SSE2");
        let weakest = weaker.without(Cap::Sse2);
        assert_eq!(VARIANTS[select_variant(weakest, &VARIANTS).unwrap()].name, "baseline");
    }

    #[test]
    fn test_selection_needs_every_required_token() {
        let variants = [
            Variant::new("AVX2_FMA3", 30, CapabilitySet::of(&[Cap::Avx2, Cap::Fma3]), avx2 as Probe),
            Variant::baseline(baseline as Probe),
        ];
        assert_eq!(select_variant(AVX2, &variants), Some(1));
        assert_eq!(select_variant(AVX2.with(Cap::Fma3), &variants), Some(0));
    }

    #[test]
    fn test_check_variants() {
        assert_eq!(check_variants(&VARIANTS), Ok(()));
        assert_eq!(check_variants::<Probe>(&[]), Err(VariantListError::Empty));

        let unsorted = [
            Variant::new("SSE2", 10, SSE2, sse2 as Probe),
            Variant::new("AVX2", 20, AVX2, avx2 as Probe),
            Variant::baseline(baseline as Probe),
        ];
        assert_eq!(check_variants(&unsorted), Err(VariantListError::NotDescending));

        let no_baseline = [
            Variant::new("AVX2", 20, AVX2, avx2 as Probe),
            Variant::new("SSE2", 10, SSE2, sse2 as Probe),
        ];
        assert_eq!(check_variants(&no_baseline), Err(VariantListError::MissingBaseline));
        assert_eq!(select_variant(CapabilitySet::EMPTY, &no_baseline), None);
    }

    #[test]
    #[should_panic(expected = "baseline")]
    fn test_slot_without_baseline_panics() {
        static NO_BASELINE: [Variant<Probe>; 1] = [Variant::new("AVX2", 20, AVX2, avx2 as Probe)];
        let _slot = DispatchSlot::new("broken", &NO_BASELINE);
    }

    #[test]
    fn test_resolution_is_memoized() {
        static SLOT: DispatchSlot<Probe> = DispatchSlot::new("memo", &VARIANTS);
        assert!(SLOT.resolved().is_none());

        let first = SLOT.publish(SSE2);
        assert_eq!(first.name, "SSE2");
        assert_eq!((first.entry)(), "sse2");

        // A later, different capability set doesn't move a resolved slot
        let again = SLOT.publish(AVX2.with(Cap::Sse2));
        assert!(std::ptr::eq(first, again));
        assert_eq!(SLOT.resolved().map(|v| v.name), Some("SSE2"));
        assert_eq!(SLOT.entry()(), "sse2");
    }

    #[test]
    fn test_concurrent_resolution_agrees() {
        static SLOT: DispatchSlot<Probe> = DispatchSlot::new("racy", &VARIANTS);
        let detected = CapabilitySet::of(&[Cap::Sse2, Cap::Avx2]);

        let picked: Vec<&'static Variant<Probe>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || SLOT.publish(detected)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for variant in &picked {
            assert!(std::ptr::eq(*variant, picked[0]));
        }
        assert_eq!(picked[0].name, "AVX2");
    }

    #[test]
    fn test_dispatch_trait_view() {
        static SLOT: DispatchSlot<Probe> = DispatchSlot::new("erased", &VARIANTS);
        let erased: &dyn Dispatch = &SLOT;
        assert_eq!(erased.name(), "erased");
        assert_eq!(erased.active(), None);
        assert_eq!(erased.candidates().len(), 3);

        let info = erased.simulate_info(CapabilitySet::EMPTY);
        assert_eq!(info.name, "baseline");
        assert_eq!(info.priority, 0);
        assert!(info.required.is_empty());
        assert_eq!(erased.active(), None);
    }

    #[test]
    fn test_simulation_never_publishes() {
        static SLOT: DispatchSlot<Probe> = DispatchSlot::new("simulated", &VARIANTS);
        assert_eq!(SLOT.simulate(AVX2.with(Cap::Sse2)).name, "AVX2");
        assert_eq!(SLOT.simulate(CapabilitySet::EMPTY).name, "baseline");
        assert!(SLOT.resolved().is_none());

        // Real resolution only looks at the registry
        let expected = select_variant(registry::capabilities(), &VARIANTS).unwrap();
        assert_eq!(SLOT.resolve().name, VARIANTS[expected].name);
        assert_eq!((&SLOT as &dyn Dispatch).resolve_info(), VARIANTS[expected].info());
    }
}
