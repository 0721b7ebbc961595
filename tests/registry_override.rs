use cpu_dispatch::registry::{self, RegistryError};
use cpu_dispatch::{Cap, CapabilitySet, DispatchSlot, DispatchTable, Variant, ops};

type Which = fn() -> &'static str;

fn wide() -> &'static str {
    "wide"
}

fn narrow() -> &'static str {
    "narrow"
}

fn portable() -> &'static str {
    "portable"
}

const VARIANTS: [Variant<Which>; 3] = [
    Variant::new("AVX2", 30, CapabilitySet::of(&[Cap::Avx2]), wide as Which),
    Variant::new("SSE2", 20, CapabilitySet::of(&[Cap::Sse2]), narrow as Which),
    Variant::baseline(portable as Which),
];

static WHICH: DispatchSlot<Which> = DispatchSlot::new("which", &VARIANTS);

// The registry is process-wide, so the whole sequence runs in one test
#[test]
fn test_disable_then_seal() {
    assert!(!registry::is_sealed());

    registry::force_disable(Cap::Avx2).unwrap();
    registry::force_disable_by_name("avx512f").unwrap();
    assert!(!registry::has(Cap::Avx2));
    assert!(registry::disabled().contains(Cap::Avx2));
    assert!(registry::disabled().contains(Cap::Avx512f));

    // Effective set is detected minus disabled
    let effective = registry::detect().difference(registry::disabled());
    assert!(!effective.contains(Cap::Avx2));

    // Previewing a machine with AVX2 neither seals nor pins any slot
    let avx2_machine = CapabilitySet::of(&[Cap::Sse, Cap::Sse2, Cap::Avx, Cap::Avx2]);
    let mut preview = DispatchTable::simulated(avx2_machine);
    preview.register(&WHICH).unwrap();
    ops::register_builtins(&mut preview).unwrap();
    assert_eq!(preview.active_variant("which").unwrap(), "AVX2");
    #[cfg(target_arch = "x86_64")]
    assert_eq!(preview.active_variant("interleave_u8").unwrap(), "AVX2");
    let _ = preview.report();
    assert!(!registry::is_sealed());
    assert!(WHICH.resolved().is_none());

    // With AVX2 gone the next eligible variant takes over
    let expected = if registry::has(Cap::Sse2) { "narrow" } else { "portable" };
    assert_eq!(WHICH.entry()(), expected);
    #[cfg(target_arch = "x86_64")]
    assert_eq!(WHICH.entry()(), "narrow");
    assert!(registry::is_sealed());
    assert!(!registry::capabilities().contains(Cap::Avx2));

    assert!(matches!(
        registry::force_disable(Cap::Sse2),
        Err(RegistryError::Sealed(Cap::Sse2))
    ));
    assert_ne!(ops::dispatch_target(), "AVX2");
    #[cfg(target_arch = "x86_64")]
    assert_eq!(ops::dispatch_target(), "SSE2");

    let table = ops::builtin_table().unwrap();
    for name in table.names() {
        assert_ne!(table.active_variant(name).unwrap(), "AVX2");
    }
}
