//! CPU feature detection for dispatch
//! Combines two sources into one capability set:
//! - native queries (`is_x86_feature_detected!`, `is_aarch64_feature_detected!`)
//! - the "flags" / "Features" / "cpu" fields of /proc/cpuinfo
//!
//! On x86 the native query is authoritative: cpuinfo lists what the CPU
//! implements, not what the OS has enabled (AVX state saving in particular).
//! Everywhere else the probe fills in what the native query can't see, and on
//! architectures without a native query it is the only source.

#[cfg(target_arch = "aarch64")]
use std::arch::is_aarch64_feature_detected;

use log::debug;

use crate::core::types::{Cap, CapabilitySet};
use crate::probe::{self, ProbeBuffer, list_contains};

/// x86 cpuinfo flag name -> token
const X86_FLAGS: [(&str, Cap); 16] = [
    ("sse", Cap::Sse),
    ("sse2", Cap::Sse2),
    ("pni", Cap::Sse3),
    ("ssse3", Cap::Ssse3),
    ("sse4_1", Cap::Sse41),
    ("popcnt", Cap::Popcnt),
    ("sse4_2", Cap::Sse42),
    ("avx", Cap::Avx),
    ("f16c", Cap::F16c),
    ("fma", Cap::Fma3),
    ("avx2", Cap::Avx2),
    ("avx512f", Cap::Avx512f),
    ("avx512cd", Cap::Avx512cd),
    ("avx512bw", Cap::Avx512bw),
    ("avx512dq", Cap::Avx512dq),
    ("avx512vl", Cap::Avx512vl),
];

/// AArch64 "asimd" carries the whole NEON family with it
const ASIMD_FAMILY: CapabilitySet =
    CapabilitySet::of(&[Cap::Neon, Cap::NeonFp16, Cap::NeonVfpv4, Cap::Asimd]);

/// Detected CPU capabilities, plus whatever the probe could tell about the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuFeatures {
    pub detected: CapabilitySet,
    pub model: Option<String>,
}

impl CpuFeatures {
    /// Detect from every source available on this machine
    /// Called once by the registry; not cached here
    pub fn detect() -> Self {
        let cpuinfo = match probe::read_source(probe::CPUINFO_PATH) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                debug!("No CPU description available: {}", e);
                None
            }
        };
        Self::from_sources(detect_native(), cpuinfo.as_ref(), native_is_authoritative())
    }

    /// Merge a native detection result with a cpuinfo buffer
    /// `native_only`: ignore cpuinfo tokens whenever a native result exists
    pub fn from_sources(
        native: Option<CapabilitySet>,
        cpuinfo: Option<&ProbeBuffer>,
        native_only: bool,
    ) -> Self {
        let probed = cpuinfo.map(capabilities_from_cpuinfo).unwrap_or_default();
        let model = cpuinfo.and_then(cpu_model);

        let detected = match native {
            Some(set) if native_only => set,
            Some(set) => set.union(probed),
            None => probed,
        };

        Self { detected, model }
    }

    /// Human-readable list of detected tokens
    pub fn describe(&self) -> String {
        if self.detected.is_empty() {
            "None (baseline only)".to_string()
        } else {
            self.detected.names().join(", ")
        }
    }
}

/// Tokens advertised by a cpuinfo buffer
pub fn capabilities_from_cpuinfo(buffer: &ProbeBuffer) -> CapabilitySet {
    let mut set = CapabilitySet::new();

    let flags = buffer.field("flags");
    for (flag, cap) in X86_FLAGS {
        if list_contains(flags.as_deref(), flag) {
            set.insert(cap);
        }
    }

    let features = buffer.field("Features");
    let features = features.as_deref();
    if list_contains(features, "asimd") {
        set = set.union(ASIMD_FAMILY);
    }
    if list_contains(features, "neon") {
        set.insert(Cap::Neon);
        if list_contains(features, "half") {
            set.insert(Cap::NeonFp16);
        }
        if list_contains(features, "vfpv4") {
            set.insert(Cap::NeonVfpv4);
        }
    }
    for (flag, cap) in [
        ("asimdhp", Cap::Asimdhp),
        ("asimddp", Cap::Asimddp),
        ("asimdfhm", Cap::Asimdfhm),
    ] {
        if list_contains(features, flag) {
            set.insert(cap);
        }
    }

    if let Some(cpu) = buffer.field("cpu") {
        set = set.union(power_generation(&cpu));
    }

    set
}

/// Model description for diagnostics
/// "model name" on x86, "Hardware" on 32-bit ARM boards, "cpu" on Power
pub fn cpu_model(buffer: &ProbeBuffer) -> Option<String> {
    ["model name", "Hardware", "cpu"]
        .iter()
        .find_map(|field| buffer.field(field))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// VSX generations from a Power "cpu" value such as "POWER9 (raw), altivec supported"
fn power_generation(cpu: &str) -> CapabilitySet {
    let generation = cpu
        .split(|c: char| c == ' ' || c == ',' || c == '\t')
        .find(|token| !token.is_empty())
        .and_then(|token| token.strip_prefix("POWER"))
        .and_then(|rest| {
            // Suffixed models like POWER8E or POWER8NVL keep their generation
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            rest[..end].parse::<u32>().ok()
        });

    match generation {
        Some(7) => CapabilitySet::of(&[Cap::Vsx]),
        Some(8) => CapabilitySet::of(&[Cap::Vsx, Cap::Vsx2]),
        Some(g) if g >= 9 => CapabilitySet::of(&[Cap::Vsx, Cap::Vsx2, Cap::Vsx3]),
        _ => CapabilitySet::EMPTY,
    }
}

fn native_is_authoritative() -> bool {
    cfg!(any(target_arch = "x86", target_arch = "x86_64"))
}

/// Instruction-based detection, None where the standard library has no query
pub fn detect_native() -> Option<CapabilitySet> {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        let mut set = CapabilitySet::new();
        macro_rules! probe_x86 {
            ($($feature:tt => $cap:expr),* $(,)?) => {
                $(
                    if is_x86_feature_detected!($feature) {
                        set.insert($cap);
                    }
                )*
            };
        }
        probe_x86!(
            "sse" => Cap::Sse,
            "sse2" => Cap::Sse2,
            "sse3" => Cap::Sse3,
            "ssse3" => Cap::Ssse3,
            "sse4.1" => Cap::Sse41,
            "popcnt" => Cap::Popcnt,
            "sse4.2" => Cap::Sse42,
            "avx" => Cap::Avx,
            "f16c" => Cap::F16c,
            "fma" => Cap::Fma3,
            "avx2" => Cap::Avx2,
            "avx512f" => Cap::Avx512f,
            "avx512cd" => Cap::Avx512cd,
            "avx512bw" => Cap::Avx512bw,
            "avx512dq" => Cap::Avx512dq,
            "avx512vl" => Cap::Avx512vl,
        );
        Some(set)
    }

    #[cfg(target_arch = "aarch64")]
    {
        let mut set = CapabilitySet::new();
        // Mandatory on AArch64, but asked for anyway so a disabled kernel config shows up
        if is_aarch64_feature_detected!("neon") {
            set = set.union(ASIMD_FAMILY);
        }
        if is_aarch64_feature_detected!("fp16") {
            set.insert(Cap::Asimdhp);
        }
        if is_aarch64_feature_detected!("dotprod") {
            set.insert(Cap::Asimddp);
        }
        if is_aarch64_feature_detected!("fhm") {
            set.insert(Cap::Asimdfhm);
        }
        Some(set)
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X86_CPUINFO: &str = "processor\t: 0\n\
vendor_id\t: GenuineIntel\n\
model\t\t: 85\n\
model name\t: Intel(R) Xeon(R) CPU @ 2.50GHz\n\
flags\t\t: fpu vme sse sse2 pni ssse3 fma sse4_1 sse4_2 popcnt avx f16c avx2\n\
\n\
processor\t: 1\n\
flags\t\t: fpu\n";

    const AARCH64_CPUINFO: &str = "processor\t: 0\n\
BogoMIPS\t: 48.00\n\
Features\t: fp asimd evtstrm aes pmull sha1 sha2 crc32 atomics fphp asimdhp cpuid asimddp\n\
CPU implementer\t: 0x41\n";

    const ARM32_CPUINFO: &str = "processor\t: 0\n\
model name\t: ARMv7 Processor rev 5 (v7l)\n\
Features\t: half thumb fastmult vfp edsp neon vfpv3 tls vfpv4 idiva idivt\n\
Hardware\t: BCM2835\n";

    #[test]
    fn test_x86_flags() {
        let caps = capabilities_from_cpuinfo(&ProbeBuffer::from(X86_CPUINFO));
        let expected = CapabilitySet::of(&[
            Cap::Sse,
            Cap::Sse2,
            Cap::Sse3,
            Cap::Ssse3,
            Cap::Sse41,
            Cap::Popcnt,
            Cap::Sse42,
            Cap::Avx,
            Cap::F16c,
            Cap::Fma3,
            Cap::Avx2,
        ]);
        assert_eq!(caps, expected);
        assert!(!caps.contains(Cap::Avx512f));
    }

    #[test]
    fn test_aarch64_features() {
        let caps = capabilities_from_cpuinfo(&ProbeBuffer::from(AARCH64_CPUINFO));
        assert!(ASIMD_FAMILY.is_subset_of(caps));
        assert!(caps.contains(Cap::Asimdhp));
        assert!(caps.contains(Cap::Asimddp));
        assert!(!caps.contains(Cap::Asimdfhm));
        assert!(!caps.contains(Cap::Sse2));
    }

    #[test]
    fn test_arm32_features() {
        let buffer = ProbeBuffer::from(ARM32_CPUINFO);
        let caps = capabilities_from_cpuinfo(&buffer);
        assert_eq!(caps, CapabilitySet::of(&[Cap::Neon, Cap::NeonFp16, Cap::NeonVfpv4]));
        assert_eq!(cpu_model(&buffer).as_deref(), Some("ARMv7 Processor rev 5 (v7l)"));
    }

    #[test]
    fn test_power_cpu_field() {
        let buffer = ProbeBuffer::from("processor\t: 0\ncpu\t\t: POWER9 (raw), altivec supported\n");
        let caps = capabilities_from_cpuinfo(&buffer);
        assert_eq!(caps, CapabilitySet::of(&[Cap::Vsx, Cap::Vsx2, Cap::Vsx3]));

        let buffer = ProbeBuffer::from("cpu\t\t: POWER8E (raw), altivec supported\n");
        assert_eq!(capabilities_from_cpuinfo(&buffer), CapabilitySet::of(&[Cap::Vsx, Cap::Vsx2]));

        let buffer = ProbeBuffer::from("cpu\t\t: POWER8NVL (raw), altivec supported\n");
        assert_eq!(capabilities_from_cpuinfo(&buffer), CapabilitySet::of(&[Cap::Vsx, Cap::Vsx2]));

        let buffer = ProbeBuffer::from("cpu\t\t: POWER7 (architected), altivec supported\n");
        assert_eq!(capabilities_from_cpuinfo(&buffer), CapabilitySet::of(&[Cap::Vsx]));

        let buffer = ProbeBuffer::from("cpu\t\t: POWER (unknown)\n");
        assert!(capabilities_from_cpuinfo(&buffer).is_empty());
    }

    #[test]
    fn test_native_authoritative_merge() {
        let buffer = ProbeBuffer::from(X86_CPUINFO);
        let native = CapabilitySet::of(&[Cap::Sse, Cap::Sse2]);

        let features = CpuFeatures::from_sources(Some(native), Some(&buffer), true);
        assert_eq!(features.detected, native);
        assert_eq!(features.model.as_deref(), Some("Intel(R) Xeon(R) CPU @ 2.50GHz"));

        let features = CpuFeatures::from_sources(Some(native), Some(&buffer), false);
        assert!(features.detected.contains(Cap::Avx2));

        let features = CpuFeatures::from_sources(None, Some(&buffer), true);
        assert!(features.detected.contains(Cap::Avx2));
    }

    #[test]
    fn test_unreadable_source_is_not_fatal() {
        let features = CpuFeatures::from_sources(None, None, false);
        assert!(features.detected.is_empty());
        assert_eq!(features.model, None);
        assert!(features.describe().contains("None"));
    }

    #[test]
    fn test_cpu_features_detection() {
        let features = CpuFeatures::detect();
        let _ = features.describe();

        #[cfg(target_arch = "x86_64")]
        assert!(features.detected.contains(Cap::Sse2));

        #[cfg(target_arch = "aarch64")]
        assert!(features.detected.contains(Cap::Neon));
    }
}
