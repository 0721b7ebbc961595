use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Capability token - one named instruction-set extension
/// Declaration order is the specialization rank: later tokens are "more specialized"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "&'static str")]
#[repr(u8)]
pub enum Cap {
    // x86 / x86_64
    Sse,
    Sse2,
    Sse3,
    Ssse3,
    Sse41,
    Popcnt,
    Sse42,
    Avx,
    F16c,
    Fma3,
    Avx2,
    Avx512f,
    Avx512cd,
    Avx512bw,
    Avx512dq,
    Avx512vl,
    // ARM / AArch64
    Neon,
    NeonFp16,
    NeonVfpv4,
    Asimd,
    Asimdhp,
    Asimddp,
    Asimdfhm,
    // Power
    Vsx,
    Vsx2,
    Vsx3,
}

impl Cap {
    /// Every token, in rank order
    pub const ALL: [Cap; 26] = [
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
        Cap::Avx512f,
        Cap::Avx512cd,
        Cap::Avx512bw,
        Cap::Avx512dq,
        Cap::Avx512vl,
        Cap::Neon,
        Cap::NeonFp16,
        Cap::NeonVfpv4,
        Cap::Asimd,
        Cap::Asimdhp,
        Cap::Asimddp,
        Cap::Asimdfhm,
        Cap::Vsx,
        Cap::Vsx2,
        Cap::Vsx3,
    ];

    /// Canonical upper-case name (e.g. "AVX2", "NEON_FP16")
    pub const fn name(self) -> &'static str {
        match self {
            Cap::Sse => "SSE",
            Cap::Sse2 => "SSE2",
            Cap::Sse3 => "SSE3",
            Cap::Ssse3 => "SSSE3",
            Cap::Sse41 => "SSE41",
            Cap::Popcnt => "POPCNT",
            Cap::Sse42 => "SSE42",
            Cap::Avx => "AVX",
            Cap::F16c => "F16C",
            Cap::Fma3 => "FMA3",
            Cap::Avx2 => "AVX2",
            Cap::Avx512f => "AVX512F",
            Cap::Avx512cd => "AVX512CD",
            Cap::Avx512bw => "AVX512BW",
            Cap::Avx512dq => "AVX512DQ",
            Cap::Avx512vl => "AVX512VL",
            Cap::Neon => "NEON",
            Cap::NeonFp16 => "NEON_FP16",
            Cap::NeonVfpv4 => "NEON_VFPV4",
            Cap::Asimd => "ASIMD",
            Cap::Asimdhp => "ASIMDHP",
            Cap::Asimddp => "ASIMDDP",
            Cap::Asimdfhm => "ASIMDFHM",
            Cap::Vsx => "VSX",
            Cap::Vsx2 => "VSX2",
            Cap::Vsx3 => "VSX3",
        }
    }

    /// Bit used for this token inside a CapabilitySet
    const fn bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

impl fmt::Display for Cap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Cap> for &'static str {
    fn from(cap: Cap) -> Self {
        cap.name()
    }
}

/// Returned when a token name doesn't match any known capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability token '{0}'")]
pub struct UnknownCap(pub String);

impl FromStr for Cap {
    type Err = UnknownCap;

    /// Case-insensitive; accepts the canonical name only
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cap::ALL
            .into_iter()
            .find(|cap| cap.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCap(s.to_string()))
    }
}

/// Set of capability tokens, stored as a bitset
/// Copy + const-constructible so requirement sets can live in `static` dispatch tables
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet {
    bits: u64,
}

impl CapabilitySet {
    /// The empty set (baseline requirement)
    pub const EMPTY: CapabilitySet = CapabilitySet { bits: 0 };

    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Raw bitset, for storing a set in an atomic
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// Inverse of `bits`; bits that don't map to a token are dropped
    pub const fn from_bits(bits: u64) -> Self {
        Self { bits: bits & Self::VALID_BITS }
    }

    const VALID_BITS: u64 = (1u64 << Cap::ALL.len()) - 1;

    /// Build a set from a list of tokens (usable in const context)
    pub const fn of(caps: &[Cap]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < caps.len() {
            bits |= caps[i].bit();
            i += 1;
        }
        Self { bits }
    }

    pub const fn with(self, cap: Cap) -> Self {
        Self { bits: self.bits | cap.bit() }
    }

    pub const fn without(self, cap: Cap) -> Self {
        Self { bits: self.bits & !cap.bit() }
    }

    pub const fn union(self, other: CapabilitySet) -> Self {
        Self { bits: self.bits | other.bits }
    }

    pub const fn difference(self, other: CapabilitySet) -> Self {
        Self { bits: self.bits & !other.bits }
    }

    pub const fn contains(self, cap: Cap) -> bool {
        self.bits & cap.bit() != 0
    }

    /// True if every token of `self` is also in `other`
    pub const fn is_subset_of(self, other: CapabilitySet) -> bool {
        self.bits & !other.bits == 0
    }

    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn insert(&mut self, cap: Cap) {
        self.bits |= cap.bit();
    }

    pub fn remove(&mut self, cap: Cap) {
        self.bits &= !cap.bit();
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterate tokens in rank order
    pub fn iter(&self) -> impl Iterator<Item = Cap> + '_ {
        Cap::ALL.into_iter().filter(move |cap| self.contains(*cap))
    }

    /// Token names in rank order, for logging and reports
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(Cap::name).collect()
    }

    /// Highest-ranked token in the set
    pub fn highest(&self) -> Option<Cap> {
        self.iter().last()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        f.write_str(&self.names().join(" "))
    }
}

impl FromIterator<Cap> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Cap>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
