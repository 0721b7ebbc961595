//! Process-wide capability registry
//!
//! Detection runs once, inside a `OnceLock` initializer: concurrent callers
//! either block until it is complete or see the finished result, never a
//! partially built set. After detection, tokens can still be disabled until
//! the first dispatch slot reads the set; that read seals the registry.
//!
//! The effective set is detected minus disabled. Disabling comes from the
//! `CPU_DISPATCH_DISABLE` environment variable at initialization and from
//! `force_disable`.

pub mod cpu_features;

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use thiserror::Error;

use crate::core::types::{Cap, CapabilitySet, UnknownCap};

pub use cpu_features::{CpuFeatures, capabilities_from_cpuinfo, cpu_model, detect_native};

/// Whitespace or comma separated token names to disable at startup
pub const DISABLE_ENV: &str = "CPU_DISPATCH_DISABLE";

/// Set in the disabled word once a dispatch slot has read the registry
const SEALED: u64 = 1 << 63;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot disable {0}: a dispatch slot already resolved against the capability registry")]
    Sealed(Cap),

    #[error(transparent)]
    UnknownToken(#[from] UnknownCap),
}

struct Registry {
    features: CpuFeatures,
    /// Disabled token bits, plus SEALED
    disabled: AtomicU64,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    fn initialize() -> Self {
        let features = CpuFeatures::detect();
        info!("Detected CPU capabilities: {}", features.describe());
        if let Some(model) = &features.model {
            debug!("CPU model: {}", model);
        }

        let disabled = match std::env::var(DISABLE_ENV) {
            Ok(value) => {
                let (disabled, unknown) = parse_token_list(&value);
                for name in unknown {
                    warn!("{}: ignoring unknown capability '{}'", DISABLE_ENV, name);
                }
                if !disabled.is_empty() {
                    info!("{} disables: {}", DISABLE_ENV, disabled);
                }
                disabled
            }
            Err(_) => CapabilitySet::EMPTY,
        };

        Self {
            features,
            disabled: AtomicU64::new(disabled.bits()),
        }
    }

    fn effective(&self, word: u64) -> CapabilitySet {
        self.features.detected.difference(CapabilitySet::from_bits(word))
    }
}

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::initialize)
}

/// Everything the machine supports, ignoring disabled tokens
/// Detection happens on the first call from any of the registry functions
pub fn detect() -> CapabilitySet {
    registry().features.detected
}

/// Effective presence of `cap` (detected and not disabled)
pub fn has(cap: Cap) -> bool {
    let registry = registry();
    registry
        .effective(registry.disabled.load(Ordering::Acquire))
        .contains(cap)
}

/// Effective set for dispatch; seals the registry against further disabling
pub fn capabilities() -> CapabilitySet {
    let registry = registry();
    let word = registry.disabled.fetch_or(SEALED, Ordering::AcqRel);
    if word & SEALED == 0 {
        debug!("Capability registry sealed: {}", registry.effective(word));
    }
    registry.effective(word)
}

/// Tokens disabled so far
pub fn disabled() -> CapabilitySet {
    CapabilitySet::from_bits(registry().disabled.load(Ordering::Acquire))
}

/// True once a dispatch slot has read the registry
pub fn is_sealed() -> bool {
    registry().disabled.load(Ordering::Acquire) & SEALED != 0
}

/// Model description from the CPU probe, if the source had one
pub fn cpu_model_name() -> Option<&'static str> {
    registry().features.model.as_deref()
}

/// Clear `cap` from the effective set, for tests and overrides
/// Only possible before the first dispatch slot resolves
pub fn force_disable(cap: Cap) -> Result<(), RegistryError> {
    let registry = registry();
    let bit = CapabilitySet::of(&[cap]).bits();
    let mut current = registry.disabled.load(Ordering::Acquire);
    loop {
        if current & SEALED != 0 {
            return Err(RegistryError::Sealed(cap));
        }
        match registry.disabled.compare_exchange_weak(
            current,
            current | bit,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!("Capability {} disabled", cap);
                return Ok(());
            }
            Err(actual) => current = actual,
        }
    }
}

/// `force_disable` by token name
pub fn force_disable_by_name(name: &str) -> Result<(), RegistryError> {
    force_disable(name.parse::<Cap>()?)
}

/// Split a list of token names on spaces, tabs and commas
/// Returns the recognized tokens and the names that matched nothing
pub fn parse_token_list(list: &str) -> (CapabilitySet, Vec<String>) {
    let mut set = CapabilitySet::new();
    let mut unknown = Vec::new();
    for name in list
        .split(|c: char| c == ' ' || c == '\t' || c == ',')
        .filter(|name| !name.is_empty())
    {
        match name.parse::<Cap>() {
            Ok(cap) => set.insert(cap),
            Err(_) => unknown.push(name.to_string()),
        }
    }
    (set, unknown)
}
