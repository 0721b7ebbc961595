use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use super::slot::{Dispatch, VariantInfo};
use crate::core::types::CapabilitySet;
use crate::registry;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no dispatched function named '{0}'")]
    UnknownFunction(String),

    #[error("dispatched function '{0}' is already registered")]
    Duplicate(&'static str),
}

/// Name-keyed set of dispatch slots
///
/// A registry table resolves its slots for real: the first query publishes
/// the selected variant, exactly as a call would. A simulated table answers
/// for an explicit capability set and never publishes, so previewing another
/// machine can't pin a process-wide slot to an entry this CPU can't run.
pub struct DispatchTable {
    detected: CapabilitySet,
    simulated: bool,
    slots: BTreeMap<&'static str, &'static dyn Dispatch>,
}

impl DispatchTable {
    /// Table over the process-wide registry (seals it)
    pub fn from_registry() -> Self {
        Self {
            detected: registry::capabilities(),
            simulated: false,
            slots: BTreeMap::new(),
        }
    }

    /// Table answering for `detected` without resolving any slot
    pub fn simulated(detected: CapabilitySet) -> Self {
        Self {
            detected,
            simulated: true,
            slots: BTreeMap::new(),
        }
    }

    pub fn detected(&self) -> CapabilitySet {
        self.detected
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn register(&mut self, slot: &'static dyn Dispatch) -> Result<(), DispatchError> {
        let name = slot.name();
        if self.slots.contains_key(name) {
            return Err(DispatchError::Duplicate(name));
        }
        self.slots.insert(name, slot);
        Ok(())
    }

    fn slot(&self, name: &str) -> Result<&'static dyn Dispatch, DispatchError> {
        self.slots
            .get(name)
            .copied()
            .ok_or_else(|| DispatchError::UnknownFunction(name.to_string()))
    }

    fn variant_of(&self, slot: &dyn Dispatch) -> VariantInfo {
        if self.simulated {
            slot.simulate_info(self.detected)
        } else {
            slot.resolve_info()
        }
    }

    /// Variant `name` dispatches to; resolves its slot on a registry table
    pub fn resolve(&self, name: &str) -> Result<VariantInfo, DispatchError> {
        Ok(self.variant_of(self.slot(name)?))
    }

    /// Name of the variant active for `name`
    pub fn active_variant(&self, name: &str) -> Result<&'static str, DispatchError> {
        self.resolve(name).map(|info| info.name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve (or simulate) everything and describe the outcome
    pub fn report(&self) -> DispatchReport {
        let functions = self
            .slots
            .values()
            .map(|slot| {
                let active = self.variant_of(*slot);
                let candidates = slot
                    .candidates()
                    .into_iter()
                    .map(|variant| Candidate {
                        eligible: variant.required.is_subset_of(self.detected),
                        variant,
                    })
                    .collect();
                FunctionReport {
                    name: slot.name(),
                    active,
                    candidates,
                }
            })
            .collect();

        DispatchReport {
            detected: self.detected,
            simulated: self.simulated,
            functions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub variant: VariantInfo,
    pub eligible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionReport {
    pub name: &'static str,
    pub active: VariantInfo,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub detected: CapabilitySet,
    pub simulated: bool,
    pub functions: Vec<FunctionReport>,
}
