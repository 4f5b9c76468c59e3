//! Prover configuration
//!
//! Loaded by the host from JSON. Every field has a default, so an empty
//! object (or no file at all) yields a usable configuration.

use crate::types::Gas;
use revm::primitives::SpecId;
use serde::{Deserialize, Serialize};

/// Execution rules the traced blocks run under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hardfork {
    Shanghai,
    #[default]
    Cancun,
}

impl Hardfork {
    pub fn spec_id(self) -> SpecId {
        match self {
            Hardfork::Shanghai => SpecId::SHANGHAI,
            Hardfork::Cancun => SpecId::CANCUN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    pub hardfork: Hardfork,
    /// Upper bound applied to every transaction's gas limit
    pub gas_cap: Option<Gas>,
    /// Fold storage and account accesses into the access-list root
    pub record_access_list: bool,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            hardfork: Hardfork::default(),
            gas_cap: None,
            record_access_list: true,
        }
    }
}

impl ProverConfig {
    pub fn with_hardfork(mut self, hardfork: Hardfork) -> Self {
        self.hardfork = hardfork;
        self
    }

    pub fn with_gas_cap(mut self, gas_cap: Gas) -> Self {
        self.gas_cap = Some(gas_cap);
        self
    }

    pub fn with_access_list(mut self, record: bool) -> Self {
        self.record_access_list = record;
        self
    }

    /// Gas limit a transaction actually runs with.
    pub fn effective_gas_limit(&self, requested: Gas) -> Gas {
        match self.gas_cap {
            Some(cap) => requested.min(cap),
            None => requested,
        }
    }
}
