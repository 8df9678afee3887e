//! Engine configuration.
//!
//! A plain `serde`-derived struct with sane defaults, loadable from a TOML
//! string or file, with a validation pass that catches the one cross-field
//! invariant the engine refuses to run without: the livelock ceiling must
//! exceed the hanging-detection threshold.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Per-CLID visit count beyond which the loop detector suspects a spin.
const DEFAULT_HANGING_DETECTION_THRESHOLD: u32 = 50;

/// Total-events ceiling before the engine gives up and reports `Deadlock`.
const DEFAULT_LIVELOCK_EVENTS_THRESHOLD: u64 = 10_000;

/// Wall-clock budget for a single invocation.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Tunables for one invocation of the managed strategy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-CLID visit count triggering first-pass spin detection.
    pub hanging_detection_threshold: u32,
    /// When true, any lock/wait/spin inside a non-blocking actor is fatal.
    pub check_obstruction_freedom: bool,
    /// Global total-events ceiling before declaring deadlock.
    pub livelock_events_threshold: u64,
    /// Enable the local-object tracker optimisation.
    pub eliminate_local_objects: bool,
    /// Include state snapshots in the collected trace.
    pub collect_state_representation: bool,
    /// Invocation wall-clock budget, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hanging_detection_threshold: DEFAULT_HANGING_DETECTION_THRESHOLD,
            check_obstruction_freedom: false,
            livelock_events_threshold: DEFAULT_LIVELOCK_EVENTS_THRESHOLD,
            eliminate_local_objects: true,
            collect_state_representation: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Validate the one cross-field invariant this config can't express in
    /// its field types: the livelock ceiling must be strictly greater than
    /// the hanging-detection threshold, or every spin would be reported as
    /// a livelock before the loop detector gets a chance to measure its
    /// period.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.livelock_events_threshold <= self.hanging_detection_threshold as u64 {
            return Err(EngineError::InvalidConfig(format!(
                "livelock_events_threshold ({}) must be strictly greater than \
                 hanging_detection_threshold ({})",
                self.livelock_events_threshold, self.hanging_detection_threshold
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let cfg: EngineConfig =
            toml::from_str(s).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::InvalidConfig(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&text)
    }
}
