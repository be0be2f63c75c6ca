//! # Compiler core
//!
//! The intermediate representation of kernels and the memory-lowering queries an optimizer
//! consults before relocating memory accesses into the VPM, the small on-chip scratch memory.
//!
//! ## Usage
//!
//! ```ignore
//! use qpu_ir::compiler::TargetConfig;
//!
//! let config = TargetConfig::from_json(r#"{"vpm_size": 4096, "num_qpus": 12, "vpm_row_elements": 16}"#)?;
//! if mem.can_move_source_into_vpm(&method, &config)? {
//!     // lower the access into VPM
//! }
//! ```

pub mod ir;
pub mod vpm;

pub use ir::{Instruction, MemoryInstruction, MemoryOperation, Method, Module};
pub use vpm::vpm_storage_type;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hardware parameters of the compilation target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Bytes of VPM usable as scratch memory
    pub vpm_size: u32,
    /// Number of work-items executing concurrently, each needing its own stack
    pub num_qpus: u32,
    /// Elements in one VPM row, every cached element is padded to a full row
    pub vpm_row_elements: u8,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            vpm_size: 4096,
            num_qpus: 12,
            vpm_row_elements: 16,
        }
    }
}

impl TargetConfig {
    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TargetConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject configurations no target can have
    pub fn validate(&self) -> Result<()> {
        if self.vpm_size == 0 {
            return Err(Error::Config("vpm_size must not be zero".to_string()));
        }
        if self.num_qpus == 0 {
            return Err(Error::Config("num_qpus must not be zero".to_string()));
        }
        if self.vpm_row_elements == 0 {
            return Err(Error::Config(
                "vpm_row_elements must not be zero".to_string(),
            ));
        }
        Ok(())
    }
}
