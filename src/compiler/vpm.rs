//! # VPM lowering eligibility
//!
//! Decides whether the memory behind an access may be relocated from main memory into the VPM.
//! The VPM is small and its contents do not survive the work-group invocation, so only memory
//! whose lifetime is bounded to one work-group (constants, `__local` globals, the stack) and whose
//! cached form fits the configured capacity qualifies.

use super::ir::memory_model::{check_memory_location, check_single_value};
use super::ir::{DataType, LocalKind, MemoryInstruction, MemoryOperation, Method, Value};
use super::TargetConfig;
use crate::error::{CompilationStep, Error, Result};

/// Type an object of type `ty` occupies when cached in VPM
///
/// Every scalar or vector element is padded to a full VPM row (`char3` becomes `char16`), pointers
/// are stored as 32-bit integers, arrays keep their size with padded elements.
pub fn vpm_storage_type(ty: &DataType, config: &TargetConfig) -> Result<DataType> {
    match ty {
        DataType::Array { elem, size } => {
            Ok(vpm_storage_type(elem, config)?.to_array_type(*size))
        }
        DataType::Bool | DataType::Int { .. } | DataType::Float { .. } | DataType::Vector { .. } => {
            Ok(ty.to_vector_type(config.vpm_row_elements))
        }
        DataType::Pointer { .. } => Ok(DataType::i32().to_vector_type(config.vpm_row_elements)),
        DataType::Struct { .. } | DataType::Label | DataType::Void => Err(Error::compilation(
            CompilationStep::General,
            "Unhandled element-type to cache in VPM",
            ty.to_string(),
        )),
    }
}

fn is_aggregate(ty: &DataType) -> bool {
    match ty {
        DataType::Struct { .. } => true,
        DataType::Array { elem, .. } => elem.is_struct(),
        _ => false,
    }
}

fn can_move_address_into_vpm(method: &Method, val: &Value, config: &TargetConfig) -> Result<bool> {
    let local = check_memory_location(method, val)?;
    let base_id = method.get_base(local, true);
    let base = method.local(base_id);
    let content = base.ty.element_type();

    if is_aggregate(&content) {
        tracing::debug!("Cannot lower struct memory into VPM: {}", base.name);
        return Ok(false);
    }
    let footprint = vpm_storage_type(&content, config)?.physical_width();
    if footprint > u64::from(config.vpm_size) {
        tracing::debug!(
            "Memory of {} needs {} bytes of VPM, only {} available",
            base.name,
            footprint,
            config.vpm_size
        );
        return Ok(false);
    }

    let eligible = match &base.kind {
        // constants never change, __local memory only lives for one work-group
        LocalKind::Global { is_constant, .. } => *is_constant || base.is_local_memory_global(),
        // host-visible, must be written back
        LocalKind::Parameter { .. } => false,
        // one stack per concurrently running work-item
        LocalKind::StackAllocation { .. } => {
            footprint.saturating_mul(u64::from(config.num_qpus)) <= u64::from(config.vpm_size)
        }
        LocalKind::Register => false,
    };
    tracing::debug!(
        "Memory of {} {} be lowered into VPM",
        base.name,
        if eligible { "can" } else { "cannot" }
    );
    Ok(eligible)
}

fn can_move_value_into_vpm(val: &Value) -> bool {
    match val.check_local() {
        // TODO allow once read/write pairs can be combined into VPM copies
        Some(_) => false,
        None => false,
    }
}

impl MemoryInstruction {
    fn check_entry_count(&self, method: &Method) -> Result<()> {
        if matches!(self.op, MemoryOperation::Read | MemoryOperation::Write) {
            check_single_value(method, self.num_entries())?;
        }
        Ok(())
    }

    /// Whether the source of this access may be relocated into VPM
    pub fn can_move_source_into_vpm(&self, method: &Method, config: &TargetConfig) -> Result<bool> {
        self.check_entry_count(method)?;
        match self.op {
            MemoryOperation::Copy | MemoryOperation::Read => {
                can_move_address_into_vpm(method, self.source(), config)
            }
            MemoryOperation::Write | MemoryOperation::Fill => {
                Ok(can_move_value_into_vpm(self.source()))
            }
        }
    }

    /// Whether the destination of this access may be relocated into VPM
    pub fn can_move_destination_into_vpm(
        &self,
        method: &Method,
        config: &TargetConfig,
    ) -> Result<bool> {
        self.check_entry_count(method)?;
        match self.op {
            MemoryOperation::Read => Ok(can_move_value_into_vpm(self.destination())),
            MemoryOperation::Write | MemoryOperation::Copy | MemoryOperation::Fill => {
                can_move_address_into_vpm(method, self.destination(), config)
            }
        }
    }
}
