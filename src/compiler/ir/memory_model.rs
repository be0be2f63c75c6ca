//! Pointer provenance and memory access classification
//!
//! Every memory address used by a [`MemoryInstruction`] has to be traced back to the memory
//! object it points into (its root allocation) before the access can be classified or lowered.
//! Tracing follows moves and pointer-plus-offset arithmetic only; any other source of a pointer
//! makes the address unanalyzable and the query fails instead of guessing.

use super::instruction::{Instruction, MemoryInstruction, MemoryOperation, OpCode};
use super::local::LocalId;
use super::program::Method;
use super::types::DataType;
use super::value::Value;
use crate::error::{CompilationStep, Error, Result};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Outcome of tracing a single local
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    /// Every chain ends in a memory object or parameter
    Rooted,
    /// Only chains back into locals currently being traced
    Cyclic,
    /// Some link is not a move or pointer-plus-offset
    Poisoned,
}

impl Trace {
    fn join(self, other: Trace) -> Trace {
        match (self, other) {
            (Trace::Poisoned, _) | (_, Trace::Poisoned) => Trace::Poisoned,
            (Trace::Rooted, _) | (_, Trace::Rooted) => Trace::Rooted,
            _ => Trace::Cyclic,
        }
    }
}

struct Tracer<'a> {
    method: &'a Method,
    visiting: HashSet<LocalId>,
    poisoned: HashSet<LocalId>,
}

impl<'a> Tracer<'a> {
    fn new(method: &'a Method) -> Self {
        Tracer {
            method,
            visiting: HashSet::new(),
            poisoned: HashSet::new(),
        }
    }

    fn trace(&mut self, local: LocalId) -> Trace {
        if self.poisoned.contains(&local) {
            return Trace::Poisoned;
        }
        if !self.visiting.insert(local) {
            return Trace::Cyclic;
        }

        let method = self.method;
        let base = method.local(method.get_base(local, true));
        if base.resides_in_memory() || base.is_parameter() {
            self.visiting.remove(&local);
            return Trace::Rooted;
        }

        let mut result: Option<Trace> = None;
        for writer in method.local(local).writers() {
            let link = match method.instruction(*writer) {
                Some(Instruction::Move(mv)) => match mv.source.check_local() {
                    Some(source) => self.trace(source),
                    None => Trace::Poisoned,
                },
                Some(Instruction::Operation(op)) if matches!(op.op, OpCode::Add | OpCode::Sub) => {
                    let pointer = match (op.first_arg(), op.second_arg()) {
                        (first, Some(second))
                            if first.ty.is_pointer() && !second.ty.is_pointer() =>
                        {
                            first.check_local()
                        }
                        (first, Some(second))
                            if op.op == OpCode::Add
                                && !first.ty.is_pointer()
                                && second.ty.is_pointer() =>
                        {
                            second.check_local()
                        }
                        _ => None,
                    };
                    match pointer {
                        Some(pointer) => self.trace(pointer),
                        None => Trace::Poisoned,
                    }
                }
                Some(other) => {
                    tracing::debug!(
                        "Unhandled source of pointer: {}",
                        method.instruction_to_string(other)
                    );
                    Trace::Poisoned
                }
                None => Trace::Poisoned,
            };
            result = Some(result.map_or(link, |acc| acc.join(link)));
            if link == Trace::Poisoned {
                break;
            }
        }

        self.visiting.remove(&local);
        // a register nothing writes has no provenance at all
        let result = result.unwrap_or(Trace::Poisoned);
        if result == Trace::Poisoned {
            self.poisoned.insert(local);
        }
        result
    }
}

/// Returns whether the pointer `local` is proven to point into a memory object or parameter
///
/// True if the local's base is memory-resident or a parameter, or if every writer is a move from,
/// or a pointer-plus-offset computation on, a local that is itself derived from memory. The first
/// unhandled writer anywhere in the chain makes the whole query false.
pub fn is_derived_from_memory(method: &Method, local: LocalId) -> bool {
    Tracer::new(method).trace(local) == Trace::Rooted
}

/// Memoized [`is_derived_from_memory`]
///
/// Results are bound to the method generation they were computed for and dropped as soon as the
/// method is mutated.
#[derive(Debug, Default)]
pub struct ProvenanceCache {
    generation: Option<u64>,
    results: HashMap<LocalId, bool>,
}

impl ProvenanceCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached provenance query
    pub fn is_derived_from_memory(&mut self, method: &Method, local: LocalId) -> bool {
        if self.generation != Some(method.generation()) {
            self.results.clear();
            self.generation = Some(method.generation());
        }
        *self
            .results
            .entry(local)
            .or_insert_with(|| is_derived_from_memory(method, local))
    }

    /// Drops all cached results
    pub fn invalidate(&mut self) {
        self.results.clear();
        self.generation = None;
    }

    /// Number of cached results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Checks that `val` is a pointer with established provenance, returning its local
pub fn check_memory_location(method: &Method, val: &Value) -> Result<LocalId> {
    if !val.ty.is_pointer() {
        return Err(Error::Provenance {
            step: CompilationStep::Llvm2Ir,
            message: "Operand needs to be a pointer".to_string(),
            value: method.value_to_string(val),
        });
    }
    match val.check_local() {
        Some(local) if is_derived_from_memory(method, local) => Ok(local),
        _ => Err(Error::Provenance {
            step: CompilationStep::Llvm2Ir,
            message: "Operand needs to refer to a memory location or a parameter containing one"
                .to_string(),
            value: method.value_to_string(val),
        }),
    }
}

/// Checks that `val` is a plain value, not a memory object or pointer/array parameter
pub fn check_local_value(method: &Method, val: &Value) -> Result<()> {
    if let Some(id) = val.check_local() {
        let local = method.local(id);
        if local.resides_in_memory()
            || (local.is_parameter() && (local.ty.is_pointer() || local.ty.is_array()))
        {
            return Err(Error::LocalValueRequired {
                step: CompilationStep::Llvm2Ir,
                value: method.value_to_string(val),
            });
        }
    }
    Ok(())
}

/// Checks that `val` is the literal one
pub fn check_single_value(method: &Method, val: &Value) -> Result<()> {
    if val.is_literal_one() {
        return Ok(());
    }
    Err(Error::UnitCountRequired {
        step: CompilationStep::Llvm2Ir,
        value: method.value_to_string(val),
    })
}

impl MemoryInstruction {
    /// Addresses this instruction accesses memory through
    pub fn accessed_addresses(&self) -> Vec<&Value> {
        match self.op {
            MemoryOperation::Copy => vec![self.source(), self.destination()],
            MemoryOperation::Fill | MemoryOperation::Write => vec![self.destination()],
            MemoryOperation::Read => vec![self.source()],
        }
    }

    /// Textual form with locals named by `method`
    pub fn to_string_in(&self, method: &Method) -> String {
        self.render(&|value| method.value_to_string(value))
    }

    fn accessed_bases(&self, method: &Method) -> Result<Vec<LocalId>> {
        self.accessed_addresses()
            .into_iter()
            .map(|address| {
                let local = check_memory_location(method, address)?;
                Ok(method.get_base(local, true))
            })
            .collect()
    }

    /// Root allocations accessed by this instruction
    pub fn get_memory_areas(&self, method: &Method) -> Result<BTreeSet<LocalId>> {
        Ok(self.accessed_bases(method)?.into_iter().collect())
    }

    /// Whether any accessed root allocation is a constant global
    pub fn accesses_constant_global(&self, method: &Method) -> Result<bool> {
        Ok(self
            .accessed_bases(method)?
            .into_iter()
            .any(|base| method.local(base).is_constant_global()))
    }

    /// Whether any accessed root allocation is a stack allocation
    pub fn accesses_stack_allocation(&self, method: &Method) -> Result<bool> {
        Ok(self
            .accessed_bases(method)?
            .into_iter()
            .any(|base| method.local(base).is_stack_allocation()))
    }

    /// Whether any accessed root allocation is a global in work-group shared memory
    pub fn accesses_local_memory(&self, method: &Method) -> Result<bool> {
        Ok(self
            .accessed_bases(method)?
            .into_iter()
            .any(|base| method.local(base).is_local_memory_global()))
    }

    fn sized(&self, method: &Method, element: DataType) -> Result<DataType> {
        match self.num_entries().literal_value().and_then(|l| l.unsigned_int()) {
            Some(count) => Ok(element.to_array_type(count)),
            None => Err(Error::UnsizedType {
                step: CompilationStep::General,
                instruction: self.to_string_in(method),
            }),
        }
    }

    /// Type of the data read
    ///
    /// The pointed-to type for reads and copies, the value type for writes and fills. With
    /// `sized_type`, copies return an array of the copied element count.
    pub fn get_source_element_type(&self, method: &Method, sized_type: bool) -> Result<DataType> {
        match self.op {
            MemoryOperation::Copy => {
                check_memory_location(method, self.source())?;
                let element = self.source().ty.element_type();
                if !sized_type {
                    return Ok(element);
                }
                self.sized(method, element)
            }
            MemoryOperation::Fill => {
                check_local_value(method, self.source())?;
                Ok(self.source().ty.clone())
            }
            MemoryOperation::Read => {
                check_memory_location(method, self.source())?;
                check_single_value(method, self.num_entries())?;
                Ok(self.source().ty.element_type())
            }
            MemoryOperation::Write => {
                check_local_value(method, self.source())?;
                check_single_value(method, self.num_entries())?;
                Ok(self.source().ty.clone())
            }
        }
    }

    /// Type of the data written
    ///
    /// The pointed-to type for writes, copies and fills, the value type for reads. With
    /// `sized_type`, copies and fills return an array of the written element count.
    pub fn get_destination_element_type(
        &self,
        method: &Method,
        sized_type: bool,
    ) -> Result<DataType> {
        match self.op {
            MemoryOperation::Copy | MemoryOperation::Fill => {
                check_memory_location(method, self.destination())?;
                let element = self.destination().ty.element_type();
                if !sized_type {
                    return Ok(element);
                }
                self.sized(method, element)
            }
            MemoryOperation::Read => {
                check_local_value(method, self.destination())?;
                check_single_value(method, self.num_entries())?;
                Ok(self.destination().ty.clone())
            }
            MemoryOperation::Write => {
                check_memory_location(method, self.destination())?;
                check_single_value(method, self.num_entries())?;
                Ok(self.destination().ty.element_type())
            }
        }
    }
}
