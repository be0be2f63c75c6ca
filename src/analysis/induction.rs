//! # Induction variables
//!
//! An induction variable is a local assigned once before a loop and advanced by a loop-invariant
//! amount exactly once on every iteration:
//!
//! ```text
//! entry:  %i = 0                      ; initial assignment
//! loop:   ...
//!         %i = add %i, 1              ; induction step
//!         %c = < %i, 16               ; repeat condition
//!         br %loop (if %c)
//! ```
//!
//! The step may also go through a temporary (`%t = add %i, 1` followed by `%i = %t`).

use super::cfg::ControlFlowGraph;
use super::dependency::{Access, DataDependencyGraph};
use super::loops::ControlFlowLoop;
use crate::compiler::ir::{
    BlockId, InstrId, Instruction, Literal, LocalId, Method, OpCode, Operation, Position, Value,
};
use std::collections::BTreeSet;

/// Condition under which the loop runs another iteration
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatCondition {
    /// Comparison with the induction variable on the left-hand side
    pub comparison: OpCode,
    /// Loop-invariant right-hand side
    pub compared_to: Value,
}

/// Induction variable of one loop
#[derive(Debug, Clone, PartialEq)]
pub struct InductionVariable {
    /// The variable
    pub local: LocalId,
    /// Single assignment outside the loop
    pub initial_assignment: InstrId,
    /// Operation advancing the variable inside the loop
    pub induction_step: InstrId,
    /// Repeat condition, if one was found and requested
    pub repeat_condition: Option<RepeatCondition>,
    /// Whether the repeat condition compares the value from before the step
    pub condition_checked_before_step: bool,
    initial: Instruction,
    step: Operation,
}

impl InductionVariable {
    /// Copy of the initial assignment
    pub fn initial_instruction(&self) -> &Instruction {
        &self.initial
    }

    /// Copy of the step operation
    pub fn step_operation(&self) -> &Operation {
        &self.step
    }

    /// Literal value assigned before the loop
    pub fn get_lower_bound(&self) -> Option<Literal> {
        match &self.initial {
            Instruction::Move(mv) => mv.source.literal_value(),
            _ => None,
        }
    }

    /// Literal the variable is compared against in the repeat condition
    pub fn get_upper_bound(&self) -> Option<Literal> {
        self.repeat_condition
            .as_ref()
            .and_then(|cond| cond.compared_to.literal_value())
    }

    /// Literal added to the variable per iteration, negative for decrementing steps
    pub fn get_step(&self) -> Option<Literal> {
        match self.step.op {
            OpCode::Add => self.step.args.iter().find_map(Value::literal_value),
            OpCode::Sub => self
                .step
                .second_arg()
                .and_then(Value::literal_value)
                .and_then(|lit| lit.0.checked_neg())
                .map(Literal),
            _ => None,
        }
    }

    /// Distance between the bounds
    pub fn get_range(&self) -> Option<u64> {
        let lower = i128::from(self.get_lower_bound()?.0);
        let upper = i128::from(self.get_upper_bound()?.0);
        u64::try_from((upper - lower).abs()).ok()
    }

    /// Number of times the loop body runs
    ///
    /// Only defined for literal bounds and step moving towards the upper bound. With the
    /// condition `U - L` iterations are counted as:
    ///
    /// * `<` and `>`: `ceil((U - L) / S)`
    /// * `<=` and `>=`: `floor((U - L) / S) + 1`
    /// * `!=`: `(U - L) / S`, only if the step hits the bound exactly
    ///
    /// A condition checked before the step adds one iteration.
    pub fn get_iteration_count(&self) -> Option<u64> {
        let condition = self.repeat_condition.as_ref()?;
        let lower = i128::from(self.get_lower_bound()?.0);
        let upper = i128::from(self.get_upper_bound()?.0);
        let step = i128::from(self.get_step()?.0);
        let diff = upper - lower;
        if step == 0 || diff == 0 || (diff > 0) != (step > 0) {
            return None;
        }

        let ascending = step > 0;
        let count = match condition.comparison {
            OpCode::Lt if ascending => (diff.abs() + step.abs() - 1) / step.abs(),
            OpCode::Gt if !ascending => (diff.abs() + step.abs() - 1) / step.abs(),
            OpCode::Le if ascending => diff / step + 1,
            OpCode::Ge if !ascending => diff / step + 1,
            OpCode::Ne if diff % step == 0 => diff / step,
            _ => return None,
        };
        let count = if self.condition_checked_before_step {
            count + 1
        } else {
            count
        };
        u64::try_from(count).ok()
    }

    /// Human-readable description naming locals
    pub fn to_string(&self, method: &Method) -> String {
        let name = &method.local(self.local).name;
        let mut s = format!(
            "{} = {}",
            name,
            method.instruction_to_string(&Instruction::Operation(self.step.clone()))
        );
        match &self.initial {
            Instruction::Move(mv) => s.push_str(&format!(
                " starting at {}",
                method.value_to_string(&mv.source)
            )),
            other => s.push_str(&format!(
                " starting with {}",
                method.instruction_to_string(other)
            )),
        }
        if let Some(cond) = &self.repeat_condition {
            s.push_str(&format!(
                " while {} {} {}",
                name,
                cond.comparison.symbol(),
                method.value_to_string(&cond.compared_to)
            ));
            if self.condition_checked_before_step {
                s.push_str(" (checked before step)");
            }
        }
        s
    }
}

/// Induction variables of `lp`
///
/// A local qualifies if it is
///
/// * written exactly once outside the loop,
/// * written exactly once inside the loop, by an `add` or `sub` of itself and a loop-invariant
///   value (directly or through a temporary),
/// * stepped on every path to the tail.
///
/// Candidates failing any condition are skipped. With `include_iteration_information` the repeat
/// condition is extracted from the conditional branch of the tail.
pub fn find_induction_variables(
    lp: &ControlFlowLoop,
    method: &Method,
    cfg: &ControlFlowGraph,
    dependencies: &DataDependencyGraph,
    include_iteration_information: bool,
) -> Vec<InductionVariable> {
    let (Some(header), Some(tail)) = (lp.get_header(cfg), lp.get_tail(cfg)) else {
        tracing::debug!("Loop without unique header and tail has no induction variables");
        return Vec::new();
    };
    let finder = Finder {
        lp,
        method,
        cfg,
        dependencies,
        header,
        tail,
    };

    let variables: Vec<InductionVariable> = dependencies
        .written_locals()
        .filter_map(|local| finder.extract(local, include_iteration_information))
        .collect();
    for var in &variables {
        tracing::debug!("Found induction variable: {}", var.to_string(method));
    }
    variables
}

struct Finder<'a> {
    lp: &'a ControlFlowLoop,
    method: &'a Method,
    cfg: &'a ControlFlowGraph,
    dependencies: &'a DataDependencyGraph,
    header: BlockId,
    tail: BlockId,
}

impl<'a> Finder<'a> {
    fn nodes(&self) -> &BTreeSet<BlockId> {
        self.lp.nodes()
    }

    fn is_invariant(&self, value: &Value) -> bool {
        match value.check_local() {
            None => true,
            Some(local) => self.dependencies.writers_in(local, self.nodes()).is_empty(),
        }
    }

    /// Whether `a` executes before `b` within one iteration
    fn precedes(&self, a: Position, b: Position) -> bool {
        if a.block == b.block {
            a.index < b.index
        } else {
            self.cfg.dominates(a.block, b.block)
        }
    }

    fn extract(&self, local: LocalId, include_iteration_information: bool) -> Option<InductionVariable> {
        let inside = self.dependencies.writers_in(local, self.nodes());
        let outside = self.dependencies.writers_outside(local, self.nodes());
        let (&[writer], &[initial]) = (inside.as_slice(), outside.as_slice()) else {
            return None;
        };
        // the initial value has to reach the loop on every entry
        if !self.cfg.dominates(initial.position.block, self.header) {
            tracing::trace!(
                "Initial assignment of {} does not precede the loop",
                self.method.local(local).name
            );
            return None;
        }

        let (step_access, step, temporary) = match self.method.instruction(writer.instr)? {
            Instruction::Operation(op) => (writer, op.clone(), None),
            Instruction::Move(mv) => {
                let temp = mv.source.check_local()?;
                let &[step_access] = self.dependencies.writers(temp) else {
                    return None;
                };
                if !self.nodes().contains(&step_access.position.block)
                    || !self.precedes(step_access.position, writer.position)
                {
                    return None;
                }
                match self.method.instruction(step_access.instr)? {
                    Instruction::Operation(op) => (step_access, op.clone(), Some(temp)),
                    _ => return None,
                }
            }
            _ => return None,
        };

        let increment = step_increment(&step, local)?;
        if !self.is_invariant(increment) {
            return None;
        }
        if !self.cfg.dominates(writer.position.block, self.tail)
            || !self.cfg.dominates(step_access.position.block, self.tail)
        {
            tracing::trace!(
                "{} is not advanced on every iteration",
                self.method.local(local).name
            );
            return None;
        }

        let mut var = InductionVariable {
            local,
            initial_assignment: initial.instr,
            induction_step: step_access.instr,
            repeat_condition: None,
            condition_checked_before_step: false,
            initial: self.method.instruction(initial.instr)?.clone(),
            step,
        };
        if include_iteration_information {
            if let Some((condition, before)) = self.repeat_condition(local, temporary, writer) {
                var.repeat_condition = Some(condition);
                var.condition_checked_before_step = before;
            }
        }
        Some(var)
    }

    /// Comparison deciding whether the tail jumps back, normalized to `var <op> bound`
    fn repeat_condition(
        &self,
        local: LocalId,
        temporary: Option<LocalId>,
        writer: Access,
    ) -> Option<(RepeatCondition, bool)> {
        let header = self.lp.get_header(self.cfg)?;

        // the tail either jumps back conditionally or leaves the loop conditionally
        let (condition, repeat_if) = self
            .method
            .block(self.tail)
            .instructions()
            .iter()
            .filter_map(|id| match self.method.instruction(*id) {
                Some(Instruction::Branch(br)) => {
                    let cond = br.condition.as_ref()?.check_local()?;
                    if br.target == header {
                        Some((cond, !br.negated))
                    } else if !self.nodes().contains(&br.target) {
                        Some((cond, br.negated))
                    } else {
                        None
                    }
                }
                _ => None,
            })
            .next()?;

        let &[comparison] = self.dependencies.writers(condition) else {
            return None;
        };
        if !self.nodes().contains(&comparison.position.block) {
            return None;
        }
        let Some(Instruction::Operation(op)) = self.method.instruction(comparison.instr) else {
            return None;
        };
        if !op.op.is_comparison() {
            return None;
        }

        let is_var = |value: &Value| {
            let id = value.check_local();
            id.is_some() && (id == Some(local) || id == temporary)
        };
        let (var_side, bound, mut comparator) = match (op.first_arg(), op.second_arg()?) {
            (first, second) if is_var(first) && !is_var(second) => (first, second, op.op),
            (first, second) if is_var(second) && !is_var(first) => (second, first, op.op.swapped()),
            _ => return None,
        };
        if !self.is_invariant(bound) {
            return None;
        }
        if !repeat_if {
            comparator = comparator.inverted();
        }

        let before = if var_side.check_local() == Some(local) {
            self.precedes(comparison.position, writer.position)
        } else {
            false
        };
        Some((
            RepeatCondition {
                comparison: comparator,
                compared_to: bound.clone(),
            },
            before,
        ))
    }
}

/// The value added to `local` by `step`, if `step` advances `local`
fn step_increment(step: &Operation, local: LocalId) -> Option<&Value> {
    let is_local = |value: &Value| value.check_local() == Some(local);
    let first = step.first_arg();
    let second = step.second_arg()?;
    match step.op {
        OpCode::Add if is_local(first) && !is_local(second) => Some(second),
        OpCode::Add if is_local(second) && !is_local(first) => Some(first),
        OpCode::Sub if is_local(first) && !is_local(second) => Some(second),
        _ => None,
    }
}
