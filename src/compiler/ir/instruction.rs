//! IR instruction definitions

use super::value::{Value, ValueKind};
use crate::error::{CompilationStep, Error, Result};
use std::fmt;

/// Stable index of an instruction within its method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

/// Stable index of a basic block within its method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Arithmetic, logical and comparison operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Bitwise and
    And,
    /// Bitwise or
    Or,
    /// Bitwise xor
    Xor,
    /// Shift left
    Shl,
    /// Shift right
    Shr,
    /// Bitwise not (unary)
    Not,
    /// Negation (unary)
    Neg,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Equal
    Eq,
    /// Not equal
    Ne,
}

impl OpCode {
    /// Number of arguments this operation takes
    pub fn arity(&self) -> usize {
        match self {
            OpCode::Not | OpCode::Neg => 1,
            _ => 2,
        }
    }

    /// Returns true for comparisons producing a boolean
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge | OpCode::Eq | OpCode::Ne
        )
    }

    /// Comparison with the operands swapped (`a < b` is `b > a`)
    pub fn swapped(&self) -> Self {
        match self {
            OpCode::Lt => OpCode::Gt,
            OpCode::Le => OpCode::Ge,
            OpCode::Gt => OpCode::Lt,
            OpCode::Ge => OpCode::Le,
            other => *other,
        }
    }

    /// Logical negation of a comparison (`!(a < b)` is `a >= b`)
    pub fn inverted(&self) -> Self {
        match self {
            OpCode::Lt => OpCode::Ge,
            OpCode::Le => OpCode::Gt,
            OpCode::Gt => OpCode::Le,
            OpCode::Ge => OpCode::Lt,
            OpCode::Eq => OpCode::Ne,
            OpCode::Ne => OpCode::Eq,
            other => *other,
        }
    }

    /// Textual symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Xor => "xor",
            OpCode::Shl => "shl",
            OpCode::Shr => "shr",
            OpCode::Not => "not",
            OpCode::Neg => "neg",
            OpCode::Lt => "<",
            OpCode::Le => "<=",
            OpCode::Gt => ">",
            OpCode::Ge => ">=",
            OpCode::Eq => "==",
            OpCode::Ne => "!=",
        }
    }
}

/// Arithmetic or logical operation with one or two arguments and one result
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Operation code
    pub op: OpCode,
    /// Result
    pub output: Value,
    /// Arguments, `op.arity()` many
    pub args: Vec<Value>,
}

impl Operation {
    /// Binary operation `output = lhs op rhs`
    pub fn binary(op: OpCode, output: Value, lhs: Value, rhs: Value) -> Self {
        Operation {
            op,
            output,
            args: vec![lhs, rhs],
        }
    }

    /// Unary operation `output = op src`
    pub fn unary(op: OpCode, output: Value, src: Value) -> Self {
        Operation {
            op,
            output,
            args: vec![src],
        }
    }

    /// First argument
    pub fn first_arg(&self) -> &Value {
        &self.args[0]
    }

    /// Second argument of binary operations
    pub fn second_arg(&self) -> Option<&Value> {
        self.args.get(1)
    }
}

/// Single-argument copy
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOperation {
    /// Destination
    pub output: Value,
    /// Source
    pub source: Value,
}

/// Kind of memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOperation {
    /// Load a single element from memory into a local
    Read,
    /// Store a single local value into memory
    Write,
    /// Copy a number of elements from one memory area into another
    Copy,
    /// Fill a number of memory elements with a single value
    Fill,
}

/// Access to memory, lowered into VPM/DMA accesses before code generation
///
/// * `Read`: `destination` is the loaded local, `source` the address
/// * `Write`: `destination` is the address, `source` the stored local value
/// * `Copy`: both are addresses
/// * `Fill`: `destination` is the address, `source` the fill value
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryInstruction {
    /// Kind of access
    pub op: MemoryOperation,
    destination: Value,
    source: Value,
    num_entries: Value,
}

impl MemoryInstruction {
    /// Creates a memory instruction, rejecting entry counts other than one for reads and writes
    pub fn new(
        op: MemoryOperation,
        destination: Value,
        source: Value,
        num_entries: Value,
    ) -> Result<Self> {
        let instr = MemoryInstruction {
            op,
            destination,
            source,
            num_entries,
        };
        if !instr.num_entries.is_literal_one()
            && !matches!(op, MemoryOperation::Copy | MemoryOperation::Fill)
        {
            return Err(Error::InvariantViolation {
                step: CompilationStep::Llvm2Ir,
                message: "Can only use the entry count for copying or filling memory".to_string(),
                detail: instr.to_string(),
            });
        }
        Ok(instr)
    }

    /// Source operand
    pub fn source(&self) -> &Value {
        &self.source
    }

    /// Destination operand
    pub fn destination(&self) -> &Value {
        &self.destination
    }

    /// Number of accessed elements
    pub fn num_entries(&self) -> &Value {
        &self.num_entries
    }

    /// Renders this instruction, naming values with `name`
    pub fn render(&self, name: &dyn Fn(&Value) -> String) -> String {
        match self.op {
            MemoryOperation::Copy => format!(
                "copy {} entries from {} into {}",
                name(&self.num_entries),
                name(&self.source),
                name(&self.destination)
            ),
            MemoryOperation::Fill => format!(
                "fill {} with {} copies of {}",
                name(&self.destination),
                name(&self.num_entries),
                name(&self.source)
            ),
            MemoryOperation::Read => format!(
                "{} = load memory at {}",
                name(&self.destination),
                name(&self.source)
            ),
            MemoryOperation::Write => format!(
                "store {} into {}",
                name(&self.source),
                name(&self.destination)
            ),
        }
    }
}

impl fmt::Display for MemoryInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&anonymous_name))
    }
}

/// Jump to another basic block
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Target block
    pub target: BlockId,
    /// Condition, unconditional if `None`
    pub condition: Option<Value>,
    /// Jump if the condition is false instead of true
    pub negated: bool,
    /// Back-jump of the compiler-inserted work-group loop
    pub work_group_loop: bool,
}

impl Branch {
    /// Unconditional jump
    pub fn to(target: BlockId) -> Self {
        Branch {
            target,
            condition: None,
            negated: false,
            work_group_loop: false,
        }
    }

    /// Jump if `condition` is true
    pub fn if_true(target: BlockId, condition: Value) -> Self {
        Branch {
            target,
            condition: Some(condition),
            negated: false,
            work_group_loop: false,
        }
    }

    /// Jump if `condition` is false
    pub fn if_false(target: BlockId, condition: Value) -> Self {
        Branch {
            target,
            condition: Some(condition),
            negated: true,
            work_group_loop: false,
        }
    }

    /// Marks this branch as the back-jump of the work-group loop
    pub fn work_group_loop(mut self) -> Self {
        self.work_group_loop = true;
        self
    }

    /// Returns true if this branch is always taken
    pub fn is_unconditional(&self) -> bool {
        self.condition.is_none()
    }
}

/// IR instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Arithmetic/logical operation
    Operation(Operation),
    /// Copy of a single value
    Move(MoveOperation),
    /// Memory access
    Memory(MemoryInstruction),
    /// Jump to another block
    Branch(Branch),
    /// Return from the kernel
    Return(Option<Value>),
    /// No operation
    Nop,
}

impl Instruction {
    /// Value written by this instruction, if it writes a local
    pub fn output(&self) -> Option<&Value> {
        match self {
            Instruction::Operation(op) => Some(&op.output),
            Instruction::Move(mv) => Some(&mv.output),
            Instruction::Memory(mem) if mem.op == MemoryOperation::Read => Some(mem.destination()),
            Instruction::Memory(_) => None,
            Instruction::Branch(_) | Instruction::Return(_) | Instruction::Nop => None,
        }
    }

    /// Values read by this instruction
    pub fn arguments(&self) -> Vec<&Value> {
        match self {
            Instruction::Operation(op) => op.args.iter().collect(),
            Instruction::Move(mv) => vec![&mv.source],
            Instruction::Memory(mem) => match mem.op {
                MemoryOperation::Read => vec![mem.source(), mem.num_entries()],
                MemoryOperation::Write | MemoryOperation::Copy | MemoryOperation::Fill => {
                    vec![mem.source(), mem.destination(), mem.num_entries()]
                }
            },
            Instruction::Branch(br) => br.condition.iter().collect(),
            Instruction::Return(val) => val.iter().collect(),
            Instruction::Nop => Vec::new(),
        }
    }

    /// Whether executing this instruction changes state other than its output
    pub fn has_side_effects(&self) -> bool {
        match self {
            Instruction::Memory(_) | Instruction::Branch(_) | Instruction::Return(_) => true,
            Instruction::Operation(_) | Instruction::Move(_) | Instruction::Nop => false,
        }
    }

    /// Whether this instruction can be encoded without further lowering
    pub fn is_normalized(&self) -> bool {
        match self {
            Instruction::Memory(_) => false,
            Instruction::Operation(_)
            | Instruction::Move(_)
            | Instruction::Branch(_)
            | Instruction::Return(_)
            | Instruction::Nop => true,
        }
    }

    /// Renders this instruction, naming values with `name`
    pub fn render(&self, name: &dyn Fn(&Value) -> String) -> String {
        match self {
            Instruction::Operation(op) => {
                let args: Vec<String> = op.args.iter().map(name).collect();
                format!("{} = {} {}", name(&op.output), op.op.symbol(), args.join(", "))
            }
            Instruction::Move(mv) => format!("{} = {}", name(&mv.output), name(&mv.source)),
            Instruction::Memory(mem) => mem.render(name),
            Instruction::Branch(br) => match &br.condition {
                None => format!("br %block{}", br.target.0),
                Some(cond) if br.negated => {
                    format!("br %block{} (if not {})", br.target.0, name(cond))
                }
                Some(cond) => format!("br %block{} (if {})", br.target.0, name(cond)),
            },
            Instruction::Return(Some(val)) => format!("ret {}", name(val)),
            Instruction::Return(None) => "ret".to_string(),
            Instruction::Nop => "nop".to_string(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&anonymous_name))
    }
}

/// Names locals by their index, for use where no method is at hand
pub(crate) fn anonymous_name(value: &Value) -> String {
    match value.kind {
        ValueKind::Literal(lit) => format!("{} {}", value.ty, lit),
        ValueKind::Local(id) => format!("{} %{}", value.ty, id.0),
        ValueKind::Undefined => format!("{} undefined", value.ty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::local::LocalId;
    use crate::compiler::ir::types::{AddressSpace, DataType};

    fn ptr(id: u32) -> Value {
        Value::local(
            LocalId(id),
            DataType::pointer_to(DataType::i32(), AddressSpace::Global),
        )
    }

    #[test]
    fn test_copy_and_fill_accept_entry_count() {
        let five = Value::literal(5, DataType::i32());
        assert!(MemoryInstruction::new(MemoryOperation::Copy, ptr(0), ptr(1), five.clone()).is_ok());
        let value = Value::local(LocalId(2), DataType::i32());
        assert!(MemoryInstruction::new(MemoryOperation::Fill, ptr(0), value, five).is_ok());
    }

    #[test]
    fn test_read_and_write_reject_entry_count() {
        let five = Value::literal(5, DataType::i32());
        let value = Value::local(LocalId(2), DataType::i32());
        let err = MemoryInstruction::new(MemoryOperation::Read, value.clone(), ptr(1), five.clone())
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation { .. }));
        let err = MemoryInstruction::new(MemoryOperation::Write, ptr(0), value, five).unwrap_err();
        assert!(err.to_string().contains("store"));
    }

    #[test]
    fn test_side_effects_and_normalization() {
        let one = Value::literal(1, DataType::i32());
        let value = Value::local(LocalId(2), DataType::i32());
        let read = Instruction::Memory(
            MemoryInstruction::new(MemoryOperation::Read, value.clone(), ptr(1), one.clone())
                .unwrap(),
        );
        assert!(read.has_side_effects());
        assert!(!read.is_normalized());
        assert_eq!(read.output(), Some(&value));

        let add = Instruction::Operation(Operation::binary(OpCode::Add, value.clone(), value, one));
        assert!(!add.has_side_effects());
        assert!(add.is_normalized());
    }

    #[test]
    fn test_comparison_helpers() {
        assert_eq!(OpCode::Lt.swapped(), OpCode::Gt);
        assert_eq!(OpCode::Lt.inverted(), OpCode::Ge);
        assert_eq!(OpCode::Ne.inverted(), OpCode::Eq);
        assert!(OpCode::Le.is_comparison());
        assert!(!OpCode::Add.is_comparison());
        assert_eq!(OpCode::Neg.arity(), 1);
    }
}
