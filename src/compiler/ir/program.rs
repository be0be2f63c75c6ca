//! Methods, basic blocks and modules

use super::instruction::{BlockId, InstrId, Instruction, OpCode};
use super::local::{Local, LocalId, LocalKind};
use super::types::{AddressSpace, DataType};
use super::value::{Value, ValueKind};
use std::collections::HashSet;

/// Basic block in the control flow graph
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Label identifying this basic block
    pub label: String,
    /// Instructions in execution order
    pub(crate) instructions: Vec<InstrId>,
}

impl BasicBlock {
    /// Create a new basic block with the given label
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            instructions: Vec::new(),
        }
    }

    /// Instructions in execution order
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }
}

/// Position of an instruction inside its method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Containing block
    pub block: BlockId,
    /// Index within the block
    pub index: usize,
}

#[derive(Debug, Clone)]
struct InstrSlot {
    instr: Instruction,
    block: BlockId,
}

/// A kernel function: locals, instructions and basic blocks
///
/// Locals, instructions and blocks live in arenas addressed by stable indices. Writer and user
/// sets of locals are maintained by [`Method::append`] and [`Method::remove`]; every mutation bumps
/// [`Method::generation`], which invalidates derived analyses.
#[derive(Debug, Clone)]
pub struct Method {
    /// Name of the kernel
    pub name: String,
    locals: Vec<Local>,
    instructions: Vec<Option<InstrSlot>>,
    blocks: Vec<BasicBlock>,
    generation: u64,
}

impl Method {
    /// Create a new empty method
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            locals: Vec::new(),
            instructions: Vec::new(),
            blocks: Vec::new(),
            generation: 0,
        }
    }

    /// Mutation counter, changes whenever instructions are added or removed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn push_local(&mut self, local: Local) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(local);
        id
    }

    /// Add a virtual register
    pub fn add_local(&mut self, name: &str, ty: DataType) -> Value {
        let id = self.push_local(Local::new(name, ty.clone(), LocalKind::Register));
        Value::local(id, ty)
    }

    /// Add a kernel parameter
    pub fn add_parameter(&mut self, name: &str, ty: DataType) -> Value {
        let address_space = ty.pointer_type();
        let id = self.push_local(Local::new(
            name,
            ty.clone(),
            LocalKind::Parameter { address_space },
        ));
        Value::local(id, ty)
    }

    /// Add a global holding a `content` typed object, returns the pointer to it
    pub fn add_global(
        &mut self,
        name: &str,
        content: DataType,
        is_constant: bool,
        address_space: AddressSpace,
    ) -> Value {
        let ty = DataType::pointer_to(content, address_space);
        let id = self.push_local(Local::new(
            name,
            ty.clone(),
            LocalKind::Global {
                is_constant,
                address_space,
            },
        ));
        Value::local(id, ty)
    }

    /// Add a per work-item stack object of type `content`, returns the pointer to it
    pub fn add_stack_allocation(&mut self, name: &str, content: DataType, alignment: u32) -> Value {
        let size = content.physical_width();
        let ty = DataType::pointer_to(content, AddressSpace::Private);
        let id = self.push_local(Local::new(
            name,
            ty.clone(),
            LocalKind::StackAllocation { size, alignment },
        ));
        Value::local(id, ty)
    }

    /// Local by index
    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.0 as usize]
    }

    /// All locals with their indices
    pub fn locals(&self) -> impl Iterator<Item = (LocalId, &Local)> {
        self.locals
            .iter()
            .enumerate()
            .map(|(i, local)| (LocalId(i as u32), local))
    }

    /// Append a new basic block
    pub fn add_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(label));
        self.generation += 1;
        id
    }

    /// Basic block by index
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    /// All basic blocks in layout order
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockId(i as u32), block))
    }

    /// Number of basic blocks
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Append an instruction to the end of `block`
    pub fn append(&mut self, block: BlockId, instr: Instruction) -> InstrId {
        let id = InstrId(self.instructions.len() as u32);
        if let Some(out) = instr.output().and_then(Value::check_local) {
            self.locals[out.0 as usize].writers.insert(id);
        }
        for arg in instr.arguments() {
            if let Some(local) = arg.check_local() {
                self.locals[local.0 as usize].users.insert(id);
            }
        }
        self.blocks[block.0 as usize].instructions.push(id);
        self.instructions.push(Some(InstrSlot { instr, block }));
        self.generation += 1;
        id
    }

    /// Remove an instruction, returning it
    pub fn remove(&mut self, id: InstrId) -> Option<Instruction> {
        let slot = self.instructions.get_mut(id.0 as usize)?.take()?;
        if let Some(out) = slot.instr.output().and_then(Value::check_local) {
            self.locals[out.0 as usize].writers.remove(&id);
        }
        for arg in slot.instr.arguments() {
            if let Some(local) = arg.check_local() {
                self.locals[local.0 as usize].users.remove(&id);
            }
        }
        self.blocks[slot.block.0 as usize]
            .instructions
            .retain(|&other| other != id);
        self.generation += 1;
        Some(slot.instr)
    }

    /// Instruction by index, `None` once removed
    pub fn instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.instr)
    }

    /// Block containing the instruction
    pub fn block_of(&self, id: InstrId) -> Option<BlockId> {
        self.instructions
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.block)
    }

    /// Current position of the instruction
    pub fn position_of(&self, id: InstrId) -> Option<Position> {
        let block = self.block_of(id)?;
        let index = self
            .block(block)
            .instructions
            .iter()
            .position(|&other| other == id)?;
        Some(Position { block, index })
    }

    /// Instruction at the given position
    pub fn instruction_at(&self, pos: Position) -> Option<(InstrId, &Instruction)> {
        let id = *self.blocks.get(pos.block.0 as usize)?.instructions.get(pos.index)?;
        self.instruction(id).map(|instr| (id, instr))
    }

    /// Root allocation the pointer `local` is derived from
    ///
    /// Follows moves and pointer-plus-offset arithmetic. Writers referring back to the local itself
    /// (e.g. `p = p + 4` in a loop) are skipped; if the remaining writers disagree or one of them
    /// is anything else, the local is its own base. With `follow_chains` unset only a single step
    /// is taken.
    pub fn get_base(&self, local: LocalId, follow_chains: bool) -> LocalId {
        let mut visiting = HashSet::new();
        self.resolve_base(local, follow_chains, &mut visiting)
            .unwrap_or(local)
    }

    fn resolve_base(
        &self,
        local: LocalId,
        follow_chains: bool,
        visiting: &mut HashSet<LocalId>,
    ) -> Option<LocalId> {
        if !visiting.insert(local) {
            return None;
        }
        let entry = self.local(local);
        if entry.resides_in_memory() || entry.is_parameter() {
            return Some(local);
        }

        let mut base: Option<LocalId> = None;
        for writer in &entry.writers {
            let source = match self.instruction(*writer).and_then(|i| self.chain_source(i)) {
                Some(source) => source,
                None => return Some(local),
            };
            if source == local {
                continue;
            }
            let resolved = if follow_chains {
                match self.resolve_base(source, true, visiting) {
                    Some(resolved) => resolved,
                    None => continue,
                }
            } else {
                source
            };
            match base {
                Some(existing) if existing != resolved => return Some(local),
                _ => base = Some(resolved),
            }
        }
        Some(base.unwrap_or(local))
    }

    /// Local a pointer-chain writer derives its output from
    fn chain_source(&self, instr: &Instruction) -> Option<LocalId> {
        match instr {
            Instruction::Move(mv) => mv.source.check_local(),
            Instruction::Operation(op) if matches!(op.op, OpCode::Add | OpCode::Sub) => {
                let second = op.second_arg()?;
                match (op.first_arg().ty.is_pointer(), second.ty.is_pointer()) {
                    (true, false) => op.first_arg().check_local(),
                    (false, true) if op.op == OpCode::Add => second.check_local(),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Textual form of a value, naming locals
    pub fn value_to_string(&self, value: &Value) -> String {
        match value.kind {
            ValueKind::Literal(lit) => format!("{} {}", value.ty, lit),
            ValueKind::Local(id) => match self.locals.get(id.0 as usize) {
                Some(local) => format!("{} %{}", value.ty, local.name),
                None => format!("{} %{}", value.ty, id.0),
            },
            ValueKind::Undefined => format!("{} undefined", value.ty),
        }
    }

    /// Textual form of an instruction, naming locals
    pub fn instruction_to_string(&self, instr: &Instruction) -> String {
        instr.render(&|value| self.value_to_string(value))
    }
}

/// A compilation unit of independent kernels
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Kernels of this module
    pub methods: Vec<Method>,
}

impl Module {
    /// Create a new empty module
    pub fn new() -> Self {
        Self::default()
    }
}
