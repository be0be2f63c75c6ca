//! # Memory Model Integration Tests
//!
//! Pointer provenance, memory access classification and VPM lowering eligibility.

use qpu_ir::compiler::ir::{
    is_derived_from_memory, AddressSpace, DataType, Instruction, LocalId, MemoryInstruction,
    MemoryOperation, Method, MoveOperation, OpCode, Operation, ProvenanceCache, Value,
};
use qpu_ir::compiler::TargetConfig;
use qpu_ir::{CompilationStep, Error};

fn lit(value: i64) -> Value {
    Value::literal(value, DataType::i32())
}

fn mov(output: &Value, source: Value) -> Instruction {
    Instruction::Move(MoveOperation {
        output: output.clone(),
        source,
    })
}

fn op(code: OpCode, output: &Value, lhs: Value, rhs: Value) -> Instruction {
    Instruction::Operation(Operation::binary(code, output.clone(), lhs, rhs))
}

fn id(value: &Value) -> LocalId {
    value.check_local().unwrap()
}

fn read(method: &mut Method, address: &Value) -> MemoryInstruction {
    let dest = method.add_local("val", DataType::i32());
    MemoryInstruction::new(MemoryOperation::Read, dest, address.clone(), lit(1)).unwrap()
}

// =============================================================================
// PROVENANCE
// =============================================================================

#[test]
fn test_offset_chain_is_derived() {
    let mut method = Method::new("k");
    let entry = method.add_block("entry");
    let g = method.add_global("g", DataType::i32().to_array_type(8), false, AddressSpace::Global);
    let p = method.add_local("p", g.ty.clone());
    let q = method.add_local("q", g.ty.clone());
    method.append(entry, mov(&p, g.clone()));
    // offset first, pointer second
    method.append(entry, op(OpCode::Add, &q, lit(4), p.clone()));

    assert!(is_derived_from_memory(&method, id(&q)));
    assert_eq!(method.get_base(id(&q), true), id(&g));
}

#[test]
fn test_self_incremented_pointer_is_derived() {
    let mut method = Method::new("k");
    let entry = method.add_block("entry");
    let body = method.add_block("body");
    let g = method.add_global("g", DataType::i32().to_array_type(8), false, AddressSpace::Global);
    let p = method.add_local("p", g.ty.clone());
    method.append(entry, mov(&p, g.clone()));
    method.append(body, op(OpCode::Add, &p, p.clone(), lit(4)));

    assert!(is_derived_from_memory(&method, id(&p)));
    assert_eq!(method.get_base(id(&p), true), id(&g));
}

#[test]
fn test_pure_cycle_is_not_derived() {
    let mut method = Method::new("k");
    let entry = method.add_block("entry");
    let ty = DataType::pointer_to(DataType::i32(), AddressSpace::Global);
    let a = method.add_local("a", ty.clone());
    let b = method.add_local("b", ty);
    method.append(entry, mov(&a, b.clone()));
    method.append(entry, mov(&b, a.clone()));

    assert!(!is_derived_from_memory(&method, id(&a)));
    assert!(!is_derived_from_memory(&method, id(&b)));
}

#[test]
fn test_poison_propagates_through_chain() {
    let mut method = Method::new("k");
    let entry = method.add_block("entry");
    let g = method.add_global("g", DataType::i32().to_array_type(8), false, AddressSpace::Global);
    let q = method.add_local("q", g.ty.clone());
    let r = method.add_local("r", g.ty.clone());
    let s = method.add_local("s", g.ty.clone());
    method.append(entry, op(OpCode::Mul, &q, g.clone(), lit(2)));
    method.append(entry, op(OpCode::Add, &r, q.clone(), lit(4)));
    method.append(entry, mov(&s, g.clone()));
    method.append(entry, mov(&s, r.clone()));

    assert!(!is_derived_from_memory(&method, id(&q)));
    assert!(!is_derived_from_memory(&method, id(&r)));
    // one good and one poisoned chain
    assert!(!is_derived_from_memory(&method, id(&s)));

    let load = read(&mut method, &s);
    let err = load.get_memory_areas(&method).unwrap_err();
    assert!(matches!(err, Error::Provenance { .. }));
    assert_eq!(err.step(), Some(CompilationStep::Llvm2Ir));
}

#[test]
fn test_loaded_pointer_is_not_derived() {
    let mut method = Method::new("k");
    let entry = method.add_block("entry");
    let ptr_ty = DataType::pointer_to(DataType::i32(), AddressSpace::Global);
    let table = method.add_global("table", ptr_ty.clone(), true, AddressSpace::Constant);
    let p = method.add_local("p", ptr_ty);
    let load = MemoryInstruction::new(MemoryOperation::Read, p.clone(), table, lit(1)).unwrap();
    method.append(entry, Instruction::Memory(load));

    assert!(!is_derived_from_memory(&method, id(&p)));
}

#[test]
fn test_provenance_cache_follows_generation() {
    let mut method = Method::new("k");
    let entry = method.add_block("entry");
    let g = method.add_global("g", DataType::i32(), false, AddressSpace::Global);
    let p = method.add_local("p", g.ty.clone());

    let mut cache = ProvenanceCache::new();
    assert!(!cache.is_derived_from_memory(&method, id(&p)));
    assert_eq!(cache.len(), 1);

    method.append(entry, mov(&p, g));
    assert!(cache.is_derived_from_memory(&method, id(&p)));
    assert_eq!(cache.len(), 1);
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

#[test]
fn test_entry_count_invariant() {
    let mut method = Method::new("k");
    let g = method.add_global("g", DataType::i32().to_array_type(8), false, AddressSpace::Global);
    let s = method.add_stack_allocation("s", DataType::i32().to_array_type(8), 4);
    let v = method.add_local("v", DataType::i32());

    assert!(MemoryInstruction::new(MemoryOperation::Copy, s.clone(), g.clone(), lit(5)).is_ok());
    assert!(MemoryInstruction::new(MemoryOperation::Fill, s.clone(), v.clone(), lit(5)).is_ok());
    let err = MemoryInstruction::new(MemoryOperation::Read, v.clone(), g.clone(), lit(5)).unwrap_err();
    assert!(matches!(err, Error::InvariantViolation { step: CompilationStep::Llvm2Ir, .. }));
    assert!(MemoryInstruction::new(MemoryOperation::Write, g, v, lit(5)).is_err());
}

#[test]
fn test_copy_classification() {
    let mut method = Method::new("k");
    let g = method.add_global("g", DataType::i32().to_array_type(8), true, AddressSpace::Constant);
    let s = method.add_stack_allocation("s", DataType::i32().to_array_type(8), 4);
    let copy = MemoryInstruction::new(MemoryOperation::Copy, s.clone(), g.clone(), lit(8)).unwrap();

    let areas = copy.get_memory_areas(&method).unwrap();
    assert_eq!(areas.len(), 2);
    assert!(areas.contains(&id(&g)) && areas.contains(&id(&s)));
    assert!(copy.accesses_constant_global(&method).unwrap());
    assert!(copy.accesses_stack_allocation(&method).unwrap());
    assert!(!copy.accesses_local_memory(&method).unwrap());

    let sized = copy.get_source_element_type(&method, true).unwrap();
    assert_eq!(sized, DataType::i32().to_array_type(8).to_array_type(8));
    assert_eq!(
        copy.get_destination_element_type(&method, false).unwrap(),
        DataType::i32().to_array_type(8)
    );
    assert_eq!(
        copy.to_string_in(&method),
        "copy i32 8 entries from (__constant) i32[8]* %g into (__private) i32[8]* %s"
    );
}

// =============================================================================
// VPM ELIGIBILITY
// =============================================================================

#[test]
fn test_constant_global_fits_or_exceeds_vpm() {
    let config = TargetConfig::default();
    let mut method = Method::new("k");
    let small = method.add_global("small", DataType::i32().to_array_type(16), true, AddressSpace::Constant);
    let large = method.add_global("large", DataType::i32().to_array_type(128), true, AddressSpace::Constant);

    // 16 rows of 64 bytes
    let load = read(&mut method, &small);
    assert!(load.can_move_source_into_vpm(&method, &config).unwrap());
    // 128 rows exceed 4096 bytes
    let load = read(&mut method, &large);
    assert!(!load.can_move_source_into_vpm(&method, &config).unwrap());
}

#[test]
fn test_mutable_global_is_never_eligible() {
    let config = TargetConfig::default();
    let mut method = Method::new("k");
    let g = method.add_global("g", DataType::i32(), false, AddressSpace::Global);
    let load = read(&mut method, &g);
    assert!(!load.can_move_source_into_vpm(&method, &config).unwrap());
}

#[test]
fn test_stack_eligibility_scales_with_qpus() {
    let mut method = Method::new("k");
    // 4 rows of 64 bytes per work-item
    let s = method.add_stack_allocation("s", DataType::i32().to_array_type(4), 4);
    let load = read(&mut method, &s);

    let mut config = TargetConfig::default();
    assert!(load.can_move_source_into_vpm(&method, &config).unwrap());
    config.num_qpus = 16;
    assert!(load.can_move_source_into_vpm(&method, &config).unwrap());
    config.num_qpus = 17;
    assert!(!load.can_move_source_into_vpm(&method, &config).unwrap());
}

#[test]
fn test_eligibility_checks_entry_count_and_provenance() {
    let config = TargetConfig::default();
    let mut method = Method::new("k");
    let p = method.add_local("p", DataType::pointer_to(DataType::i32(), AddressSpace::Global));
    let load = read(&mut method, &p);
    assert!(matches!(
        load.can_move_source_into_vpm(&method, &config),
        Err(Error::Provenance { .. })
    ));
}
