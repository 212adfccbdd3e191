//! End-to-end scenarios: assemble source, load it, and step the engine.

use thiserror as _;
use tempfile as _;

use legv8_asm::Assembler;
use legv8_core::{
    AccessSize, EngineConfig, EngineState, RunOutcome, SimulationEngine, Stage, SP, XZR,
};

fn load(source: &str) -> SimulationEngine {
    let program = Assembler::new()
        .expect("builtin table must build")
        .assemble(source)
        .expect("program assembles");
    let mut engine =
        SimulationEngine::new(EngineConfig::default()).expect("builtin table must build");
    engine.load_program(&program.words);
    engine
}

#[test]
fn arithmetic_compare_branch_store_scenario() {
    let mut engine = load(
        "\
        ADDI X1, XZR, #10\n\
        ADDI X2, XZR, #20\n\
        ADD X3, X1, X2\n\
        SUBS XZR, X3, #30\n\
        B.EQ store\n\
        ADDI X4, XZR, #1\n\
        store: STUR X3, [SP, #0]\n\
        done: B done\n",
    );
    let outcome = engine.run_to_halt().expect("program runs clean");
    // ADDI, ADDI, ADD, SUBS, B.EQ, STUR, then the terminal branch.
    assert_eq!(outcome, RunOutcome::Halted { steps: 7 });
    assert_eq!(engine.registers().read(3), 30);
    // The taken branch skipped the X4 write.
    assert_eq!(engine.registers().read(4), 0);
    assert!(engine.flags().zero);
    assert!(engine.flags().carry);
    let sp = engine.config().stack_top;
    assert_eq!(engine.memory().read(sp, AccessSize::Double), Ok(30));
}

#[test]
fn logical_shift_right_by_zero_is_identity() {
    let mut engine = load(
        "\
        MOVZ X1, #0xF0F0\n\
        LSR X2, X1, #0\n\
        LSR X3, X1, #4\n\
        done: B done\n",
    );
    engine.run_to_halt().expect("program runs clean");
    assert_eq!(engine.registers().read(2), 0xF0F0);
    assert_eq!(engine.registers().read(3), 0xF0F);
    // Shifts never commit flags.
    assert!(!engine.flags().carry);
    assert!(!engine.flags().zero);
}

#[test]
fn wide_move_then_keep_merges_lanes() {
    let mut engine = load(
        "\
        MOVZ X9, #0x1234, LSL #48\n\
        MOVK X9, #0x5678, LSL #16\n\
        done: B done\n",
    );
    engine.run_to_halt().expect("program runs clean");
    #[allow(clippy::cast_possible_wrap)]
    let expected = 0x1234_0000_5678_0000u64 as i64;
    assert_eq!(engine.registers().read(9), expected);
}

#[test]
fn call_and_return_through_the_link_register() {
    let mut engine = load(
        "\
        BL func\n\
        done: B done\n\
        func: ADDI X1, XZR, #7\n\
        BR LR\n",
    );
    let outcome = engine.run_to_halt().expect("program runs clean");
    assert_eq!(outcome, RunOutcome::Halted { steps: 4 });
    assert_eq!(engine.registers().read(1), 7);
    assert_eq!(
        engine.registers().read(30),
        i64::try_from(engine.config().text_base + 4).expect("fits")
    );
}

#[test]
fn countdown_loop_retires_the_expected_step_count() {
    let mut engine = load(
        "\
        ADDI X1, XZR, #3\n\
        loop: SUBS X1, X1, #1\n\
        CBNZ X1, loop\n\
        done: B done\n",
    );
    let outcome = engine.run_to_halt().expect("program runs clean");
    // 1 setup + 3 iterations of 2 + 1 terminal branch.
    assert_eq!(outcome, RunOutcome::Halted { steps: 8 });
    assert_eq!(engine.registers().read(1), 0);
    assert!(engine.flags().zero);
}

#[test]
fn zero_register_writes_are_discarded_end_to_end() {
    let mut engine = load(
        "\
        ADDI XZR, XZR, #5\n\
        ADD X1, XZR, XZR\n\
        done: B done\n",
    );
    engine.run_to_halt().expect("program runs clean");
    assert_eq!(engine.registers().read(XZR), 0);
    assert_eq!(engine.registers().read(1), 0);
}

#[test]
fn store_below_the_floor_halts_with_an_error() {
    let mut engine = load(
        "\
        STUR X1, [XZR, #0]\n\
        done: B done\n",
    );
    let err = engine.run_to_halt().unwrap_err();
    assert_eq!(err.class(), legv8_core::ErrorClass::Memory);
    assert_eq!(engine.state(), EngineState::Halted);
}

#[test]
fn signed_narrow_load_extends_through_the_datapath() {
    let mut engine = load(
        "\
        SUBI X1, XZR, #1\n\
        STUR X1, [SP, #-16]\n\
        LDURSW X2, [SP, #-16]\n\
        LDURB X3, [SP, #-16]\n\
        done: B done\n",
    );
    engine.run_to_halt().expect("program runs clean");
    assert_eq!(engine.registers().read(2), -1);
    assert_eq!(engine.registers().read(3), 0xFF);
}

#[test]
fn traces_carry_snapshots_through_every_stage() {
    let mut engine = load("ADDI X1, XZR, #5\ndone: B done\n");
    let trace = engine.step().expect("step succeeds");
    assert_eq!(trace.len(), 6);
    assert_eq!(trace[0].stage, Stage::Fetching);
    // The write lands between the write-back and PC-update snapshots.
    assert_eq!(trace[3].snapshot.registers[1], 0);
    assert_eq!(trace[4].snapshot.registers[1], 5);
    assert_eq!(trace[4].snapshot.pc, engine.config().text_base);
    assert_eq!(
        trace[5].snapshot.pc,
        engine.config().text_base + 4
    );
    // SP was seeded at reset and appears in every snapshot.
    for micro in &trace {
        assert_eq!(
            micro.snapshot.registers[usize::from(SP)],
            0x7FFF_FF00
        );
    }
}
