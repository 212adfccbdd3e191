//! Integration tests for the legv8-asm CLI.

use thiserror as _;
use legv8_asm as _;
use legv8_core as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("legv8-asm")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const COUNTDOWN: &str = "\
ADDI X1, XZR, #3
loop: SUBS X1, X1, #1
CBNZ X1, loop
done: B done
";

#[test]
fn build_simple_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "add.legv8", "ADD X1, X2, X3\n");

    let output = temp_dir.path().join("add.bin");

    let status = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run legv8-asm");

    assert!(status.success());
    assert!(output.exists());

    let binary = fs::read(&output).unwrap();
    assert_eq!(binary.len(), 4);
    let word = u32::from_le_bytes([binary[0], binary[1], binary[2], binary[3]]);
    assert_eq!(word, (0x458 << 21) | (3 << 16) | (2 << 5) | 1);
}

#[test]
fn build_with_default_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "prog.legv8", "ADDI X1, XZR, #1\n");

    let expected_output = temp_dir.path().join("prog.bin");

    let status = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .current_dir(temp_dir.path())
        .status()
        .expect("failed to run legv8-asm");

    assert!(status.success());
    assert!(expected_output.exists());
}

#[test]
fn build_reports_errors_on_stderr() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "bad.legv8", "FROB X1, X2\nB nowhere\n");

    let output = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .output()
        .expect("failed to run legv8-asm");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown mnemonic 'FROB'"));
    assert!(stderr.contains("undefined label 'nowhere'"));
}

#[test]
fn build_verbose_prints_listing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "list.legv8", "ADD X1, X2, X3\n");

    let output = Command::new(binary_path())
        .args(["build", source.to_str().unwrap(), "--verbose"])
        .current_dir(temp_dir.path())
        .output()
        .expect("failed to run legv8-asm");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ADD    X1, X2, X3"));
}

#[test]
fn run_reports_halt_and_final_state() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "count.legv8", COUNTDOWN);

    let output = Command::new(binary_path())
        .args(["run", source.to_str().unwrap()])
        .output()
        .expect("failed to run legv8-asm");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    // 1 ADDI + 3 loop iterations of 2 + 1 terminal branch.
    assert!(stdout.contains("Halted after 8 steps"));
    assert!(stdout.contains("Z=1"));
    // X1 counted down to zero, so only SP remains nonzero.
    assert!(stdout.contains("SP"));
    assert!(!stdout.contains("X1"));
}

#[test]
fn run_respects_step_bound() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(
        temp_dir.path(),
        "spin.legv8",
        "loop: ADDI X1, X1, #1\nB loop\n",
    );

    let output = Command::new(binary_path())
        .args(["run", source.to_str().unwrap(), "--max-steps", "6"])
        .output()
        .expect("failed to run legv8-asm");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Step bound reached after 6 steps"));
    // Three full iterations increment X1 three times.
    assert!(stdout.contains("X1   = 0x0000000000000003"));
}

#[test]
fn run_trace_prints_stage_lines() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "one.legv8", "ADDI X1, XZR, #5\nB #0\n");

    let output = Command::new(binary_path())
        .args(["run", source.to_str().unwrap(), "--trace"])
        .output()
        .expect("failed to run legv8-asm");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Fetching"));
    assert!(stdout.contains("UpdatingPc"));
}

#[test]
fn help_flag_prints_usage() {
    let output = Command::new(binary_path())
        .args(["--help"])
        .output()
        .expect("failed to run legv8-asm");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: legv8-asm"));
}
