//! CLI entry point for the LEGv8 assembler and simulator binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use legv8_asm::{AssembledProgram, Assembler};
use legv8_core::{register_name, EngineConfig, EngineState, SimulationEngine, Stage};
#[cfg(test)]
use tempfile as _;
use thiserror as _;

const USAGE_TEXT: &str = "\
Usage: legv8-asm <command> [options]

Commands:
  build <input> [-o <output>] [--verbose]  Assemble source to binary
  run   <input> [--max-steps <n>] [--trace]  Assemble and simulate

Options:
  -o, --output <file>   Output file path (default: input stem + .bin)
  -v, --verbose         Print listing to stderr (build only)
      --max-steps <n>   Step bound for run (default: 10000)
      --trace           Print per-stage trace while running
  -h, --help            Show this help message

Examples:
  legv8-asm build program.legv8
  legv8-asm build program.legv8 -o program.bin
  legv8-asm run program.legv8 --trace
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildArgs),
    Run(RunArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct BuildArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    input: PathBuf,
    max_steps: Option<usize>,
    trace: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "build" => parse_build_args(args)
            .map(Command::Build)
            .map(ParseResult::Command),
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_build_args(mut args: impl Iterator<Item = OsString>) -> Result<BuildArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(BuildArgs {
        input,
        output,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut max_steps: Option<usize> = None;
    let mut trace = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--trace" {
            trace = true;
            continue;
        }

        if arg == "--max-steps" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --max-steps".to_string())?;
            let parsed = value
                .to_string_lossy()
                .parse::<usize>()
                .map_err(|_| format!("invalid --max-steps value: {}", value.to_string_lossy()))?;
            max_steps = Some(parsed);
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(RunArgs {
        input,
        max_steps,
        trace,
    })
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.bin"))
}

fn assemble_file(input: &Path) -> Result<AssembledProgram, i32> {
    let source = match fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", input.display());
            return Err(1);
        }
    };

    let assembler = match Assembler::new() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    match assembler.assemble(&source) {
        Ok(program) => Ok(program),
        Err(failure) => {
            for error in &failure.errors {
                eprintln!("{}: error: {}", input.display(), error);
            }
            Err(1)
        }
    }
}

fn run_build(args: BuildArgs) -> Result<(), i32> {
    let program = assemble_file(&args.input)?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    let mut bytes = Vec::with_capacity(program.words.len() * 4);
    for word in &program.words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }

    if let Err(e) = fs::write(&output_path, &bytes) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    if args.verbose {
        print_listing(&program);
    }

    println!(
        "Assembled {} ({} bytes) -> {}",
        args.input.display(),
        bytes.len(),
        output_path.display()
    );

    Ok(())
}

fn print_listing(program: &AssembledProgram) {
    let control = match SimulationEngine::new(EngineConfig::default()) {
        Ok(engine) => engine.control().clone(),
        Err(_) => return,
    };
    let mut address = program.text_base;
    for word in &program.words {
        let text = control
            .decode(*word)
            .map_or_else(|_| String::from("??"), |inst| inst.disassemble());
        eprintln!("{address:08X}: {word:08X}  {text}");
        address += 4;
    }
}

#[allow(clippy::cast_sign_loss)]
fn run_program(args: &RunArgs) -> Result<(), i32> {
    let program = assemble_file(&args.input)?;

    let config = EngineConfig::default();
    let mut engine = match SimulationEngine::new(config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };
    engine.load_program(&program.words);

    let bound = args.max_steps.unwrap_or(config.max_run_steps);
    let mut retired = 0usize;
    while retired < bound && engine.state() == EngineState::Ready {
        let trace = match engine.step() {
            Ok(t) => t,
            Err(e) => {
                eprintln!("error: {e} (after {retired} steps)");
                return Err(1);
            }
        };
        if args.trace {
            for micro in &trace {
                if micro.transfers.is_empty() {
                    continue;
                }
                let lines: Vec<String> = micro
                    .transfers
                    .iter()
                    .map(|t| format!("{}={:#x}", t.label, t.value))
                    .collect();
                println!("{:?}: {}", micro.stage, lines.join(" "));
                if micro.stage == Stage::UpdatingPc {
                    println!();
                }
            }
        }
        retired += 1;
    }

    if engine.state() == EngineState::Halted {
        println!("Halted after {retired} steps");
    } else {
        println!("Step bound reached after {retired} steps");
    }

    let flags = engine.flags();
    println!(
        "PC = {:#010x}  N={} Z={} C={} V={}",
        engine.pc(),
        u8::from(flags.negative),
        u8::from(flags.zero),
        u8::from(flags.carry),
        u8::from(flags.overflow)
    );
    for (index, value) in engine.registers().snapshot().iter().enumerate() {
        if *value != 0 {
            #[allow(clippy::cast_possible_truncation)]
            let name = register_name(index as u8);
            println!("{name:<4} = {:#018x}", *value as u64);
        }
    }

    Ok(())
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Build(args))) => match run_build(args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Run(args))) => match run_program(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
                1
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
                1
            }
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::{parse_args, parse_build_args, parse_run_args, BuildArgs, ParseResult, RunArgs};
    use std::ffi::OsString;
    use std::path::PathBuf;

    #[test]
    fn parses_build_command() {
        let result = parse_build_args(
            [
                OsString::from("program.legv8"),
                OsString::from("-o"),
                OsString::from("out.bin"),
                OsString::from("--verbose"),
            ]
            .into_iter(),
        )
        .expect("valid build args should parse");

        assert_eq!(
            result,
            BuildArgs {
                input: PathBuf::from("program.legv8"),
                output: Some(PathBuf::from("out.bin")),
                verbose: true,
            }
        );
    }

    #[test]
    fn parses_run_command() {
        let result = parse_run_args(
            [
                OsString::from("program.legv8"),
                OsString::from("--max-steps"),
                OsString::from("50"),
                OsString::from("--trace"),
            ]
            .into_iter(),
        )
        .expect("valid run args should parse");

        assert_eq!(
            result,
            RunArgs {
                input: PathBuf::from("program.legv8"),
                max_steps: Some(50),
                trace: true,
            }
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args([OsString::from("--help")].into_iter())
            .expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args([OsString::from("unknown")].into_iter())
            .expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_bad_step_bound() {
        let error = parse_run_args(
            [
                OsString::from("program.legv8"),
                OsString::from("--max-steps"),
                OsString::from("many"),
            ]
            .into_iter(),
        )
        .expect_err("non-numeric bound should fail");
        assert!(error.contains("invalid --max-steps"));
    }

    #[test]
    fn default_output_path_replaces_extension() {
        let output = super::default_output_path(&PathBuf::from("src/program.legv8"));
        assert_eq!(output, PathBuf::from("src/program.bin"));
    }

    #[test]
    fn parse_build_missing_input() {
        let error = parse_build_args(std::iter::empty()).expect_err("missing input should fail");
        assert!(error.contains("missing input"));
    }
}
