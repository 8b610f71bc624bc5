//! Encoder verification driver.
//!
//! Runs the static table check (every encoder call against its
//! recorded word), then optionally assembles each canonical text form
//! with a system assembler and compares the assembled words against
//! the encoder output. Exits non-zero on any mismatch.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use fasterbasic::verify::{self, ToolConfig};

#[derive(Parser, Debug)]
#[command(name = "fb-verify", about = "Verify AArch64 encodings against a system assembler")]
struct Args {
    /// Skip the external assembler pass; only run the static table.
    #[arg(long)]
    static_only: bool,

    /// Assembler command (anything accepting `<args> in.s -o out.o`).
    #[arg(long, default_value = "clang")]
    assembler: String,

    /// Extra arguments for the assembler.
    #[arg(long, default_value = "-c,-x,assembler", value_delimiter = ',')]
    assembler_args: Vec<String>,

    /// Disassembler/dumper command; its listing must carry one 8-digit
    /// hex instruction word per line.
    #[arg(long, default_value = "objdump")]
    dumper: String,

    /// Extra arguments for the dumper.
    #[arg(long, default_value = "-d", value_delimiter = ',')]
    dumper_args: Vec<String>,

    /// Scratch directory for intermediate files.
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let cases = verify::build_cases();
    println!("verification table: {} cases", cases.len());

    let mut failed = false;

    let static_mismatches = verify::check_static(&cases);
    if static_mismatches.is_empty() {
        println!("static check: ok");
    } else {
        failed = true;
        println!("static check: {} mismatches", static_mismatches.len());
        for m in &static_mismatches {
            println!(
                "  [{}] {}: expected {:#010x}, encoder produced {:#010x}",
                m.index, m.text, m.expected, m.actual
            );
        }
    }

    if !args.static_only {
        let config = ToolConfig {
            assembler: args.assembler,
            assembler_args: args.assembler_args,
            dumper: args.dumper,
            dumper_args: args.dumper_args,
            scratch_dir: args.scratch_dir.unwrap_or_else(std::env::temp_dir),
        };
        let mismatches = verify::check_assembler(&cases, &config)
            .context("assembler round-trip failed to run")?;
        if mismatches.is_empty() {
            println!("assembler round-trip: ok");
        } else {
            failed = true;
            println!("assembler round-trip: {} mismatches", mismatches.len());
            for m in &mismatches {
                println!(
                    "  [{}] {}: assembler produced {:#010x}, encoder produced {:#010x}",
                    m.index, m.text, m.expected, m.actual
                );
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
