//! heft - explains where the size and code weight of an executable comes from
//!
//! Usage:
//!   heft <binary>             Analyze and print the reports
//!   heft <binary> <symbol>    Additionally trace everything involving <symbol>
//!
//! The pipeline is strictly sequential: symbols, call edges, and segment
//! mappings are parsed out of binutils output into the program model, the
//! vtable scanner synthesizes edges from raw data bytes, and then the
//! dominator-based weight analysis and the reports run over the frozen
//! graph.

mod nm;
mod objdump;
mod pipe;
mod readelf;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use heft_analysis::{
    analyze_weights, collect_garbage, FileReport, SizeReport, VtableScanner, WeightDotExporter,
    WeightReport,
};
use heft_core::{Demangler, Program, ProgramSink};
use heft_demangle::{BestEffortDemangler, CxxFiltDemangler};

#[derive(Parser)]
#[command(name = "heft")]
#[command(about = "Explains where the size and code weight of an executable comes from", long_about = None)]
struct Cli {
    /// Path to the binary file
    binary: PathBuf,

    /// Trace every add, scan step, and edge insertion involving this symbol
    trace: Option<String>,

    /// Number of rows in the transitive weight report
    #[arg(long, default_value_t = 40)]
    top_n: usize,

    /// Pointer size in bytes for the vtable scan
    #[arg(long, default_value_t = 8)]
    pointer_size: usize,

    /// Where to write the weight graph
    #[arg(long, default_value = "graph.dot")]
    dot_out: PathBuf,

    /// Skip the disassembly pass (vtable edges only)
    #[arg(long)]
    skip_disassembly: bool,

    /// Demangle through a c++filt child process instead of in-process
    #[arg(long)]
    cxxfilt: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let demangler = make_demangler(cli.cxxfilt)?;
    let mut program = Program::new(demangler);
    if let Some(name) = &cli.trace {
        program = program.with_trace(name);
    }

    {
        let mut sink = ProgramSink::new(&mut program);
        readelf::parse_symbols(&cli.binary, &mut sink)?;
        if !cli.skip_disassembly {
            objdump::parse_call_edges(&cli.binary, &mut sink)?;
        }
        readelf::parse_file_mappings(&cli.binary, &mut sink)?;
        let entry_addr = readelf::parse_entry_point(&cli.binary, &mut sink)?;
        nm::parse_source_files(&cli.binary, &mut sink)?;

        if sink.find_object_by_addr(entry_addr).is_none() {
            eprintln!("warning: no symbol covers the entry point {:#x}", entry_addr);
        }
    }

    let mut scanner = VtableScanner::new(cli.pointer_size);
    if let Some(name) = &cli.trace {
        scanner = scanner.with_trace(name);
    }
    let mut binary = File::open(&cli.binary)
        .with_context(|| format!("failed to open {}", cli.binary.display()))?;
    scanner
        .scan(&mut binary, &mut program)
        .context("vtable scan failed")?;

    if !program.has_files() {
        eprintln!("warning: no debug information present");
    }

    let garbage = collect_garbage(&program, cli.trace.as_deref())?;
    garbage.write_summary(std::io::stderr())?;

    println!("Symbols by size:");
    SizeReport::new().export_to_stdout(&program)?;

    if program.has_files() {
        println!();
        println!("Files by weight:");
        FileReport::new().export_to_stdout(&program)?;
    }

    analyze_weights(&mut program)?;

    println!();
    println!("Symbols by transitive weight:");
    WeightReport::new()
        .with_top_n(cli.top_n)
        .export_to_stdout(&program)?;

    let dot = File::create(&cli.dot_out)
        .with_context(|| format!("failed to create {}", cli.dot_out.display()))?;
    WeightDotExporter::new().export(&program, dot)?;

    Ok(())
}

fn make_demangler(cxxfilt: bool) -> Result<Box<dyn Demangler>> {
    if cxxfilt {
        let demangler = CxxFiltDemangler::spawn().context("failed to start c++filt")?;
        Ok(Box::new(demangler))
    } else {
        Ok(Box::new(BestEffortDemangler::new()))
    }
}
