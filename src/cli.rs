use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(version, about = "The Taquion compiler", long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Source code input file
    pub input_file: PathBuf,

    /// Where to write the textual LLVM IR
    #[arg(short, long)]
    #[arg(default_value = "output.ll")]
    pub output: PathBuf,

    /// Execution mode
    #[arg(value_enum)]
    #[arg(short, long)]
    #[arg(default_value_t = Mode::Compile)]
    pub mode: Mode,

    /// Trace every pipeline stage to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Compile the source code to LLVM IR
    Compile,

    /// Inspect the AST of the parsed source code
    Parse,
}
