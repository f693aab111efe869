use std::fs;

use clap::Parser;
use inkwell::context::Context;
use miette::{Diagnostic, IntoDiagnostic, NamedSource, WrapErr};
use thiserror::Error;

use taquion::{codegen, parsing};

mod cli;

/// All accumulated parse errors, reported against the source in one shot
#[derive(Debug, Error, Diagnostic)]
#[error("Failed to parse the source code")]
struct ParseFailure {
    #[source_code]
    src: NamedSource<String>,

    #[related]
    errors: Vec<parsing::ParsingError>,
}

fn main() -> miette::Result<()> {
    let args = cli::Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Trace);
    }
    logger.init();

    let source = fs::read_to_string(&args.input_file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot read input file {}", args.input_file.display()))?;
    let input_name = args.input_file.display().to_string();

    let program = parsing::parse(&source).map_err(|errors| ParseFailure {
        src: NamedSource::new(&input_name, source.clone()),
        errors,
    })?;
    log::debug!("parsed {} top-level statements", program.statements.len());

    if args.mode == cli::Mode::Parse {
        program.pretty_print().into_diagnostic()?;
        return Ok(());
    }

    let context = Context::create();
    let module = codegen::compile(&context, &program).map_err(|error| {
        miette::Report::new(error).with_source_code(NamedSource::new(&input_name, source.clone()))
    })?;

    module
        .verify()
        .map_err(|message| miette::miette!("Module verification failed: {message}"))?;

    fs::write(&args.output, module.print_to_string().to_string())
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot write output file {}", args.output.display()))?;

    println!("Wrote LLVM IR to {}", args.output.display());
    Ok(())
}
