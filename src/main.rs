use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
    process::ExitCode,
};

use anyhow::{Context, Error};
use clap::Parser;
use log::error;

use butane::{cli::Cli, translate_bytes, TranslateError};
use butane_api::Report;

fn read_input(input: Option<&Path>) -> Result<Vec<u8>, Error> {
    match input {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read config '{}'", path.display()))
        }
        None => {
            let mut data = Vec::new();
            io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read config from stdin")?;
            Ok(data)
        }
    }
}

fn write_output(output: Option<&Path>, data: &[u8]) -> Result<(), Error> {
    let mut data = data.to_vec();
    data.push(b'\n');
    match output {
        Some(path) => fs::write(path, &data)
            .with_context(|| format!("Failed to write output '{}'", path.display())),
        None => io::stdout()
            .write_all(&data)
            .context("Failed to write output to stdout"),
    }
}

fn print_report(report: &Report) {
    eprint!("{report}");
}

fn run(args: &Cli) -> Result<ExitCode, Error> {
    let input = read_input(args.input.as_deref())?;
    let options = args.translate_options()?;

    let translated = match translate_bytes(&input, &options) {
        Ok(translated) => translated,
        Err(failure) => {
            print_report(&failure.report);
            return match failure.error {
                TranslateError::Internal(e) => Err(e),
                e => {
                    error!("Error translating config: {e}");
                    Ok(ExitCode::from(1))
                }
            };
        }
    };

    print_report(&translated.report);
    if args.strict && translated.report.has_warnings() {
        error!("Config produced warnings and --strict was specified");
        return Ok(ExitCode::from(1));
    }
    write_output(args.output.as_deref(), &translated.output)?;
    Ok(ExitCode::SUCCESS)
}

fn setup_logging(args: &Cli) -> Result<(), Error> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(args.verbosity)
        .try_init()
        .context("Logger already registered")
}

fn main() -> ExitCode {
    // Parse args
    let args = Cli::parse();

    // Initialize the logger
    if let Err(e) = setup_logging(&args) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(2);
    }

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("Butane failed: {e:?}");
            ExitCode::from(2)
        }
    }
}
