mod app;

use std::{env, process::ExitCode};

use crate::app::Invocation;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let cli = match app::parse(env::args().skip(1))? {
        Invocation::Patch(cli) => cli,
        Invocation::Help => {
            eprintln!("{}", app::help_text());
            return Ok(ExitCode::FAILURE);
        }
        Invocation::Usage(err) => {
            eprintln!("{err}");
            eprintln!("{}", app::help_text());
            return Ok(ExitCode::FAILURE);
        }
    };

    // modinit info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("modinit", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    println!(
        "modinit v{}.{}",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    );

    modinit::patch(&cli.patch_options())?;

    println!(
        "Module Initializer successfully injected in assembly {}",
        cli.image.display()
    );
    Ok(ExitCode::SUCCESS)
}
