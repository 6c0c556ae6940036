use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use fftbench::backends::{create_context, list_devices};
use fftbench::report::sink_for_path;
use fftbench::BenchmarkSuite;
use fftbench_cli::Args;
use log::{error, info};

fn run(args: &Args) -> Result<()> {
    if args.list_devices {
        for device in list_devices(args.backend)? {
            println!("{device}");
        }
        return Ok(());
    }

    let config = args.suite_config()?;
    if args.list_benchmarks {
        for configuration in config.configurations() {
            println!("{configuration}");
        }
        return Ok(());
    }

    let mut context = create_context(args.backend, args.context_options())?;
    let mut sink = sink_for_path(args.output.as_deref())?;
    let outcome = BenchmarkSuite::new(context.as_ref(), config).run(sink.as_mut());
    drop(sink);
    if let Err(e) = context.destroy() {
        error!("context teardown: {e}");
    }
    let summary = outcome?;
    info!(
        "{} configurations: {} ok, {} skipped, {} failed",
        summary.total(),
        summary.ok,
        summary.skipped,
        summary.failed
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fftbench: {e:#}");
            ExitCode::FAILURE
        }
    }
}
