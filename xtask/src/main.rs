use anyhow::Result;
use clap::{Parser, Subcommand};
#[cfg(not(test))]
use xtask::*;

#[derive(Parser)]
#[command(author, version, about = "Development tasks for fftbench")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Build,
    Test,
    Clippy,
    Fmt,
    /// fmt, then clippy
    Analyze,
    /// criterion benches of fftbench-bench
    Bench,
    /// Run the benchmark suite; arguments go to `fftbench`
    Suite {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[cfg(not(test))]
fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = detect_config();
    if let Some(root) = &cfg.cuda_root {
        eprintln!("xtask: CUDA toolkit at {}", root.display());
    }

    match cli.command {
        Commands::Build => run(build_command(&cfg)),
        Commands::Test => run(test_command(&cfg)),
        Commands::Clippy => run(clippy_command()),
        Commands::Fmt => run(fmt_command()),
        Commands::Analyze => {
            run(fmt_command())?;
            run(clippy_command())
        }
        Commands::Bench => run(bench_command(&cfg)),
        Commands::Suite { args } => run(suite_command(&cfg, &args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_suite_arguments() {
        let cli = Cli::parse_from(["xtask", "suite", "-e", "32x32", "--no-validate"]);
        match cli.command {
            Commands::Suite { args } => assert_eq!(args, ["-e", "32x32", "--no-validate"]),
            _ => panic!("parsed wrong command"),
        }
    }
}
