//! Argument handling for the `fftbench` binary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use fftbench::backends::{Backend, ContextOptions};
use fftbench::{CapacityLimits, Extent, Placement, Precision, SuiteConfig, TransformKind};

/// Phase-level FFT benchmarks over a grid of transform configurations.
#[derive(Parser, Debug)]
#[command(name = "fftbench", author, version, about)]
pub struct Args {
    /// Transform extents such as `1024`, `32x32` or `16x16x16`
    #[arg(short, long = "extent", num_args = 1..)]
    pub extents: Vec<Extent>,

    /// File with one extent per line; `#` starts a comment
    #[arg(short = 'f', long)]
    pub extents_file: Option<PathBuf>,

    /// JSON suite configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, default_value = "host")]
    pub backend: Backend,

    /// Device ordinal
    #[arg(short, long, default_value_t = 0)]
    pub device: usize,

    /// Report file (.csv, .jsonl, .db); CSV on stdout when absent
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long)]
    pub runs: Option<usize>,

    #[arg(short, long)]
    pub warmups: Option<usize>,

    /// Comma separated: real, complex
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<TransformKind>,

    /// Comma separated: inplace, outplace
    #[arg(long, value_delimiter = ',')]
    pub placements: Vec<Placement>,

    /// Comma separated: float, double, half
    #[arg(long, value_delimiter = ',')]
    pub precisions: Vec<Precision>,

    /// Skip the round-trip error check
    #[arg(long)]
    pub no_validate: bool,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Scale inverse transforms by 1/n (host backend only)
    #[arg(long)]
    pub scaling: bool,

    /// Print the devices of the selected backend and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Print the configurations that would run and exit
    #[arg(long)]
    pub list_benchmarks: bool,

    /// More log output; repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Default log filter for the `-v` count; `RUST_LOG` still wins.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            device: self.device,
            normalize: self.scaling,
        }
    }

    /// Merges the config file, the extents file and the flags.
    ///
    /// Flags override the file. Extents from every source are concatenated.
    pub fn suite_config(&self) -> Result<SuiteConfig> {
        let mut config = match &self.config {
            Some(path) => SuiteConfig::from_path(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => SuiteConfig {
                limits: CapacityLimits::from_env()?,
                ..SuiteConfig::default()
            },
        };
        if let Some(path) = &self.extents_file {
            config.extents.extend(read_extents_file(path)?);
        }
        config.extents.extend(self.extents.iter().cloned());
        if !self.kinds.is_empty() {
            config.kinds = self.kinds.clone();
        }
        if !self.placements.is_empty() {
            config.placements = self.placements.clone();
        }
        if !self.precisions.is_empty() {
            config.precisions = self.precisions.clone();
        }
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if let Some(warmups) = self.warmups {
            config.warmups = warmups;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.no_validate {
            config.validate = false;
        }
        if config.extents.is_empty() {
            bail!("no extents given; use --extent, --extents-file or --config");
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn read_extents_file(path: &Path) -> Result<Vec<Extent>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_extents(&text).with_context(|| format!("parsing {}", path.display()))
}

/// One extent per line. Blank lines and `#` comments are ignored.
pub fn parse_extents(text: &str) -> Result<Vec<Extent>> {
    let mut out = Vec::new();
    for (no, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let extent = line
            .parse::<Extent>()
            .with_context(|| format!("line {}", no + 1))?;
        out.push(extent);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_file_skips_comments() {
        let text = "# sizes\n1024\n\n32x32   # square\n 16,16,16\n";
        let extents = parse_extents(text).unwrap();
        let dims: Vec<Vec<usize>> = extents.iter().map(|e| e.dims().to_vec()).collect();
        assert_eq!(dims, vec![vec![1024], vec![32, 32], vec![16, 16, 16]]);
    }

    #[test]
    fn bad_line_is_reported_with_its_number() {
        let err = parse_extents("64\n0x4\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "fftbench",
            "-e",
            "64",
            "8x8",
            "--kinds",
            "complex",
            "--precisions",
            "float,double",
            "-r",
            "3",
            "--no-validate",
        ])
        .unwrap();
        let c = args.suite_config().unwrap();
        assert_eq!(c.extents.len(), 2);
        assert_eq!(c.kinds, vec![TransformKind::ComplexToComplex]);
        assert_eq!(c.precisions, vec![Precision::Single, Precision::Double]);
        assert_eq!(c.placements, Placement::ALL.to_vec());
        assert_eq!(c.runs, 3);
        assert!(!c.validate);
    }

    #[test]
    fn verbosity_maps_to_filter() {
        let args = Args::try_parse_from(["fftbench", "-vv"]).unwrap();
        assert_eq!(args.log_level(), "debug");
        assert!(args.suite_config().is_err());
    }

    #[test]
    fn scaling_flag_reaches_context_options() {
        let plain = Args::try_parse_from(["fftbench", "-d", "1"]).unwrap();
        assert!(!plain.context_options().normalize);
        assert_eq!(plain.context_options().device, 1);
        let scaled = Args::try_parse_from(["fftbench", "--scaling"]).unwrap();
        assert!(scaled.context_options().normalize);
    }

    #[test]
    fn unknown_backend_is_a_usage_error() {
        assert!(Args::try_parse_from(["fftbench", "-b", "opencl"]).is_err());
    }
}
