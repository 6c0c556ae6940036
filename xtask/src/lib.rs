use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Result};

/// Options derived from the host machine used to configure cargo commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub features: Vec<String>,
    /// CUDA toolkit root, when one was found.
    pub cuda_root: Option<PathBuf>,
}

impl BuildConfig {
    /// Join features into a single string suitable for passing to cargo.
    pub fn features_arg(&self) -> Option<String> {
        if self.features.is_empty() {
            None
        } else {
            Some(self.features.join(" "))
        }
    }

    fn apply(&self, cmd: &mut Command) {
        if let Some(f) = self.features_arg() {
            cmd.arg("--features").arg(f);
        }
        if let Some(root) = &self.cuda_root {
            cmd.env("CUDA_PATH", root);
        }
    }
}

/// Detect build configuration from the current machine.
pub fn detect_config() -> BuildConfig {
    let extra = env::var("FFTBENCH_FEATURES").unwrap_or_default();
    compute_config(detect_cuda_root(), &extra)
}

/// `CUDA_PATH`, `CUDA_HOME`, then the default install prefix. A root counts
/// only when it ships the cuFFT library.
pub fn detect_cuda_root() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = ["CUDA_PATH", "CUDA_HOME"]
        .iter()
        .filter_map(|k| env::var_os(k))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .collect();
    candidates.push(PathBuf::from("/usr/local/cuda"));
    candidates.into_iter().find(|root| has_cufft(root))
}

fn has_cufft(root: &Path) -> bool {
    ["lib64", "lib/x64", "lib"].iter().any(|lib| {
        let dir = root.join(lib);
        dir.join("libcufft.so").exists() || dir.join("cufft.lib").exists()
    })
}

/// Compute a [`BuildConfig`] from supplied inputs. This is separated for testing.
pub fn compute_config(cuda_root: Option<PathBuf>, extra: &str) -> BuildConfig {
    let mut features = Vec::new();
    if cuda_root.is_some() {
        features.push("cuda".to_string());
    }
    for feat in extra.split_whitespace() {
        if !features.iter().any(|f| f == feat) {
            features.push(feat.to_string());
        }
    }
    BuildConfig {
        features,
        cuda_root,
    }
}

fn cargo(args: &[&str]) -> Command {
    let mut cmd = Command::new(env::var("CARGO").unwrap_or_else(|_| "cargo".into()));
    cmd.args(args);
    cmd
}

pub fn build_command(cfg: &BuildConfig) -> Command {
    let mut cmd = cargo(&["build", "--workspace"]);
    cfg.apply(&mut cmd);
    cmd
}

pub fn test_command(cfg: &BuildConfig) -> Command {
    let mut cmd = cargo(&["test", "--workspace"]);
    cfg.apply(&mut cmd);
    cmd
}

pub fn clippy_command() -> Command {
    cargo(&["clippy", "--workspace", "--all-targets"])
}

pub fn fmt_command() -> Command {
    cargo(&["fmt", "--all"])
}

pub fn bench_command(cfg: &BuildConfig) -> Command {
    let mut cmd = cargo(&["bench", "-p", "fftbench-bench"]);
    cfg.apply(&mut cmd);
    cmd
}

/// Runs the `fftbench` binary in release mode with `args` passed through.
pub fn suite_command(cfg: &BuildConfig, args: &[String]) -> Command {
    let mut cmd = cargo(&["run", "--release", "-p", "fftbench-cli"]);
    cfg.apply(&mut cmd);
    cmd.arg("--").args(args);
    cmd
}

/// Runs `cmd` and turns a non-zero exit into an error.
pub fn run(mut cmd: Command) -> Result<()> {
    let status = cmd.status()?;
    if !status.success() {
        bail!("{:?} exited with {status}", cmd.get_program());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn cuda_toolkit_enables_feature() {
        let cfg = compute_config(Some(PathBuf::from("/opt/cuda")), "sqlite-report cuda");
        assert_eq!(cfg.features, vec!["cuda", "sqlite-report"]);
        let cmd = build_command(&cfg);
        assert!(args(&cmd).contains(&"cuda sqlite-report".to_string()));
        assert!(cmd
            .get_envs()
            .any(|(k, v)| k == "CUDA_PATH" && v == Some("/opt/cuda".as_ref())));
    }

    #[test]
    fn no_toolkit_no_features() {
        let cfg = compute_config(None, "");
        assert!(cfg.features_arg().is_none());
        let cmd = test_command(&cfg);
        assert!(!args(&cmd).contains(&"--features".to_string()));
        assert_eq!(cmd.get_envs().count(), 0);
    }

    #[test]
    fn suite_passes_arguments_through() {
        let cfg = compute_config(None, "");
        let cmd = suite_command(&cfg, &["-e".into(), "1024".into()]);
        let a = args(&cmd);
        let sep = a.iter().position(|x| x == "--").unwrap();
        assert!(a[..sep].contains(&"fftbench-cli".to_string()));
        assert_eq!(&a[sep + 1..], ["-e", "1024"]);
    }

    #[test]
    fn other_commands() {
        let cfg = compute_config(None, "");
        assert!(clippy_command().get_args().any(|a| a == "clippy"));
        assert!(fmt_command().get_args().any(|a| a == "fmt"));
        assert!(args(&bench_command(&cfg)).contains(&"fftbench-bench".to_string()));
    }

    #[test]
    fn missing_root_has_no_cufft() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_cufft(dir.path()));
        std::fs::create_dir_all(dir.path().join("lib64")).unwrap();
        std::fs::write(dir.path().join("lib64").join("libcufft.so"), b"").unwrap();
        assert!(has_cufft(dir.path()));
    }
}
