use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CUDA_PATH");
    println!("cargo:rerun-if-env-changed=CUDA_HOME");

    if env::var_os("CARGO_FEATURE_CUDA").is_none() {
        return;
    }

    // cufft is linked directly; cudarc loads the driver on its own
    let mut roots: Vec<PathBuf> = ["CUDA_PATH", "CUDA_HOME"]
        .iter()
        .filter_map(|k| env::var_os(k).map(PathBuf::from))
        .collect();
    roots.push(PathBuf::from("/usr/local/cuda"));

    for root in roots {
        for lib in ["lib64", "lib/x64", "lib"] {
            let dir = root.join(lib);
            if dir.is_dir() {
                println!("cargo:rustc-link-search=native={}", dir.display());
            }
        }
    }
}
