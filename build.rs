use std::error::Error;
use std::path::PathBuf;
use std::{env, fs};

const CONFIG_STEM: &str = "topscores";

/// Places `topscores.<profile>.toml` next to the built binary as `topscores.toml`.
fn main() -> Result<(), Box<dyn Error>> {
    let profile = env::var("PROFILE")?;
    let source = PathBuf::from(format!("{CONFIG_STEM}.{profile}.toml"));
    println!("cargo:rerun-if-changed={}", source.display());

    // OUT_DIR is target/<profile>/build/<package>-<hash>/out
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let binary_dir = out_dir
        .ancestors()
        .nth(3)
        .ok_or_else(|| format!("unexpected OUT_DIR layout: {}", out_dir.display()))?;
    fs::create_dir_all(binary_dir)?;

    let target = binary_dir.join(format!("{CONFIG_STEM}.toml"));
    fs::copy(&source, &target).map_err(|e| {
        format!("failed to copy {} to {}: {e}", source.display(), target.display())
    })?;
    Ok(())
}
