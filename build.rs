use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use fs_extra::dir::{CopyOptions, copy};

/// Mirrors `assets/` (skybox faces, sphere textures, the model) into `OUT_DIR`.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets = manifest_dir.join("assets");
    if !assets.is_dir() {
        println!("cargo:warning=no assets/ directory, the scene will start without textures and model");
        return Ok(());
    }

    let out_dir = env::var("OUT_DIR")?;
    let options = CopyOptions {
        overwrite: true,
        ..CopyOptions::new()
    };
    copy(&assets, &out_dir, &options).with_context(|| format!("copying {} to {out_dir}", assets.display()))?;
    Ok(())
}
