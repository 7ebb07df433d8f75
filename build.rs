use std::env;
use std::path::PathBuf;

use anyhow::Result;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;

/// Ship the asset directory (the glTF model and its textures) next to the
/// build output so the viewer finds it without extra setup.
fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=assets");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets = manifest_dir.join("assets");
    if !assets.exists() {
        // Nothing to ship; the viewer reports the missing model at runtime.
        return Ok(());
    }

    let out_dir = env::var("OUT_DIR")?;
    let options = CopyOptions::new().overwrite(true);
    copy_items(&[assets], out_dir, &options)?;

    Ok(())
}
