//! `mutagraph init`: write a starter fixture.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::GraphFixture;

/// Write the template fixture to `path`, named after the file stem.
pub fn run(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("app");
    fs::write(path, GraphFixture::template(name))
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created fixture {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.toml");
        run(&path).unwrap();

        let fixture = GraphFixture::load(&path).unwrap();
        assert!(fixture.units.iter().any(|u| u.name == "camera-host"));
        assert!(run(&path).is_err());
    }
}
