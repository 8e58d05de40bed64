//! Listing names under `unclaimed/`.

use std::path::Path;

use crate::{PoolError, PoolResult};

/// Names of entries directly under `dir`, skipping dotfiles (`.gitkeep` and the like).
pub fn list_names(dir: &Path) -> PoolResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(PoolError::Io)? {
        let entry = entry.map_err(PoolError::Io)?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        names.push(name.to_string());
    }
    names.sort();
    Ok(names)
}
