//! Writing documents and layer trees to disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::coverage::{layer_directory, LayerFile};
use crate::document::{to_json_pretty, Bundle};
use crate::error::Result;

/// Name of the index written next to the layers.
pub const LAYER_INDEX_FILE: &str = "README.md";

/// Write `content` to `path` through a temp file and rename.
///
/// Parent directories are created as needed. Readers never observe a
/// partially written file.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_file = dir.join(format!(".{name}.tmp"));

    {
        let mut file = File::create(&temp_file)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    #[cfg(target_os = "windows")]
    if path.exists() {
        fs::remove_file(path)?;
    }

    fs::rename(&temp_file, path)?;
    Ok(())
}

/// Serialize any value as indented JSON and write it atomically.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut content = to_json_pretty(value)?;
    content.push('\n');
    write_atomic(path, &content)
}

/// Write a bundle document.
pub fn save_bundle(bundle: &Bundle, path: &Path) -> Result<()> {
    save_json(bundle, path)?;
    tracing::debug!(path = %path.display(), objects = bundle.objects.len(), "Saved bundle");
    Ok(())
}

/// Write a tree of layers under `output_dir`.
///
/// With `clear`, the directory is removed first. With `framework` set, a
/// markdown index of the layers is written as [`LAYER_INDEX_FILE`].
/// Returns the paths written, index last.
pub fn save_layers(
    layers: &[LayerFile],
    output_dir: &Path,
    clear: bool,
    framework: Option<&str>,
) -> Result<Vec<PathBuf>> {
    if clear && output_dir.exists() {
        tracing::debug!(dir = %output_dir.display(), "Clearing output directory");
        fs::remove_dir_all(output_dir)?;
    }

    let mut written = Vec::with_capacity(layers.len() + 1);
    for file in layers {
        let path = output_dir.join(&file.path);
        save_json(&file.layer, &path)?;
        written.push(path);
    }

    if let Some(framework) = framework {
        let path = output_dir.join(LAYER_INDEX_FILE);
        write_atomic(&path, &layer_directory(framework, layers))?;
        written.push(path);
    }

    Ok(written)
}
