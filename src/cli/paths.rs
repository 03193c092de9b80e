use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Canonical path of an existing directory.
pub fn existing_dir(path: &Path) -> Result<PathBuf> {
    let resolved = path
        .canonicalize()
        .with_context(|| format!("Directory does not exist: {}", path.display()))?;
    if !resolved.is_dir() {
        anyhow::bail!("Not a directory: {}", path.display());
    }
    Ok(resolved)
}

/// Create `path` if needed and return its canonical form.
pub fn ensure_output_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create output directory {}", path.display()))?;
    path.canonicalize()
        .with_context(|| format!("Failed to resolve output directory {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(existing_dir(temp_dir.path()).is_ok());
        assert!(existing_dir(&temp_dir.path().join("missing")).is_err());

        let file = temp_dir.path().join("file.py");
        fs::write(&file, "x = 1").unwrap();
        assert!(existing_dir(&file).is_err());
    }

    #[test]
    fn test_ensure_output_dir_creates_nested() {
        let temp_dir = TempDir::new().unwrap();
        let out = ensure_output_dir(&temp_dir.path().join("a/b")).unwrap();
        assert!(out.is_dir());
    }
}
