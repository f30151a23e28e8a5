use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Read a project document. `.yaml`/`.yml` files are parsed as YAML,
/// anything else as JSON.
pub fn read_document(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let value = super::parse_document(&contents, Some(is_yaml(&canonical)))
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    log::debug!("loaded {}", canonical.display());
    Ok(value)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.exists() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }
    if !canonical.is_file() {
        return Err(format!("Not a file: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_detected_by_extension() {
        assert!(is_yaml(Path::new("project.yaml")));
        assert!(is_yaml(Path::new("project.YML")));
        assert!(!is_yaml(Path::new("project.json")));
        assert!(!is_yaml(Path::new("project")));
    }
}
