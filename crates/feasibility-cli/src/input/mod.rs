pub mod file;
pub mod stdin;

use serde_json::Value;

/// Resolve the project document from `--input` or piped stdin.
pub fn read_document(path: Option<&str>) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_document(path);
    }
    match stdin::read_piped()? {
        Some(text) => parse_document(&text, None),
        None => Err("--input <file.json|file.yaml> or stdin required".into()),
    }
}

/// Parse JSON or YAML. With no format hint JSON is tried first, then YAML,
/// and the JSON error is reported if both fail.
pub fn parse_document(text: &str, yaml: Option<bool>) -> Result<Value, Box<dyn std::error::Error>> {
    match yaml {
        Some(true) => Ok(serde_yaml::from_str(text)?),
        Some(false) => Ok(serde_json::from_str(text)?),
        None => serde_json::from_str::<Value>(text)
            .or_else(|json_err| serde_yaml::from_str(text).map_err(|_| json_err))
            .map_err(Into::into),
    }
}
