//! CLI argument validation functions
//!
//! This module provides custom validation functions for CLI arguments
//! that go beyond what clap can validate automatically.

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value as JsonValue};

/// Longest `--timeout` accepted, in seconds
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Validate that a configuration path exists and is usable.
///
/// Directories are accepted for layered loading; files must be readable.
pub fn validate_config_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration path does not exist: '{}'", path_str));
    }

    if path.is_dir() {
        return Ok(path);
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Parse one `-d key=value` payload entry
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got: '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Payload key cannot be empty in '{}'", raw));
    }

    Ok((key.to_string(), value.to_string()))
}

/// Validate the dispatch timeout in seconds (1-3600)
pub fn validate_timeout(secs_str: &str) -> Result<u64, String> {
    let secs: u64 = secs_str
        .parse()
        .map_err(|_| format!("Timeout must be a whole number of seconds, got: '{}'", secs_str))?;

    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(format!(
            "Timeout must be between 1 and {} seconds",
            MAX_TIMEOUT_SECS
        ));
    }

    Ok(secs)
}

/// Parse a `--json` payload; only objects are accepted
pub fn parse_json_object(raw: &str) -> Result<Map<String, JsonValue>, String> {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(_) => Err("JSON payload must be an object".to_string()),
        Err(e) => Err(format!("Invalid JSON payload: {}", e)),
    }
}

/// Merge a `--json` object with `-d` pairs; pairs win on conflicts
pub fn build_payload(
    json: Option<&Map<String, JsonValue>>,
    pairs: &[(String, String)],
) -> Map<String, JsonValue> {
    let mut payload = json.cloned().unwrap_or_default();
    for (key, value) in pairs {
        payload.insert(key.clone(), JsonValue::String(value.clone()));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_value_valid() {
        assert_eq!(
            parse_key_value("id=42").unwrap(),
            ("id".to_string(), "42".to_string())
        );
        // Only the first '=' splits
        assert_eq!(
            parse_key_value("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_key_value("note=").unwrap(),
            ("note".to_string(), String::new())
        );
    }

    #[test]
    fn test_key_value_invalid() {
        for raw in ["novalue", "=42", "  =x", ""] {
            assert!(parse_key_value(raw).is_err(), "'{}' should be invalid", raw);
        }
    }

    #[test]
    fn test_timeout_validation() {
        for secs in ["1", "30", "3600"] {
            assert!(validate_timeout(secs).is_ok(), "{} should be valid", secs);
        }
        for secs in ["0", "3601", "-1", "abc", ""] {
            assert!(validate_timeout(secs).is_err(), "'{}' should be invalid", secs);
        }
    }

    #[test]
    fn test_json_object_only() {
        assert_eq!(
            parse_json_object(r#"{"id": 42}"#).unwrap()["id"],
            json!(42)
        );
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("{broken").is_err());
    }

    #[test]
    fn test_pairs_override_json() {
        let json = parse_json_object(r#"{"id": 1, "total": 9.5}"#).unwrap();
        let pairs = vec![("id".to_string(), "2".to_string())];

        let payload = build_payload(Some(&json), &pairs);
        assert_eq!(payload["id"], json!("2"));
        assert_eq!(payload["total"], json!(9.5));
    }

    #[test]
    fn test_config_path_validation() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hub.toml");
        fs::write(&file, "").unwrap();

        assert!(validate_config_path(dir.path().to_str().unwrap()).is_ok());
        assert!(validate_config_path(file.to_str().unwrap()).is_ok());
        assert!(validate_config_path("/definitely/not/here.toml").is_err());
    }
}
