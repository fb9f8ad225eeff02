//! Config file discovery, merging, and environment variable overlay.

use crate::{ConfigError, SystemConfig};
use std::env;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/trailcap/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("trailcap/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("trailcap.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge two raw tables, with `overlay` taking precedence.
///
/// Nested tables merge key by key; any other value in `overlay` replaces the
/// one in `base` wholesale (arrays are not concatenated).
pub fn merge_tables(mut base: toml::Table, overlay: toml::Table) -> toml::Table {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => {
                toml::Value::Table(merge_tables(b, o))
            }
            (_, v) => v,
        };
        base.insert(key, merged);
    }
    base
}

/// Deserialize a merged table into typed config.
pub fn from_table(table: toml::Table, path: &Path) -> Result<SystemConfig, ConfigError> {
    let mut config: SystemConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

    config.store.path = expand_path(&config.store.path.to_string_lossy());
    Ok(config)
}

/// Apply process environment overrides to config.
pub fn apply_env_overrides(config: &mut SystemConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup (the environment, in production).
pub fn apply_overrides_from<F>(config: &mut SystemConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("TRAILCAP_SYSTEM_ID") {
        if let Ok(id) = Uuid::parse_str(&v) {
            config.system.id = id;
            sources.env_overrides.push("TRAILCAP_SYSTEM_ID".to_string());
        }
    }
    if let Some(v) = lookup("TRAILCAP_BOARD") {
        config.system.board = v;
        sources.env_overrides.push("TRAILCAP_BOARD".to_string());
    }
    if let Some(v) = lookup("TRAILCAP_FREQUENCY") {
        if let Ok(frequency) = v.parse() {
            config.system.frequency = frequency;
            sources.env_overrides.push("TRAILCAP_FREQUENCY".to_string());
        }
    }

    // Store
    if let Some(v) = lookup("TRAILCAP_STORE_KIND") {
        if let Ok(kind) = v.parse() {
            config.store.kind = kind;
            sources.env_overrides.push("TRAILCAP_STORE_KIND".to_string());
        }
    }
    if let Some(v) = lookup("TRAILCAP_STORE_ENDPOINT") {
        config.store.endpoint = v;
        sources.env_overrides.push("TRAILCAP_STORE_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("TRAILCAP_STORE_PATH") {
        config.store.path = expand_path(&v);
        sources.env_overrides.push("TRAILCAP_STORE_PATH".to_string());
    }

    // Logging
    if let Some(v) = lookup("TRAILCAP_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("TRAILCAP_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreKind;
    use std::collections::HashMap;
    use std::io::Write;

    fn table(s: &str) -> toml::Table {
        s.parse().unwrap()
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_merge_overlay_wins_per_key() {
        let base = table(
            r#"
[system]
board = "mock"
frequency = 10.0

[store]
kind = "memory"
"#,
        );
        let overlay = table(
            r#"
[system]
frequency = 50.0
"#,
        );

        let merged = merge_tables(base, overlay);
        let config = from_table(merged, Path::new("test.toml")).unwrap();

        assert_eq!(config.system.board, "mock");
        assert_eq!(config.system.frequency, 50.0);
        assert_eq!(config.store.kind, StoreKind::Memory);
    }

    #[test]
    fn test_merge_replaces_sensor_fields_individually() {
        let base = table(
            r#"
[sensors.fork]
binding = "0b8c7e4a-0f1d-4c53-8d0e-2d0f5b2e8a61"
type = "3906c164-82c8-48f8-a154-a39a9d0269fa"
"#,
        );
        let overlay = table(
            r#"
[sensors.fork]
binding = "1c9d8f5b-1a2e-4d64-9e1f-3e1a6c3f9b72"
"#,
        );

        let config = from_table(merge_tables(base, overlay), Path::new("test.toml")).unwrap();
        let fork = &config.sensors["fork"];
        assert_eq!(fork.binding.to_string(), "1c9d8f5b-1a2e-4d64-9e1f-3e1a6c3f9b72");
        assert_eq!(fork.type_id.to_string(), "3906c164-82c8-48f8-a154-a39a9d0269fa");
    }

    #[test]
    fn test_env_overrides_are_recorded() {
        let vars: HashMap<&str, &str> = [
            ("TRAILCAP_BOARD", "udoo-neo"),
            ("TRAILCAP_STORE_KIND", "table"),
            ("TRAILCAP_STORE_ENDPOINT", "http://dynamo.local:8000"),
            ("TRAILCAP_FREQUENCY", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = SystemConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            vars.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.system.board, "udoo-neo");
        assert_eq!(config.store.kind, StoreKind::Table);
        assert_eq!(config.store.endpoint, "http://dynamo.local:8000");
        // Unparseable values are ignored, not recorded
        assert_eq!(config.system.frequency, 29.97);
        assert_eq!(
            sources.env_overrides,
            vec![
                "TRAILCAP_BOARD".to_string(),
                "TRAILCAP_STORE_KIND".to_string(),
                "TRAILCAP_STORE_ENDPOINT".to_string(),
            ]
        );
    }

    #[test]
    fn test_cli_override_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[system]\nboard = \"from-cli\"").unwrap();

        let files = discover_config_files_with_override(Some(file.path()));
        assert_eq!(files.last().map(PathBuf::as_path), Some(file.path()));

        let config = from_table(load_table(file.path()).unwrap(), file.path()).unwrap();
        assert_eq!(config.system.board, "from-cli");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = load_table(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }
}
