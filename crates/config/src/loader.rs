use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::DriverConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["berth.toml", "berth.yaml", "berth.yml", "berth.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<DriverConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./berth.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/berth/berth.{toml,yaml,yml,json}` (user-global)
///
/// Returns `DriverConfig::default()` if no config file is found or the one
/// found fails to load.
pub fn discover_and_load() -> DriverConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return DriverConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
        DriverConfig::default()
    })
}

/// Returns the user-global config directory (`~/.config/berth/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "berth").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<DriverConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Apply `BERTH_*` environment variables on top of a loaded config.
pub fn apply_env_overrides(config: DriverConfig) -> DriverConfig {
    apply_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_overrides_with(
    mut config: DriverConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> DriverConfig {
    if let Some(tag) = lookup("BERTH_CONTAINER_LABEL_TAG") {
        config.container_label_tag = Some(tag);
    }
    if let Some(hostname) = lookup("BERTH_HOSTNAME") {
        config.hostname = Some(hostname);
    }
    if let Some(v) = parsed(&lookup, "BERTH_READ_ONLY_ROOT_FS") {
        config.enable_read_only_root_fs = v;
    }
    if let Some(v) = parsed(&lookup, "BERTH_MAX_TMPFS_INODES") {
        config.max_tmpfs_inodes = v;
    }
    if let Some(v) = parsed(&lookup, "BERTH_DISABLE_UNPRIVILEGED") {
        config.disable_unprivileged_containers = v;
    }
    if let Some(v) = parsed(&lookup, "BERTH_IMAGE_ENABLE_VOLUME") {
        config.image_enable_volume = v;
    }
    config
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable env override");
            None
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use {secrecy::ExposeSecret, tempfile::NamedTempFile};

    use super::*;

    fn write_config(suffix: &str, body: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_toml_with_registries() {
        let file = write_config(
            ".toml",
            r#"
container_label_tag = "runner"
max_tmpfs_inodes = 4096

[registries."registry.example.com"]
username = "robot"
password = "s3cret"
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.container_label_tag.as_deref(), Some("runner"));
        assert_eq!(cfg.max_tmpfs_inodes, 4096);
        let auth = &cfg.registries["registry.example.com"];
        assert_eq!(auth.username.as_deref(), Some("robot"));
        assert_eq!(auth.password.as_ref().unwrap().expose_secret(), "s3cret");
    }

    #[test]
    fn loads_yaml_and_json() {
        let yaml = write_config(".yaml", "enable_read_only_root_fs: true\n");
        assert!(load_config(yaml.path()).unwrap().enable_read_only_root_fs);

        let json = write_config(".json", r#"{"image_enable_volume": true}"#);
        assert!(load_config(json.path()).unwrap().image_enable_volume);
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = write_config(".ini", "x = 1");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/berth.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/berth.toml"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BERTH_CONTAINER_LABEL_TAG", "edge"),
            ("BERTH_READ_ONLY_ROOT_FS", "true"),
            ("BERTH_MAX_TMPFS_INODES", "not-a-number"),
            ("BERTH_IMAGE_ENABLE_VOLUME", "false"),
        ]);
        let base = DriverConfig {
            max_tmpfs_inodes: 10,
            image_enable_volume: true,
            ..Default::default()
        };
        let cfg = apply_overrides_with(base, |name| env.get(name).map(|v| v.to_string()));
        assert_eq!(cfg.container_label_tag.as_deref(), Some("edge"));
        assert!(cfg.enable_read_only_root_fs);
        assert_eq!(cfg.max_tmpfs_inodes, 10);
        assert!(!cfg.image_enable_volume);
        assert!(!cfg.disable_unprivileged_containers);
    }
}
