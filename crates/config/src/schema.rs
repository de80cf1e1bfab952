//! Driver configuration schema.

use std::collections::BTreeMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Driver-wide policy shared by every cookie the driver creates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Classifier label value. `None` disables container labels entirely.
    pub container_label_tag: Option<String>,
    /// Value of the instance label. Generated at driver start when unset.
    pub instance_id: Option<String>,
    /// Hostname given to containers that run on the default network.
    /// Defaults to the host's own name.
    pub hostname: Option<String>,
    /// Mount every container's root filesystem read-only.
    pub enable_read_only_root_fs: bool,
    /// Inode cap applied to a sized `/tmp` tmpfs (0 = uncapped).
    pub max_tmpfs_inodes: u64,
    /// Run containers as root with full capabilities.
    pub disable_unprivileged_containers: bool,
    /// Allow images that declare `VOLUME`s.
    pub image_enable_volume: bool,
    /// Static credentials keyed by registry host.
    pub registries: BTreeMap<String, RegistryAuth>,
}

/// Static credentials for one registry.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryAuth {
    pub username: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    pub email: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub identity_token: Option<Secret<String>>,
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email)
            .field(
                "identity_token",
                &self.identity_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_secure() {
        let cfg = DriverConfig::default();
        assert!(!cfg.disable_unprivileged_containers);
        assert!(!cfg.image_enable_volume);
        assert!(!cfg.enable_read_only_root_fs);
        assert!(cfg.container_label_tag.is_none());
        assert!(cfg.registries.is_empty());
    }

    #[test]
    fn registry_auth_debug_redacts_secrets() {
        let auth = RegistryAuth {
            username: Some("robot".into()),
            password: Some(Secret::new("hunter2".into())),
            email: None,
            identity_token: Some(Secret::new("tok".into())),
        };
        let dbg = format!("{auth:?}");
        assert!(dbg.contains("robot"));
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn registry_auth_serializes_password_for_round_trip() {
        let auth = RegistryAuth {
            username: Some("robot".into()),
            password: Some(Secret::new("hunter2".into())),
            ..Default::default()
        };
        let json = serde_json::to_string(&auth).unwrap();
        assert!(json.contains("\"password\":\"hunter2\""));
        assert!(!json.contains("identity_token"));
    }
}
