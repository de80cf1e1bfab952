//! Image references, cached image records and registry credentials.

use std::collections::BTreeMap;

use {
    berth_config::RegistryAuth,
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

use crate::runtime::InspectedImage;

const DEFAULT_TAG: &str = "latest";

/// Names under which Docker Hub credentials may be configured.
const DOCKER_HUB_ALIASES: &[&str] = &["docker.io", "index.docker.io", "registry-1.docker.io"];

/// A parsed `[registry/]repository[:tag][@digest]` reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host. Empty means the default registry.
    pub registry: String,
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
}

impl ImageRef {
    /// Parse an image reference. Never fails: anything unrecognised ends up
    /// in `repository` with an empty registry.
    #[must_use]
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (reference, None),
        };

        let (registry, remainder) = match name.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (first, rest),
            _ => ("", name),
        };

        // A ':' after the last '/' separates the tag.
        let last_slash = remainder.rfind('/').map_or(0, |i| i + 1);
        let (repository, tag) = match remainder[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&remainder[..split], &remainder[split + 1..])
            },
            None => (remainder, ""),
        };

        let tag = if tag.is_empty() && digest.is_none() && !repository.is_empty() {
            DEFAULT_TAG
        } else {
            tag
        };

        Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
            digest,
        }
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

/// Local image record tracked by the image cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImage {
    pub id: String,
    pub parent_id: String,
    pub repo_tags: Vec<String>,
    pub size: u64,
}

impl From<&InspectedImage> for CachedImage {
    fn from(img: &InspectedImage) -> Self {
        Self {
            id: img.id.clone(),
            parent_id: img.parent_id.clone(),
            repo_tags: img.repo_tags.clone(),
            size: img.size,
        }
    }
}

/// Credentials handed to the image puller.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    pub email: Option<String>,
    pub server_address: String,
    pub identity_token: Option<Secret<String>>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email)
            .field("server_address", &self.server_address)
            .field(
                "identity_token",
                &self.identity_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Look up static credentials for `registry`.
///
/// Keys match after stripping a URL scheme and any `/v1/`-style suffix. An
/// empty registry matches the Docker Hub aliases. With no match, anonymous
/// credentials addressed at `registry` are returned.
#[must_use]
pub fn find_registry_auth(registry: &str, auths: &BTreeMap<String, RegistryAuth>) -> AuthConfig {
    let wanted = normalize_registry(registry);
    let matches = |key: &str| {
        let key = normalize_registry(key);
        if wanted.is_empty() {
            DOCKER_HUB_ALIASES.contains(&key)
        } else {
            key == wanted
        }
    };

    auths
        .iter()
        .find(|(key, _)| matches(key))
        .map(|(key, auth)| AuthConfig {
            username: auth.username.clone(),
            password: auth.password.clone(),
            email: auth.email.clone(),
            server_address: key.clone(),
            identity_token: auth.identity_token.clone(),
        })
        .unwrap_or_else(|| AuthConfig {
            server_address: registry.to_string(),
            ..Default::default()
        })
}

fn normalize_registry(raw: &str) -> &str {
    let host = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let host = host.split('/').next().unwrap_or(host);
    // All Docker Hub aliases compare equal.
    if DOCKER_HUB_ALIASES.contains(&host) {
        DOCKER_HUB_ALIASES[0]
    } else {
        host
    }
}
