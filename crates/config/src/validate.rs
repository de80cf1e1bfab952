//! Semantic checks over a loaded [`DriverConfig`].

use crate::schema::DriverConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. `registries.docker.io.password`.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Check a config for insecure or unusable settings.
#[must_use]
pub fn validate(config: &DriverConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if config
        .container_label_tag
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        out.push(Diagnostic::new(
            Severity::Warning,
            "container_label_tag",
            "label tag is empty; containers will carry an empty classifier label",
        ));
    }

    if config.disable_unprivileged_containers {
        out.push(Diagnostic::new(
            Severity::Warning,
            "disable_unprivileged_containers",
            "containers run as root with all capabilities",
        ));
    }

    for (registry, auth) in &config.registries {
        if registry.is_empty() || registry.chars().any(char::is_whitespace) {
            out.push(Diagnostic::new(
                Severity::Error,
                format!("registries.{registry}"),
                "registry key must be a non-empty host name without whitespace",
            ));
        }
        if auth.username.is_some() && auth.password.is_none() && auth.identity_token.is_none() {
            out.push(Diagnostic::new(
                Severity::Warning,
                format!("registries.{registry}.password"),
                "username set without a password or identity token",
            ));
        }
    }

    out.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.path.cmp(&b.path)));
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::Secret;

    use {super::*, crate::schema::RegistryAuth};

    #[test]
    fn default_config_is_clean() {
        assert!(validate(&DriverConfig::default()).is_empty());
    }

    #[test]
    fn flags_privileged_posture_and_bad_registries() {
        let mut cfg = DriverConfig {
            disable_unprivileged_containers: true,
            container_label_tag: Some("  ".into()),
            ..Default::default()
        };
        cfg.registries.insert("bad host".into(), RegistryAuth::default());
        cfg.registries.insert("registry.example.com".into(), RegistryAuth {
            username: Some("robot".into()),
            ..Default::default()
        });
        cfg.registries.insert("ok.example.com".into(), RegistryAuth {
            username: Some("robot".into()),
            password: Some(Secret::new("pw".into())),
            ..Default::default()
        });

        let diags = validate(&cfg);
        let paths: Vec<_> = diags.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec![
            "registries.bad host",
            "container_label_tag",
            "disable_unprivileged_containers",
            "registries.registry.example.com.password",
        ]);
        assert_eq!(diags[0].severity, Severity::Error);
        assert!(diags[1..].iter().all(|d| d.severity == Severity::Warning));
    }
}
