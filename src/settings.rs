//! Runtime configuration.
//!
//! Settings come from `GITCONF_*` environment variables first; the CLI in
//! `main` overrides them flag by flag.

use std::net::SocketAddr;
use std::path::PathBuf;

/// service-wide settings, shared read-only after boot
#[derive(Debug, Clone)]
pub struct Settings {
    /// directory holding the `<producer>.git` repositories
    pub root: PathBuf,
    /// address the HTTP server binds to
    pub listen: SocketAddr,
    /// require Basic auth even for callers on private networks
    pub git_auth_on_private_networks: bool,
    /// directory of `<name>.json` schema documents for the validator
    pub schema_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./repos"),
            listen: "0.0.0.0:3002".parse().expect("default listen address"),
            git_auth_on_private_networks: false,
            schema_dir: None,
        }
    }
}

impl Settings {
    /// Read settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(root) = std::env::var("GITCONF_ROOT") {
            settings.root = PathBuf::from(root);
        }
        if let Ok(listen) = std::env::var("GITCONF_LISTEN") {
            if let Ok(addr) = listen.parse() {
                settings.listen = addr;
            }
        }
        if let Ok(flag) = std::env::var("GITCONF_GIT_AUTH_ON_PRIVATE_NETWORKS") {
            settings.git_auth_on_private_networks = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Ok(dir) = std::env::var("GITCONF_SCHEMA_DIR") {
            settings.schema_dir = Some(PathBuf::from(dir));
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.root, PathBuf::from("./repos"));
        assert!(!settings.git_auth_on_private_networks);
        assert!(settings.schema_dir.is_none());
    }
}
