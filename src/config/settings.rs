use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Argon2Params;
use crate::errors::{KapsulError, Result};

/// Project-level configuration, loaded from `.kapsul.toml`.
///
/// Every field has a default so kapsul works without any config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Argon2 memory cost in KiB for new capsules (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count for new capsules (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree for new capsules (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Shell command whose single line of output is the passphrase.
    #[serde(default)]
    pub passphrase_cmd: Option<String>,

    /// Seconds to wait for `passphrase_cmd` before killing it.
    #[serde(default = "default_passphrase_cmd_timeout_secs")]
    pub passphrase_cmd_timeout_secs: u64,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_passphrase_cmd_timeout_secs() -> u64 {
    60
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            passphrase_cmd: None,
            passphrase_cmd_timeout_secs: default_passphrase_cmd_timeout_secs(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the working directory.
    const FILE_NAME: &'static str = ".kapsul.toml";

    /// Load settings from `<dir>/.kapsul.toml`.
    ///
    /// A missing file yields defaults; an unparsable one is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        toml::from_str(&contents).map_err(|e| {
            KapsulError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Argon2 parameters to use for a new capsule.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.argon2_memory_kib, 65_536);
        assert_eq!(s.argon2_iterations, 3);
        assert_eq!(s.argon2_parallelism, 4);
        assert_eq!(s.passphrase_cmd, None);
        assert_eq!(s.passphrase_cmd_timeout_secs, 60);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(Settings::load(tmp.path()).unwrap(), Settings::default());
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 8
passphrase_cmd = "pass show backups/kapsul"
passphrase_cmd_timeout_secs = 5
"#;
        fs::write(tmp.path().join(".kapsul.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.argon2_memory_kib, 131_072);
        assert_eq!(settings.argon2_iterations, 5);
        assert_eq!(settings.argon2_parallelism, 8);
        assert_eq!(
            settings.passphrase_cmd.as_deref(),
            Some("pass show backups/kapsul")
        );
        assert_eq!(settings.passphrase_cmd_timeout_secs, 5);
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".kapsul.toml"), "argon2_iterations = 1\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.argon2_iterations, 1);
        assert_eq!(settings.argon2_memory_kib, 65_536);
        assert_eq!(settings.passphrase_cmd, None);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".kapsul.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn argon2_params_follow_settings() {
        let s = Settings {
            argon2_memory_kib: 8_192,
            argon2_iterations: 1,
            argon2_parallelism: 2,
            ..Settings::default()
        };
        let p = s.argon2_params();
        assert_eq!((p.memory_kib, p.iterations, p.parallelism), (8_192, 1, 2));
    }
}
