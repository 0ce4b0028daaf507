//! Runtime configuration.
//!
//! Settings are layered: built-in defaults, then environment variables, then
//! command-line flags.
//!
//! | Setting        | Environment             | Flag                |
//! |----------------|-------------------------|---------------------|
//! | data directory | `AGORA_DATA_DIR`        | `--data-dir`        |
//! | lock timeout   | `AGORA_LOCK_TIMEOUT_MS` | `--lock-timeout-ms` |
//! | server tuning  | `AGORA_SERVER_PROFILE`  | `--server`          |

use crate::error::{AgoraError, Result};
use crate::storage::RocksDbConfig;
use std::path::PathBuf;

/// Default data directory name.
pub const DEFAULT_DATA_DIR: &str = "agora_data";

const ENV_DATA_DIR: &str = "AGORA_DATA_DIR";
const ENV_LOCK_TIMEOUT_MS: &str = "AGORA_LOCK_TIMEOUT_MS";
const ENV_SERVER_PROFILE: &str = "AGORA_SERVER_PROFILE";

/// Configuration for an Agora instance.
#[derive(Debug, Clone)]
pub struct AgoraConfig {
    /// Directory holding the RocksDB database.
    pub data_dir: PathBuf,
    /// Storage engine tuning.
    pub rocksdb: RocksDbConfig,
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

impl AgoraConfig {
    /// Creates a configuration rooted at a custom data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Loads defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlays settings from an environment lookup.
    ///
    /// The lookup is injected so tests don't have to mutate the process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_SERVER_PROFILE).is_some_and(|v| v == "1" || v == "true") {
            self.use_server_profile();
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup(ENV_LOCK_TIMEOUT_MS) {
            self.rocksdb.lock_timeout_ms = parse_timeout(ENV_LOCK_TIMEOUT_MS, &timeout)?;
        }
        Ok(())
    }

    /// Overlays settings from command-line flags.
    ///
    /// Recognized flags are removed from `args`; everything else is left for
    /// the command parser.
    pub fn apply_args(&mut self, args: &mut Vec<String>) -> Result<()> {
        if take_switch(args, "--server") {
            self.use_server_profile();
        }
        if let Some(dir) = take_flag(args, "--data-dir")? {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = take_flag(args, "--lock-timeout-ms")? {
            self.rocksdb.lock_timeout_ms = parse_timeout("--lock-timeout-ms", &timeout)?;
        }
        Ok(())
    }

    fn use_server_profile(&mut self) {
        let lock_timeout_ms = self.rocksdb.lock_timeout_ms;
        self.rocksdb = RocksDbConfig::for_server();
        if lock_timeout_ms != RocksDbConfig::default().lock_timeout_ms {
            self.rocksdb.lock_timeout_ms = lock_timeout_ms;
        }
    }
}

fn parse_timeout(source: &str, raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(AgoraError::config(format!(
            "{} must be a positive number of milliseconds, got '{}'",
            source, raw
        ))),
    }
}

fn take_switch(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|arg| arg == name) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn take_flag(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|arg| arg == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(AgoraError::config(format!("{} requires a value", name)));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = AgoraConfig::default();
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.rocksdb.lock_timeout_ms, 1_000);
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/var/lib/agora"),
            (ENV_LOCK_TIMEOUT_MS, "250"),
        ]
        .into_iter()
        .collect();

        let mut config = AgoraConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/agora"));
        assert_eq!(config.rocksdb.lock_timeout_ms, 250);
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let mut config = AgoraConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_LOCK_TIMEOUT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, AgoraError::Config(_)));
    }

    #[test]
    fn test_args_override_and_are_consumed() {
        let mut config = AgoraConfig::with_data_dir("/tmp/env-dir");
        let mut argv = args(&[
            "forum",
            "list",
            "--data-dir",
            "/tmp/flag-dir",
            "--lock-timeout-ms",
            "40",
        ]);

        config.apply_args(&mut argv).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/flag-dir"));
        assert_eq!(config.rocksdb.lock_timeout_ms, 40);
        assert_eq!(argv, args(&["forum", "list"]));
    }

    #[test]
    fn test_server_profile_keeps_explicit_timeout() {
        let mut config = AgoraConfig::default();
        let mut argv = args(&["--lock-timeout-ms", "75", "--server"]);
        config.apply_args(&mut argv).unwrap();

        assert_eq!(config.rocksdb.max_open_files, 256);
        assert_eq!(config.rocksdb.lock_timeout_ms, 75);
    }

    #[test]
    fn test_flag_without_value() {
        let mut config = AgoraConfig::default();
        let mut argv = args(&["forum", "--data-dir"]);
        assert!(config.apply_args(&mut argv).is_err());
    }
}
