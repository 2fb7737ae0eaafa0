use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;
// Story media may go up to 100 MiB; leave headroom for multipart framing.
const DEFAULT_MAX_BODY_BYTES: u64 = 110 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CuraConfig {
    pub api_port: u16,
    pub paths: CuraPaths,
    /// User ids allowed to grant/revoke the verification flag.
    pub admin_ids: Vec<String>,
    /// Upper bound for a single store or object-store operation.
    pub store_timeout: Duration,
    pub max_body_bytes: u64,
}

impl CuraConfig {
    pub fn from_env() -> Result<Self> {
        let paths = CuraPaths::discover()?;
        Self::with_paths(paths)
    }

    /// Builds a config rooted at an explicit base directory. Used by tests.
    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        Self::with_paths(CuraPaths::from_base_dir(base)?)
    }

    fn with_paths(paths: CuraPaths) -> Result<Self> {
        let api_port = env::var("CURA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let admin_ids = env::var("CURA_ADMIN_IDS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let store_timeout = env::var("CURA_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS));
        let max_body_bytes = env::var("CURA_MAX_BODY_BYTES")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);
        Ok(Self {
            api_port,
            paths,
            admin_ids,
            store_timeout,
            max_body_bytes,
        })
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_ids.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CuraPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Root of the disk-backed object store; one subdirectory per bucket.
    pub media_dir: PathBuf,
}

impl CuraPaths {
    pub fn discover() -> Result<Self> {
        if let Ok(base) = env::var("CURA_BASE_DIR") {
            return Self::from_base_dir(base);
        }
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("cura.db");
        let media_dir = base.join("media");
        Ok(Self {
            base,
            data_dir,
            db_path,
            media_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_check_matches_configured_ids() {
        let mut config = CuraConfig::from_base_dir("/tmp/cura-config-test").expect("config");
        config.admin_ids = vec!["root".into(), "ops".into()];
        assert!(config.is_admin("root"));
        assert!(config.is_admin("ops"));
        assert!(!config.is_admin("alice"));
        assert!(!config.is_admin(""));
    }

    #[test]
    fn paths_derive_from_base_dir() {
        let paths = CuraPaths::from_base_dir("/srv/cura").expect("paths");
        assert_eq!(paths.db_path, Path::new("/srv/cura/data/cura.db"));
        assert_eq!(paths.media_dir, Path::new("/srv/cura/media"));
    }
}
