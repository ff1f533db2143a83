use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub provisioner: ProvisionerConfig,

    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// 0 = let tokio pick.
    pub worker_threads: usize,

    /// Name of the chat service this deployment serves (e.g. "slack").
    /// Service account links are scoped to it.
    pub service: String,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:vmbroker.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 0,
            service: "slack".to_string(),
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// The provisioner executable. Overridable so tests can substitute a
    /// recording stub.
    pub binary: String,

    /// Root under which each VM gets a dedicated directory named by its id.
    pub work_dir: PathBuf,

    /// Directory holding `Vagrantfile.tmpl` and auxiliary files.
    pub templates_dir: PathBuf,

    pub default_box: String,

    pub max_vms_per_user: u64,

    /// Finalized hostnames are `<prefix><id>`.
    pub hostname_prefix: String,

    /// Assigned ips are the prefix plus a host octet derived from the id.
    pub ip_prefix: String,

    /// Bound on every external invocation; a timeout is reported as a
    /// recoverable failure, not a crash.
    pub command_timeout_secs: u64,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            binary: "vagrant".to_string(),
            work_dir: PathBuf::from("machines"),
            templates_dir: PathBuf::from("templates"),
            default_box: "ubuntu/trusty64".to_string(),
            max_vms_per_user: 3,
            hostname_prefix: "nyc-vm-d".to_string(),
            ip_prefix: "10.20.6.".to_string(),
            command_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8099,
        }
    }
}

impl Config {
    /// Loads the config from `VMBROKER_CONFIG`, the user config directory,
    /// or `./config.toml`, in that order. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("VMBROKER_CONFIG") {
            return Self::load_from(Path::new(&path));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("vmbroker").join("config.toml");
            if path.is_file() {
                return Self::load_from(&path);
            }
        }

        let local = Path::new("config.toml");
        if local.is_file() {
            return Self::load_from(local);
        }

        info!("No config file found; using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();

        assert_eq!(parsed.general.service, config.general.service);
        assert_eq!(
            parsed.provisioner.max_vms_per_user,
            config.provisioner.max_vms_per_user
        );
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let parsed: Config = toml::from_str("[provisioner]\nmax_vms_per_user = 5\n").unwrap();

        assert_eq!(parsed.provisioner.max_vms_per_user, 5);
        assert_eq!(parsed.provisioner.binary, "vagrant");
        assert_eq!(parsed.general.log_level, "info");
    }
}
