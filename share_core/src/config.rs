use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Port used when neither a flag nor the environment overrides it.
pub const DEFAULT_PORT: u16 = 8000;

/// Name of the storage directory created next to the executable.
pub const STORAGE_DIR_NAME: &str = "shared";

/// Environment variable overriding the listening port.
pub const PORT_ENV: &str = "SHARE_PORT";

/// Environment variable overriding the storage directory.
pub const DIR_ENV: &str = "SHARE_DIR";

#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub port: u16,
    pub storage_dir: PathBuf,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            storage_dir: default_storage_dir(),
        }
    }
}

impl ShareConfig {
    /// Resolve the effective configuration. Explicit values win over
    /// `SHARE_PORT` / `SHARE_DIR` environment variables, which win over the
    /// defaults. A `.env` file in the working directory is honored when
    /// present.
    pub fn resolve(port: Option<u16>, storage_dir: Option<PathBuf>) -> Self {
        let _ = dotenvy::dotenv();

        let port = port
            .or_else(|| env::var(PORT_ENV).ok().and_then(|v| v.parse().ok()))
            .unwrap_or(DEFAULT_PORT);

        let storage_dir = storage_dir
            .or_else(|| env::var(DIR_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(default_storage_dir);

        Self { port, storage_dir }
    }

    /// Address the listener binds: all interfaces on the configured port.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }
}

/// `shared/` next to the running executable, or relative to the working
/// directory when the executable path cannot be determined.
pub fn default_storage_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(STORAGE_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(STORAGE_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let config = ShareConfig::resolve(Some(9123), Some(PathBuf::from("/tmp/elsewhere")));
        assert_eq!(config.port, 9123);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn test_default_dir_is_named_shared() {
        assert!(default_storage_dir().ends_with(STORAGE_DIR_NAME));
    }

    #[test]
    fn test_bind_addr_listens_on_all_interfaces() {
        let config = ShareConfig {
            port: 8000,
            storage_dir: PathBuf::from("shared"),
        };
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8000");
    }
}
