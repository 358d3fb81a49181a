use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Holds the key files and, unless overridden, the songs.
    pub data_dir: PathBuf,
    /// Static assets served for paths no route claims.
    pub web_root: PathBuf,
    /// Overrides `<data_dir>/songs`.
    pub songs_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid listen address '{}': {e}", self.host)))
    }

    #[must_use]
    pub fn songs_dir(&self) -> PathBuf {
        self.songs_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("songs"))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            web_root: PathBuf::from("./web"),
            songs_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_songs_dir() {
        let config = ServerConfig::default();
        assert_eq!(config.songs_dir(), PathBuf::from("./data/songs"));
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_songs_dir_override() {
        let config = ServerConfig {
            songs_dir: Some(PathBuf::from("/srv/songs")),
            ..ServerConfig::default()
        };
        assert_eq!(config.songs_dir(), PathBuf::from("/srv/songs"));
    }

    #[test]
    fn test_invalid_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.socket_addr(), Err(Error::Config(_))));
    }
}
