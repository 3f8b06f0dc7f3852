//! Service configuration from environment variables
//!
//! | Variable            | Default                 |
//! |---------------------|-------------------------|
//! | `STORE_DATA_DIR`    | `./data`                |
//! | `STORE_PATH`        | `default.store`         |
//! | `STORE_META_FILE`   | `meta.jsonl`            |
//! | `STORE_BIND_ADDR`   | `127.0.0.1:3001`        |
//! | `STORE_CORS_ORIGIN` | `http://localhost:3000` |

use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_PATH: &str = "default.store";
pub const DEFAULT_META_FILE: &str = "meta.jsonl";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3001";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the meta store and every data store
    pub data_dir: PathBuf,
    /// Logical path of the store this service serves
    pub store_path: String,
    /// File name of the meta store inside `data_dir`
    pub meta_file: String,
    pub bind_addr: String,
    pub cors_origin: String,
}

impl StoreConfig {
    /// Defaults rooted at `data_dir`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            store_path: DEFAULT_STORE_PATH.to_string(),
            meta_file: DEFAULT_META_FILE.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }

    /// Read the configuration from the environment
    ///
    /// A relative `STORE_DATA_DIR` is resolved against the working directory.
    pub fn from_env() -> Self {
        let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let data_dir = match env::var("STORE_DATA_DIR") {
            Ok(dir) if Path::new(&dir).is_absolute() => PathBuf::from(dir),
            Ok(dir) => current_dir.join(dir),
            Err(_) => current_dir.join("data"),
        };

        let mut config = Self::new(data_dir);
        if let Ok(path) = env::var("STORE_PATH") {
            config.store_path = path;
        }
        if let Ok(file) = env::var("STORE_META_FILE") {
            config.meta_file = file;
        }
        if let Ok(addr) = env::var("STORE_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(origin) = env::var("STORE_CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        config
    }

    pub fn with_store_path(mut self, path: impl Into<String>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn meta_file_path(&self) -> PathBuf {
        self.data_dir.join(&self.meta_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("/tmp/store");
        assert_eq!(config.store_path, "default.store");
        assert_eq!(config.meta_file_path(), PathBuf::from("/tmp/store/meta.jsonl"));
        assert_eq!(config.bind_addr, "127.0.0.1:3001");
    }

    #[test]
    fn test_with_store_path() {
        let config = StoreConfig::new("/tmp/store").with_store_path("other.store");
        assert_eq!(config.store_path, "other.store");
    }
}
