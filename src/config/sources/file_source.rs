//! Generic async file-based config source.
//!
//! [`FileSource`] implements [`ConfigSource`] for any file format by
//! accepting a deserialization function at construction time; the
//! per-format constructors are gated by cargo features. Validation
//! happens later, after environment overrides are applied.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::model::Config;
use crate::config::ConfigSource;
use crate::error::GatewayError;

type Deserializer = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: Deserializer,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: Deserializer) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[cfg(feature = "yaml")]
    #[must_use]
    pub fn yaml(path: PathBuf) -> Self {
        Self::new(path, "yaml", |content| {
            serde_yml::from_str::<Config>(content).map_err(Into::into)
        })
    }

    #[cfg(feature = "json")]
    #[must_use]
    pub fn json(path: PathBuf) -> Self {
        Self::new(path, "json", |content| {
            serde_json::from_str::<Config>(content).map_err(Into::into)
        })
    }

    #[cfg(feature = "toml")]
    #[must_use]
    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, "toml", |content| {
            toml::from_str::<Config>(content).map_err(Into::into)
        })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<Config, GatewayError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewayError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                GatewayError::Io(e)
            }
        })?;

        (self.deserialize)(&content).map_err(|e| GatewayError::ConfigParse {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(all(test, feature = "yaml"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_reported() {
        let source = FileSource::yaml(PathBuf::from("does-not-exist/gateway.yaml"));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, GatewayError::ConfigFileNotFound { .. }));
    }
}
