//! Configuration for the embedding service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the sentence embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name or identifier
    pub model_name: String,

    /// Explicit local model path (overrides the data-directory lookup)
    pub model_path: Option<PathBuf>,

    /// Context size for the inference backend (tokens)
    pub context_size: u32,

    /// GPU layers to offload (0 = CPU only)
    pub n_gpu_layers: u32,

    /// Threads used for batch encoding
    pub n_threads: i32,

    /// Maximum cache size (number of embeddings to cache)
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            model_path: None,
            context_size: 512,
            n_gpu_layers: 0,
            n_threads: 4,
            cache_capacity: 10000,
        }
    }
}

impl EmbeddingConfig {
    /// Get the model path, resolving it from ~/.taskcanvas/models/
    ///
    /// Uses a centralized data directory so models can be updated without
    /// reinstalling the application and shared across app versions:
    /// - macOS/Linux: ~/.taskcanvas/models/<name>.gguf
    /// - Windows: %USERPROFILE%\.taskcanvas\models\<name>.gguf
    pub fn resolve_model_path(&self) -> Result<PathBuf, std::io::Error> {
        if let Some(path) = &self.model_path {
            if path.exists() {
                return Ok(path.clone());
            }
        }

        let home_dir = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Cannot determine home directory",
            )
        })?;

        let model_path = home_dir
            .join(".taskcanvas")
            .join("models")
            .join(format!("{}.gguf", sanitize_model_name(&self.model_name)));

        if model_path.exists() {
            Ok(model_path)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "Model not found at {:?}. Please install model to ~/.taskcanvas/models/",
                    model_path
                ),
            ))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.is_empty() {
            return Err("model_name cannot be empty".to_string());
        }

        if self.context_size == 0 {
            return Err("context_size must be greater than 0".to_string());
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Sanitize model name to be filesystem-safe
fn sanitize_model_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '<' | '>' | '|' | '"' => '-',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.context_size, 512);
        assert_eq!(config.cache_capacity, 10000);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EmbeddingConfig::default();
        assert!(config.validate().is_ok());

        config.model_name = String::new();
        assert!(config.validate().is_err());

        config.model_name = "test".to_string();
        config.context_size = 0;
        assert!(config.validate().is_err());

        config.context_size = 512;
        config.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sanitize_model_name() {
        assert_eq!(sanitize_model_name("all-MiniLM-L6-v2"), "all-MiniLM-L6-v2");
        assert_eq!(
            sanitize_model_name("sentence-transformers/all-MiniLM-L6-v2"),
            "sentence-transformers-all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn test_resolve_explicit_path() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let config = EmbeddingConfig {
            model_path: Some(temp.path().to_path_buf()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(config.resolve_model_path().unwrap(), temp.path());
    }
}
