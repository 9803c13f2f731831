use serde::{Deserialize, Serialize};

/// Display-only settings reported by the backend.
///
/// Every field is optional on the wire; missing sections decode to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Application name.
    pub app_name: String,
    /// Whether the backend runs in development mode.
    pub debug: bool,
    /// Language model settings.
    pub llm: LlmSettings,
    /// Vector store settings.
    pub vector_db: VectorDbSettings,
    /// Database settings.
    pub database: DatabaseSettings,
    /// File storage settings.
    pub storage: StorageSettings,
}

/// Language model settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model name.
    pub model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Model server URL.
    pub base_url: String,
}

/// Vector store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorDbSettings {
    /// Provider name.
    pub provider: String,
    /// Provider environment or region.
    pub environment: String,
    /// Index name.
    pub index_name: String,
    /// Whether retrieval is enabled.
    pub enabled: bool,
}

/// Database settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Connection URL.
    pub url: String,
}

/// File storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory uploads are written to.
    pub upload_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_decodes() {
        let json = r#"{"app_name": "Jarvis AI Assistant", "llm": {"model": "qwen3:4b"}}"#;
        let config: BackendConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.app_name, "Jarvis AI Assistant");
        assert_eq!(config.llm.model, "qwen3:4b");
        assert!(!config.vector_db.enabled);
    }
}
