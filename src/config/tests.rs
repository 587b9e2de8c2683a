use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.ollama = OllamaConfig {
            protocol: "https".to_string(),
            host: "models.internal".to_string(),
            port: 8443,
            embedding_model: "bge-m3".to_string(),
            generation_model: "qwen2.5:7b".to_string(),
            embedding_dimension: 1024,
            retry_attempts: 2,
        };
        original_config.vector_store = VectorStoreConfig {
            uri: Some("/var/lib/rag/vectors".to_string()),
            collection_name: "support_docs".to_string(),
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let loaded_config = Config::load(temp_dir.path()).expect("should load config file");

        assert_eq!(loaded_config.ollama, original_config.ollama);
        assert_eq!(loaded_config.vector_store, original_config.vector_store);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_dir = temp_dir.path().join(".docs-rag");

        let config = Config::load(&config_dir).expect("should load defaults");

        assert_eq!(config.ollama, OllamaConfig::default());
        assert_eq!(config.get_base_dir(), config_dir.as_path());
        assert!(!config_dir.exists());
    }

    #[test]
    fn invalid_toml_handling() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            r#"
            [ollama
            host = "localhost"
            "#,
        )
        .expect("should write config file");

        assert!(Config::load(temp_dir.path()).is_err());
    }

    #[test]
    fn structurally_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            r#"
            [ollama]
            protocol = "gopher"
            "#,
        )
        .expect("should write config file");

        assert!(Config::load(temp_dir.path()).is_err());
    }

    #[test]
    fn out_of_range_file_values_are_sanitized() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(
            temp_dir.path().join("config.toml"),
            r#"
            [chunking]
            chunk_size = 5000

            [retrieval]
            retrieval_count = 25
            "#,
        )
        .expect("should write config file");

        let config = Config::load(temp_dir.path()).expect("should load with warnings");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.retrieval.retrieval_count, 3);
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let cases = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in cases {
            let ollama = OllamaConfig {
                protocol: protocol.to_string(),
                host: host.to_string(),
                port,
                ..OllamaConfig::default()
            };

            let url = ollama.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn empty_host_is_invalid() {
        let ollama = OllamaConfig {
            host: String::new(),
            ..OllamaConfig::default()
        };
        assert!(ollama.validate().is_err());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidCollectionName(String::new()),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(message.len() > 10);
        }
    }
}
