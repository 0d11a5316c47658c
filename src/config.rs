use anyhow::{Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

fn default_provider() -> String {
    "openai".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ollama_host() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_log_path() -> String {
    "~/.cmdpal/audit.jsonl".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which backend answers suggestion requests: "openai", "ollama" or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Address the daemon binds to.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Audit log location; a leading `~` expands to the home directory.
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            ollama_host: default_ollama_host(),
            ollama_model: default_ollama_model(),
            host: default_host(),
            port: default_port(),
            log_path: default_log_path(),
        }
    }
}

impl Config {
    /// Load configuration from file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        // Environment variables override config file
        if let Ok(provider) = std::env::var("AI_PROVIDER") {
            config.provider = provider;
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            config.openai_api_key = api_key;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.openai_model = model;
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            config.ollama_host = host;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.ollama_model = model;
        }
        if let Ok(host) = std::env::var("AI_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("AI_PORT") {
            config.port = port.parse()?;
        }
        if let Ok(path) = std::env::var("LOG_PATH") {
            config.log_path = path;
        }
        if std::env::var("CMDPAL_USE_MOCK").is_ok() {
            config.provider = "mock".to_string();
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        info!("Saved config to: {}", config_path.display());
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".cmdpal"))
    }

    /// Audit log path with `~` expanded.
    pub fn expanded_log_path(&self) -> PathBuf {
        if let Some(rest) = self.log_path.strip_prefix("~/") {
            if let Some(home) = home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.log_path)
    }

    /// Base URL of the local daemon.
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn show_config_info(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        println!("Configuration file: {}", config_path.display());
        println!(
            "Status: {}",
            if config_path.exists() {
                "Found"
            } else {
                "Not found (using defaults)"
            }
        );
        println!("Provider: {}", self.provider);
        println!(
            "OpenAI API key: {}",
            if self.openai_api_key.is_empty() {
                "Not set"
            } else {
                "Set"
            }
        );
        println!("Server: {}", self.server_url());
        println!("Log path: {}", self.expanded_log_path().display());
        Ok(())
    }
}
