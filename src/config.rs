use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub catalog: CatalogConfig,
    pub publish: PublishConfig,
    pub companies: CompaniesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Root of the on-disk filing catalog. The downloader (out of scope here)
/// fills `<root>/sec-edgar-filings/<SYMBOL>/<FORM>/<ACCESSION>/`.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub root: PathBuf,
}

/// Where the rendered artifacts are published. Document URLs are formed by
/// appending the artifact path, relative to the catalog root, to `url_base`.
#[derive(Debug, Deserialize, Clone)]
pub struct PublishConfig {
    pub url_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompaniesConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    512
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    // Validate the publish base address
    let base = config.publish.url_base.trim_end_matches('/');
    if !(base.starts_with("http://") || base.starts_with("https://") || base.starts_with("file://"))
    {
        anyhow::bail!(
            "publish.url_base must be an http(s):// or file:// address, got '{}'",
            config.publish.url_base
        );
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, url_base: &str, provider: &str) -> PathBuf {
        let content = format!(
            r#"[db]
path = "{0}/data/edgar.sqlite"

[catalog]
root = "{0}/data"

[publish]
url_base = "{1}"

[companies]
path = "{0}/config/companies.toml"

[embedding]
provider = "{2}"

[server]
bind = "127.0.0.1:8642"
"#,
            dir.display(),
            url_base,
            provider
        );
        let path = dir.join("edgar.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_valid_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(tmp.path(), "https://filings.example.com", "disabled");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.max_tokens, 512);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.server.bind, "127.0.0.1:8642");
    }

    #[test]
    fn rejects_bare_url_base() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(tmp.path(), "filings.example.com", "disabled");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("publish.url_base"));
    }

    #[test]
    fn rejects_openai_without_model() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(tmp.path(), "file:///srv/filings", "openai");
        assert!(load_config(&path).is_err());
    }
}
