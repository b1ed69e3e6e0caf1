use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// HTTP server settings
    pub server: ServerConfig,

    /// Model endpoint settings
    pub gateway: GatewayConfig,

    /// Eligibility filtering for uploaded projects
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig
{
    pub host: String,
    pub port: u16,
    /// Upper bound on an uploaded archive, in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig
{
    /// Model identifier on the generative-language endpoint
    pub model: String,
    /// Outbound request timeout; model latency on large bundles is slow
    pub timeout_secs: u64,
    /// Bounded retry on transport failures
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig
{
    /// Extensions (with leading dot) eligible for bundling
    pub allow_extensions: Vec<String>,
    /// Exact filenames always eligible (dotfiles, extensionless)
    pub allow_filenames: Vec<String>,
    /// Exact filenames never eligible; beats both allow lists
    pub deny_filenames: Vec<String>,
    /// Directory names pruned entirely
    pub skip_dirs: Vec<String>,
}

impl Default for ServerConfig
{
    fn default() -> Self
    {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for GatewayConfig
{
    fn default() -> Self
    {
        Self {
            model: "gemini-1.5-flash".to_string(),
            timeout_secs: 300,
            max_attempts: 3,
            retry_delay_secs: 2,
        }
    }
}

impl Default for FilterConfig
{
    fn default() -> Self
    {
        let owned = |items: &[&str]| {
            items
                .iter()
                .map(|s| s.to_string())
                .collect()
        };

        Self {
            allow_extensions: owned(&[
                ".js", ".ts", ".jsx", ".tsx", ".py", ".html", ".css", ".scss", ".less", ".json",
                ".xml", ".yaml", ".yml", ".md", ".txt", ".java", ".c", ".cpp", ".h", ".hpp",
                ".cs", ".php", ".rb", ".go", ".swift", ".kt", ".kts", ".dart", ".rs", ".sh",
                ".pl", ".lua", ".sql", ".r", ".m", ".scala", ".groovy", ".vue",
            ]),
            allow_filenames: owned(&[".env", ".gitignore", "dockerfile", "procfile", "readme.md"]),
            deny_filenames: owned(&["package-lock.json", "yarn.lock", "pnpm-lock.yaml"]),
            skip_dirs: owned(&["node_modules", ".git"]),
        }
    }
}

pub fn load_config() -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["zipfix.toml", ".zipfix.toml"];

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with ZIPFIX_ prefix
    builder = builder.add_source(
        config::Environment::with_prefix("ZIPFIX")
            .separator("_")
            .ignore_empty(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("zipfix.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_cover_the_fixed_lists()
    {
        let cfg = FilterConfig::default();

        assert!(cfg.allow_extensions.len() > 30);
        assert!(
            cfg.allow_filenames
                .contains(&".env".to_string())
        );
        assert!(
            cfg.deny_filenames
                .contains(&"package-lock.json".to_string())
        );
        assert!(
            cfg.skip_dirs
                .contains(&"node_modules".to_string())
        );
    }

    #[test]
    fn default_config_survives_a_toml_round_trip()
    {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();

        assert_eq!(back.server.port, config.server.port);
        assert_eq!(back.gateway.model, config.gateway.model);
        assert_eq!(back.filter.allow_extensions, config.filter.allow_extensions);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults()
    {
        let back: Config = toml::from_str("[server]\nport = 8080\n").unwrap();

        assert_eq!(back.server.port, 8080);
        assert_eq!(back.server.host, "127.0.0.1");
        assert_eq!(back.gateway.max_attempts, 3);
    }
}
