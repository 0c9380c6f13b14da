use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const START_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub db: DbConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    pub index: IndexConfig,
}

/// Run metadata consumed by the external scheduler.
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub name: String,
    pub owner: String,
    pub start_date: String,
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default)]
    pub catchup: bool,
}

fn default_schedule() -> String {
    "30 6 * * *".to_string()
}

impl PipelineConfig {
    pub fn start(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.start_date, START_DATE_FORMAT).with_context(|| {
            format!(
                "pipeline.start_date '{}' must look like 2024-07-10T06:30:00",
                self.start_date
            )
        })
    }

    /// Whether a run triggered at `now` is on or after the start date.
    pub fn is_eligible(&self, now: NaiveDateTime) -> Result<bool> {
        Ok(now >= self.start()?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    pub table: String,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}

impl DbConfig {
    /// Connection string for the relational store.
    ///
    /// `url` wins when set. Otherwise a Postgres URL is assembled from the
    /// individual fields, reading the password from `ETL_DB_PASSWORD` when
    /// the config file leaves it out.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let password = match &self.password {
            Some(p) => Some(p.clone()),
            None => std::env::var("ETL_DB_PASSWORD").ok(),
        };

        let mut url = url::Url::parse(&format!(
            "postgres://{}:{}/{}",
            self.host, self.port, self.database
        ))
        .with_context(|| format!("Invalid database host '{}'", self.host))?;
        if !self.username.is_empty() {
            url.set_username(&self.username)
                .map_err(|_| anyhow::anyhow!("Cannot set database username"))?;
        }
        if let Some(password) = password {
            url.set_password(Some(&password))
                .map_err(|_| anyhow::anyhow!("Cannot set database password"))?;
        }
        Ok(url.to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub raw_snapshot: PathBuf,
    pub clean_snapshot: PathBuf,
}

/// Column roles for the cleaning stage.
///
/// Names refer to columns after name normalisation.
#[derive(Debug, Deserialize, Clone)]
pub struct CleaningConfig {
    #[serde(default = "default_purchase_flag_column")]
    pub purchase_flag_column: String,
    #[serde(default = "default_play_time_column")]
    pub play_time_column: String,
    #[serde(default = "default_acronyms")]
    pub acronyms: Vec<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            purchase_flag_column: default_purchase_flag_column(),
            play_time_column: default_play_time_column(),
            acronyms: default_acronyms(),
            decimals: default_decimals(),
        }
    }
}

fn default_purchase_flag_column() -> String {
    "in_game_purchases".to_string()
}
fn default_play_time_column() -> String {
    "play_time_hours".to_string()
}
fn default_acronyms() -> Vec<String> {
    vec!["ID".to_string()]
}
fn default_decimals() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub purge_stale: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.pipeline.name.trim().is_empty() {
        bail!("pipeline.name must not be empty");
    }
    config.pipeline.start()?;

    if config.db.table.trim().is_empty() {
        bail!("db.table must not be empty");
    }
    if let Some(url) = &config.db.url {
        let supported = ["postgres://", "postgresql://", "sqlite:"];
        if !supported.iter().any(|scheme| url.starts_with(scheme)) {
            bail!(
                "db.url must use postgres://, postgresql:// or sqlite: (got '{}')",
                url
            );
        }
    } else if config.db.database.trim().is_empty() {
        bail!("db.database must be set when db.url is not");
    }

    // Validate cleaning
    let cleaning = &config.cleaning;
    if cleaning.decimals > 10 {
        bail!("cleaning.decimals must be <= 10");
    }
    if cleaning.purchase_flag_column == cleaning.play_time_column {
        bail!("cleaning.purchase_flag_column and cleaning.play_time_column must differ");
    }
    for acronym in &cleaning.acronyms {
        if acronym.len() < 2 || !acronym.chars().all(|c| c.is_ascii_uppercase()) {
            bail!(
                "cleaning.acronyms entries must be 2+ upper-case letters (got '{}')",
                acronym
            );
        }
    }

    // Validate index
    if config.index.name.trim().is_empty() {
        bail!("index.name must not be empty");
    }
    if !(config.index.url.starts_with("http://") || config.index.url.starts_with("https://")) {
        bail!(
            "index.url must start with http:// or https:// (got '{}')",
            config.index.url
        );
    }

    Ok(())
}
