// ABOUTME: Immutable run configuration for the listing synchronizer
// ABOUTME: Merges defaults, SUPERVISOR_OPTIONS, a config file and CLI overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable the add-on supervisor uses to hand over its options.
pub const SUPERVISOR_OPTIONS_ENV: &str = "SUPERVISOR_OPTIONS";

pub const DEFAULT_SEARCH_BASE_URL: &str =
    "https://www.finn.no/mobility/search/api/search/SEARCH_ID_CAR_MOBILE_HOME";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required database setting `{0}`")]
    MissingDatabaseSetting(&'static str),
    #[error("price_from ({from}) is greater than price_to ({to})")]
    InvertedPriceRange { from: u64, to: u64 },
    #[error("SUPERVISOR_OPTIONS is not a valid JSON object: {0}")]
    InvalidSupervisorOptions(String),
    #[error("invalid option value: {0}")]
    InvalidOption(#[from] serde_json::Error),
}

/// Sort order accepted by the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Relevance,
    PublishedDesc,
    PriceAsc,
    PriceDesc,
    YearAsc,
    #[default]
    YearDesc,
    MileageAsc,
    MileageDesc,
}

impl SortOrder {
    pub fn as_param(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "RELEVANCE",
            SortOrder::PublishedDesc => "PUBLISHED_DESC",
            SortOrder::PriceAsc => "PRICE_ASC",
            SortOrder::PriceDesc => "PRICE_DESC",
            SortOrder::YearAsc => "YEAR_ASC",
            SortOrder::YearDesc => "YEAR_DESC",
            SortOrder::MileageAsc => "MILEAGE_ASC",
            SortOrder::MileageDesc => "MILEAGE_DESC",
        }
    }
}

/// Search filters. A numeric threshold set to `None` is left out of the query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchCriteria {
    #[serde(default = "default_price_from")]
    pub price_from: Option<u64>,
    #[serde(default = "default_price_to")]
    pub price_to: Option<u64>,
    #[serde(default = "default_mileage_to")]
    pub mileage_to: Option<u64>,
    #[serde(default = "default_year_from")]
    pub year_from: Option<u64>,
    #[serde(default = "default_no_of_sleepers_from")]
    pub no_of_sleepers_from: Option<u64>,
    #[serde(default = "default_weight_to")]
    pub weight_to: Option<u64>,
    /// Location codes, e.g. `0.20003`.
    #[serde(default, deserialize_with = "one_or_many")]
    pub locations: Vec<String>,
    /// Category (`mobile_home_segment`) codes.
    #[serde(default, deserialize_with = "one_or_many")]
    pub mobile_home_segments: Vec<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            price_from: default_price_from(),
            price_to: default_price_to(),
            mileage_to: default_mileage_to(),
            year_from: default_year_from(),
            no_of_sleepers_from: default_no_of_sleepers_from(),
            weight_to: default_weight_to(),
            locations: Vec::new(),
            mobile_home_segments: Vec::new(),
            sort: SortOrder::default(),
        }
    }
}

fn default_price_from() -> Option<u64> {
    Some(300_000)
}
fn default_price_to() -> Option<u64> {
    Some(700_000)
}
fn default_mileage_to() -> Option<u64> {
    Some(122_000)
}
fn default_year_from() -> Option<u64> {
    Some(2006)
}
fn default_no_of_sleepers_from() -> Option<u64> {
    Some(4)
}
fn default_weight_to() -> Option<u64> {
    Some(3501)
}

/// Connection settings for the MySQL store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub port: u16,
    pub table: String,
}

impl DatabaseConfig {
    /// Connection description safe for logs.
    pub fn describe(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{} (table {})",
            self.user, self.host, self.port, self.name, self.table
        )
    }
}

/// Behaviour switches for a synchronisation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Append price changes to `prisendringer`.
    pub price_history: bool,
    /// Stamp `bobil_script_status.last_run` after a live run.
    pub record_last_run: bool,
    pub page_delay: Duration,
    pub request_timeout: Duration,
    pub search_base_url: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            price_history: true,
            record_last_run: true,
            page_delay: Duration::from_millis(default_page_delay_ms()),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
        }
    }
}

impl RunOptions {
    pub fn mode_label(&self) -> &'static str {
        if self.dry_run {
            "DRY RUN"
        } else {
            "LIVE"
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub criteria: SearchCriteria,
    pub run: RunOptions,
}

/// Flat option set as the add-on supervisor delivers it.
#[derive(Debug, Deserialize)]
struct AddonOptions {
    #[serde(default)]
    databasehost: String,
    #[serde(default)]
    databaseusername: String,
    #[serde(default)]
    databasepassword: String,
    #[serde(default)]
    databasename: String,
    #[serde(default = "default_port", deserialize_with = "port_number")]
    databaseport: u16,
    #[serde(default)]
    dry_run: bool,
    #[serde(default = "default_table")]
    table: String,
    #[serde(default = "enabled")]
    price_history: bool,
    #[serde(default = "enabled")]
    record_last_run: bool,
    #[serde(default = "default_page_delay_ms")]
    page_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_search_base_url")]
    search_base_url: String,
    #[serde(flatten)]
    criteria: SearchCriteria,
}

fn default_port() -> u16 {
    3306
}
fn default_table() -> String {
    "bobil".to_string()
}
fn enabled() -> bool {
    true
}
fn default_page_delay_ms() -> u64 {
    200
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_search_base_url() -> String {
    DEFAULT_SEARCH_BASE_URL.to_string()
}

/// Where configuration comes from, lowest precedence first.
#[derive(Debug, Default, Clone)]
pub struct ConfigSources {
    /// Raw JSON from `SUPERVISOR_OPTIONS`.
    pub supervisor_options: Option<String>,
    /// `.json` files are read as JSON, everything else as TOML.
    pub file: Option<PathBuf>,
    /// Option keys set on the command line or through `DB_*` variables.
    pub overrides: Map<String, Value>,
}

impl ConfigSources {
    /// Pick up `SUPERVISOR_OPTIONS` from the process environment.
    pub fn from_env() -> Self {
        Self {
            supervisor_options: std::env::var(SUPERVISOR_OPTIONS_ENV).ok(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: Option<PathBuf>) -> Self {
        self.file = path;
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.overrides.insert(key.to_string(), value.into());
    }
}

impl Config {
    /// Merge all sources and validate the result.
    pub fn load(sources: &ConfigSources) -> Result<Self> {
        let config = Self::resolve(sources)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge all sources without checking database settings, for commands
    /// that never connect.
    pub fn resolve(sources: &ConfigSources) -> Result<Self> {
        let mut merged = Map::new();

        if let Some(raw) = sources.supervisor_options.as_deref() {
            if !raw.trim().is_empty() {
                let parsed: Value = serde_json::from_str(raw)
                    .map_err(|e| ConfigError::InvalidSupervisorOptions(e.to_string()))?;
                match parsed {
                    Value::Object(map) => merged.extend(map),
                    other => {
                        return Err(ConfigError::InvalidSupervisorOptions(format!(
                            "expected an object, got {}",
                            other
                        ))
                        .into())
                    }
                }
            }
        }

        if let Some(path) = sources.file.as_deref() {
            merged.extend(read_config_file(path)?);
        }

        merged.extend(sources.overrides.clone());

        Ok(Self::from_options(Value::Object(merged))?)
    }

    fn from_options(options: Value) -> Result<Self, ConfigError> {
        let opts: AddonOptions = serde_json::from_value(options)?;
        Ok(Self {
            database: DatabaseConfig {
                host: opts.databasehost,
                user: opts.databaseusername,
                password: opts.databasepassword,
                name: opts.databasename,
                port: opts.databaseport,
                table: opts.table,
            },
            criteria: opts.criteria,
            run: RunOptions {
                dry_run: opts.dry_run,
                price_history: opts.price_history,
                record_last_run: opts.record_last_run,
                page_delay: Duration::from_millis(opts.page_delay_ms),
                request_timeout: Duration::from_secs(opts.request_timeout_secs),
                search_base_url: opts.search_base_url,
            },
        })
    }

    /// Database credentials are required; the price range must not be inverted.
    /// Anything else is left for the remote API to judge.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        for (key, value) in [
            ("databasehost", &db.host),
            ("databaseusername", &db.user),
            ("databasename", &db.name),
            ("table", &db.table),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingDatabaseSetting(key));
            }
        }

        if let (Some(from), Some(to)) = (self.criteria.price_from, self.criteria.price_to) {
            if from > to {
                return Err(ConfigError::InvertedPriceRange { from, to });
            }
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<Map<String, Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let value: Value = if is_json {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON config {:?}", path))?
    } else {
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML config {:?}", path))?
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Config file {:?} must contain a table of options", path),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Scalar>),
    One(Scalar),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value.into_string()],
        Some(OneOrMany::Many(values)) => values.into_iter().map(Scalar::into_string).collect(),
    };
    Ok(values
        .into_iter()
        .filter(|value| !value.trim().is_empty())
        .collect())
}

fn port_number<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Integer(port) => u16::try_from(port).map_err(serde::de::Error::custom),
        Scalar::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        Scalar::Float(_) => Err(serde::de::Error::custom("port must be an integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sources(options: Value) -> ConfigSources {
        ConfigSources {
            supervisor_options: Some(options.to_string()),
            ..ConfigSources::default()
        }
    }

    fn credentials() -> Value {
        json!({
            "databasehost": "db.local",
            "databaseusername": "finn",
            "databasepassword": "hemmelig",
            "databasename": "finn_no",
        })
    }

    #[test]
    fn test_defaults_match_addon_defaults() {
        let config = Config::load(&sources(credentials())).unwrap();
        assert_eq!(config.criteria, SearchCriteria::default());
        assert_eq!(config.criteria.price_from, Some(300_000));
        assert_eq!(config.criteria.weight_to, Some(3501));
        assert_eq!(config.criteria.sort, SortOrder::YearDesc);
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.table, "bobil");
        assert!(!config.run.dry_run);
        assert!(config.run.price_history);
        assert_eq!(config.run.page_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let mut options = credentials();
        options["databasehost"] = json!("");
        let err = Config::load(&sources(options)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingDatabaseSetting("databasehost"))
        ));
    }

    #[test]
    fn test_inverted_price_range_is_rejected() {
        let mut options = credentials();
        options["price_from"] = json!(800000);
        options["price_to"] = json!(500000);
        let err = Config::load(&sources(options)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvertedPriceRange {
                from: 800000,
                to: 500000
            })
        ));
    }

    #[test]
    fn test_other_nonsense_is_passed_through() {
        let mut options = credentials();
        options["year_from"] = json!(3000);
        options["no_of_sleepers_from"] = json!(0);
        let config = Config::load(&sources(options)).unwrap();
        assert_eq!(config.criteria.year_from, Some(3000));
        assert_eq!(config.criteria.no_of_sleepers_from, Some(0));
    }

    #[test]
    fn test_null_threshold_drops_filter() {
        let mut options = credentials();
        options["weight_to"] = Value::Null;
        let config = Config::load(&sources(options)).unwrap();
        assert_eq!(config.criteria.weight_to, None);
    }

    #[test]
    fn test_scalar_location_becomes_list() {
        let mut options = credentials();
        options["locations"] = json!("0.20003");
        options["mobile_home_segments"] = json!([3, "4"]);
        let config = Config::load(&sources(options)).unwrap();
        assert_eq!(config.criteria.locations, vec!["0.20003"]);
        assert_eq!(config.criteria.mobile_home_segments, vec!["3", "4"]);
    }

    #[test]
    fn test_port_as_string() {
        let mut options = credentials();
        options["databaseport"] = json!("3307");
        let config = Config::load(&sources(options)).unwrap();
        assert_eq!(config.database.port, 3307);
    }

    #[test]
    fn test_overrides_win() {
        let mut src = sources(credentials());
        src.set("dry_run", true);
        src.set("databasehost", "override.local");
        let config = Config::load(&src).unwrap();
        assert!(config.run.dry_run);
        assert_eq!(config.database.host, "override.local");
        assert_eq!(config.run.mode_label(), "DRY RUN");
    }

    #[test]
    fn test_resolve_skips_database_checks() {
        let src = sources(json!({ "databasehost": "db.local", "price_to": 650000 }));
        let config = Config::resolve(&src).unwrap();
        assert_eq!(config.database.host, "db.local");
        assert_eq!(config.database.user, "");
        assert_eq!(config.criteria.price_to, Some(650000));
        assert!(Config::load(&src).is_err());
    }

    #[test]
    fn test_invalid_supervisor_options() {
        let src = ConfigSources {
            supervisor_options: Some("not json".to_string()),
            ..ConfigSources::default()
        };
        let err = Config::load(&src).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidSupervisorOptions(_))
        ));
    }

    #[test]
    fn test_sort_parses_screaming_case() {
        let mut options = credentials();
        options["sort"] = json!("PRICE_ASC");
        let config = Config::load(&sources(options)).unwrap();
        assert_eq!(config.criteria.sort, SortOrder::PriceAsc);
        assert_eq!(config.criteria.sort.as_param(), "PRICE_ASC");
    }

    #[test]
    fn test_describe_hides_password() {
        let config = Config::load(&sources(credentials())).unwrap();
        let described = config.database.describe();
        assert!(!described.contains("hemmelig"));
        assert!(described.contains("finn@db.local:3306/finn_no"));
    }
}
