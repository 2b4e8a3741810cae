use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const DAY_MS: u64 = 86_400_000;
const MINUTE_MS: u64 = 60_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub rest_base_url: String,
    pub product_code: String,
    pub request_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://api.bitflyer.com".to_string(),
            product_code: "BTC_JPY".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Target spacing between poll attempts, e.g. "2s".
    pub fetch_interval: String,
    /// Bar size, e.g. "1m". Must be whole minutes and divide a day.
    pub window: String,
    pub ohlc_path: PathBuf,
    pub raw_ticks_path: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_interval: "2s".to_string(),
            window: "1m".to_string(),
            ohlc_path: PathBuf::from("ohlc_1min_realtime.csv"),
            raw_ticks_path: PathBuf::from("raw_ticks_backup.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Parse an interval string (e.g. "2s", "1m", "4h", "1d") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    // Split on a char boundary; the suffix may be any character.
    let split = s.char_indices().last().map_or(0, |(i, _)| i);
    if split == 0 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, suffix) = s.split_at(split);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_ms = match suffix {
        "s" => 1_000,
        "m" => MINUTE_MS,
        "h" => 3_600_000,
        "d" => DAY_MS,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl CollectorConfig {
    pub fn cadence(&self) -> Result<Duration> {
        parse_interval_ms(&self.fetch_interval).map(Duration::from_millis)
    }

    /// Window length. Windows are floored from the epoch, so the length has to
    /// be whole minutes that tile a day for boundaries to land on the clock.
    pub fn window(&self) -> Result<Duration> {
        let ms = parse_interval_ms(&self.window)?;
        if ms % MINUTE_MS != 0 {
            bail!(
                "invalid window '{}': must be a whole number of minutes",
                self.window
            );
        }
        if DAY_MS % ms != 0 {
            bail!("invalid window '{}': must divide one day evenly", self.window);
        }
        Ok(Duration::from_millis(ms))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("OHLC_COLLECTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::load_from_path(&config_path)?;

        if let Ok(code) = std::env::var("OHLC_PRODUCT_CODE") {
            if !code.trim().is_empty() {
                config.source.product_code = code.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.product_code.trim().is_empty() {
            bail!("source.product_code must not be empty");
        }
        self.collector
            .cadence()
            .context("collector.fetch_interval is invalid")?;
        self.collector
            .window()
            .context("collector.window is invalid")?;
        if self.collector.ohlc_path == self.collector.raw_ticks_path {
            bail!("collector.ohlc_path and collector.raw_ticks_path must differ");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_toml() {
        let toml_str = r#"
[source]
rest_base_url = "https://api.bitflyer.com"
product_code = "ETH_JPY"
request_timeout_ms = 5000

[collector]
fetch_interval = "2s"
window = "5m"
ohlc_path = "data/ohlc_5min.csv"
raw_ticks_path = "data/raw_ticks.csv"

[logging]
level = "debug"
json = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.source.product_code, "ETH_JPY");
        assert_eq!(config.source.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.collector.cadence().unwrap(), Duration::from_secs(2));
        assert_eq!(config.collector.window().unwrap(), Duration::from_secs(300));
        assert_eq!(config.collector.ohlc_path, PathBuf::from("data/ohlc_5min.csv"));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.source.product_code, "BTC_JPY");
        assert_eq!(config.collector.fetch_interval, "2s");
        assert_eq!(config.collector.window, "1m");
        assert_eq!(
            config.collector.raw_ticks_path,
            PathBuf::from("raw_ticks_backup.csv")
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_interval_valid() {
        assert_eq!(parse_interval_ms("2s").unwrap(), 2_000);
        assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
        assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_ms("1d").unwrap(), 86_400_000);
    }

    #[test]
    fn parse_interval_rejects_invalid_inputs() {
        assert!(parse_interval_ms("").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("1x").is_err());
        assert!(parse_interval_ms("1M").is_err());
    }

    #[test]
    fn parse_interval_rejects_multibyte_suffix_without_panicking() {
        assert!(parse_interval_ms("1é").is_err());
        assert!(parse_interval_ms("é").is_err());
        assert!(parse_interval_ms("10秒").is_err());
        assert!(parse_interval_ms("é1m").is_err());
    }

    #[test]
    fn validate_reports_multibyte_window_as_config_error() {
        let mut config: Config = toml::from_str("").unwrap();
        config.collector.window = "1é".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("collector.window is invalid"));
    }
}
