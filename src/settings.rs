use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

use crate::feed::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_CONFIG_FILE: &str = "apuesta";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub database_url: Option<String>,
    pub port: u16,
    pub commission_rate: Decimal,
    pub accept_window_secs: u32,
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub admins: Vec<String>,
}
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}
impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 8081,
            commission_rate: dec!(0.05),
            accept_window_secs: 120,
            sweep_interval_secs: 300,
            feed: FeedSettings::default(),
            admins: vec![],
        }
    }
}
impl Settings {
    /// Reads defaults, then the config file, then `APUESTA_*` environment variables.
    ///
    /// A missing default file is fine, an explicitly named one has to exist.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .set_default("port", 8081)?
            .set_default("commission_rate", "0.05")?
            .set_default("accept_window_secs", 120)?
            .set_default("sweep_interval_secs", 300)?
            .set_default("feed.timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("APUESTA")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("admins")
                    .try_parsing(true),
            )
            .build()
            .context("couldn't read configuration")?;
        let settings: Settings = settings
            .try_deserialize()
            .context("invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }
    fn validate(&self) -> Result<()> {
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            anyhow::bail!("commission_rate must be in [0, 1), got {}", self.commission_rate)
        }
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be positive")
        }
        Ok(())
    }
    pub fn accept_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.accept_window_secs.into())
    }
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("apuesta-test-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "port = 9000\ncommission_rate = 0.1\nadmins = [\"root\"]\n\n[feed]\nurl = \"http://localhost/odds\""
        )
        .unwrap();
        let settings = Settings::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.commission_rate, dec!(0.1));
        assert_eq!(settings.accept_window_secs, 120);
        assert_eq!(settings.admins, vec!["root".to_string()]);
        assert_eq!(settings.feed.url.as_deref(), Some("http://localhost/odds"));
        assert_eq!(settings.feed.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn named_file_must_exist() {
        assert!(Settings::load(Some("/nonexistent/apuesta.toml")).is_err());
    }

    #[test]
    fn rejects_silly_rates() {
        let settings = Settings {
            commission_rate: dec!(1.5),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }
}
