use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context};

use crate::engine::DayZone;

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the process-local store is used.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,

    pub day_zone: DayZone,
    pub streak_lookback_days: usize,
    pub max_history_days: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let streak_lookback_days: usize = parse_or(&get, "STREAK_LOOKBACK_DAYS", 30)?;
        if streak_lookback_days == 0 {
            return Err(anyhow!("STREAK_LOOKBACK_DAYS must be at least 1"));
        }

        let day_zone = match get("DAY_ZONE") {
            Some(raw) => raw
                .parse::<DayZone>()
                .map_err(|e| anyhow!("DAY_ZONE: {e}"))?,
            None => DayZone::Local,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 20)?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PORT", 8080)?,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            cors_extra_origins: get("CORS_EXTRA_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            jwt_secret: get("JWT_SECRET").context("JWT_SECRET must be set")?,

            day_zone,
            streak_lookback_days,
            max_history_days: parse_or(&get, "MAX_HISTORY_DAYS", 366)?,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} must be a number, got '{raw}': {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::FixedOffset;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.database_max_connections, 20);
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.frontend_url, "http://localhost:3000");
        assert!(cfg.cors_extra_origins.is_empty());
        assert_eq!(cfg.day_zone, DayZone::Local);
        assert_eq!(cfg.streak_lookback_days, 30);
        assert_eq!(cfg.max_history_days, 366);
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("JWT_SECRET", "  ")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/logbook"),
            ("PORT", "9000"),
            ("DAY_ZONE", "+02:00"),
            ("STREAK_LOOKBACK_DAYS", "60"),
            ("CORS_EXTRA_ORIGINS", "http://10.0.0.5:3000, ,http://box.lan"),
        ])
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/logbook"));
        assert_eq!(cfg.port, 9000);
        assert_eq!(
            cfg.day_zone,
            DayZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap())
        );
        assert_eq!(cfg.streak_lookback_days, 60);
        assert_eq!(
            cfg.cors_extra_origins,
            vec!["http://10.0.0.5:3000".to_string(), "http://box.lan".to_string()]
        );
    }

    #[test]
    fn malformed_values_fail() {
        assert!(config(&[("JWT_SECRET", "s"), ("PORT", "eighty")]).is_err());
        assert!(config(&[("JWT_SECRET", "s"), ("DAY_ZONE", "mars")]).is_err());
        assert!(config(&[("JWT_SECRET", "s"), ("STREAK_LOOKBACK_DAYS", "0")]).is_err());
    }
}
