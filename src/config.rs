use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub questions_file: PathBuf,
    pub results_file: PathBuf,
    /// Leaderboard size; zero shows everyone.
    pub leaders_top_n: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let leaders_top_n = match lookup("LEADERS_TOP_N") {
            None => 10,
            Some(value) => match value.trim().parse::<i64>() {
                Ok(n) => usize::try_from(n).unwrap_or(0),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        name: "LEADERS_TOP_N",
                        value,
                    })
                }
            },
        };

        Ok(Self {
            token,
            questions_file: lookup("QUESTIONS_FILE")
                .unwrap_or_else(|| "questions.json".to_string())
                .into(),
            results_file: lookup("RESULTS_FILE")
                .unwrap_or_else(|| "results.json".to_string())
                .into(),
            leaders_top_n,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.questions_file, PathBuf::from("questions.json"));
        assert_eq!(config.results_file, PathBuf::from("results.json"));
        assert_eq!(config.leaders_top_n, 10);
    }

    #[test]
    fn token_is_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("BOT_TOKEN"));
        assert_eq!(
            config(&[("BOT_TOKEN", " ")]).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
    }

    #[test]
    fn leaders_limit() {
        let limit = |value: &str| {
            config(&[("BOT_TOKEN", "t"), ("LEADERS_TOP_N", value)]).map(|c| c.leaders_top_n)
        };
        assert_eq!(limit("3"), Ok(3));
        assert_eq!(limit("0"), Ok(0));
        assert_eq!(limit("-5"), Ok(0));
        assert!(matches!(limit("many"), Err(ConfigError::Invalid { .. })));
    }
}
