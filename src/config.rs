use serde::Deserialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::search::KEYWORD_LIMIT;

/// Runtime settings, read from an optional config file and `RELMAP_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database file. `None` keeps everything in memory.
    pub database: Option<PathBuf>,
    /// Reuse prepared statements across calls.
    pub cache_statements: bool,
    /// Upper bound on ids returned by a keyword query.
    pub keyword_limit: usize,
    /// Filter directive handed to the tracing subscriber, e.g. `"relmap=debug"`.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            cache_statements: true,
            keyword_limit: KEYWORD_LIMIT,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Layers the file at `path` (if any, and if it exists) and then the environment over the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("RELMAP"))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Some("does_not_exist_relmap")).expect("settings");
        assert!(settings.cache_statements);
        assert_eq!(settings.keyword_limit, KEYWORD_LIMIT);
        assert!(settings.database.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let path = std::env::temp_dir().join("relmap_settings_test.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "cache_statements = false\nkeyword_limit = 10\ndatabase = \"data.db\"").expect("write");
        drop(file);
        let settings = Settings::load(path.to_str()).expect("settings");
        assert!(!settings.cache_statements);
        assert_eq!(settings.keyword_limit, 10);
        assert_eq!(settings.database, Some(PathBuf::from("data.db")));
        assert_eq!(settings.log_filter, "info");
        let _ = std::fs::remove_file(&path);
    }
}
