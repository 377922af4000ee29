//! INI file configuration adapter.

use crate::domain::error::ScalptraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScalptraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| ScalptraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    /// Section names present in the file, sorted.
    pub fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[signals]
variant = mean_reversion

[lifecycle]
take_profit_r = 1.5, 2.5, 4.0
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("signals", "variant"),
            Some("mean_reversion".to_string())
        );
        assert_eq!(
            adapter.get_string("lifecycle", "take_profit_r"),
            Some("1.5, 2.5, 4.0".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[risk]\nleverage = 5\n").unwrap();
        assert_eq!(adapter.get_string("risk", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_double_parses_or_defaults() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\ninitial_capital = 25000.5\nfee_pct = not_a_number\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_capital", 0.0), 25000.5);
        assert_eq!(adapter.get_double("backtest", "missing", 99.9), 99.9);
        assert_eq!(adapter.get_double("backtest", "fee_pct", 0.04), 0.04);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[risk]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("risk", "a", false));
        assert!(adapter.get_bool("risk", "b", false));
        assert!(adapter.get_bool("risk", "c", false));
        assert!(!adapter.get_bool("risk", "d", true));
        assert!(!adapter.get_bool("risk", "e", true));
        assert!(!adapter.get_bool("risk", "f", true));
        assert!(adapter.get_bool("risk", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[indicators]\nema_fast = 9\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("indicators", "ema_fast"), Some("9".to_string()));
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, ScalptraderError::ConfigParse { ref file, .. } if file.contains("config.ini")));
        assert!(err.is_configuration());
    }

    #[test]
    fn lists_sections() {
        let adapter =
            FileConfigAdapter::from_string("[risk]\nleverage = 3\n[indicators]\nrsi_period = 7\n")
                .unwrap();
        assert_eq!(adapter.sections(), vec!["indicators", "risk"]);
    }
}
