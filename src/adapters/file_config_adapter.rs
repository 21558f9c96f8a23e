//! INI file configuration adapter.

use crate::domain::config_validation::parse_bool;
use crate::domain::error::ScantraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScantraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| ScantraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ScantraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ScantraderError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Apply a `section.key=value` override on top of the loaded file.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ScantraderError> {
        let invalid = |reason: &str| ScantraderError::ConfigInvalid {
            section: "--set".into(),
            key: spec.to_string(),
            reason: reason.to_string(),
        };

        let (path, value) = spec
            .split_once('=')
            .ok_or_else(|| invalid("expected section.key=value"))?;
        let (section, key) = path
            .trim()
            .split_once('.')
            .ok_or_else(|| invalid("expected section.key=value"))?;
        if section.is_empty() || key.is_empty() {
            return Err(invalid("empty section or key"));
        }

        self.config
            .set(section, key, Some(value.trim().to_string()));
        Ok(())
    }

    pub fn apply_overrides<S: AsRef<str>>(&mut self, specs: &[S]) -> Result<(), ScantraderError> {
        specs.iter().try_for_each(|s| self.apply_override(s.as_ref()))
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
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
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(default)
    }
}
