//! Persisted number-formatting preferences.
//!
//! Settings live under a single key in a client-local key-value store. Loading never fails:
//! anything unreadable or out of range is discarded and replaced by the defaults.

use crate::error::{ErrorCode, Result, SplitterError};
use crate::rounding::{RoundingPrecision, RoundingSettings};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SETTINGS_KEY: &str = "app-settings";
pub const MAX_DECIMAL_PLACES: u8 = 6;

const LEGACY_LOCALE_FIELD: &str = "locale";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum ThousandsSeparator {
    #[default]
    Comma,
    Period,
    Apostrophe,
    Space,
}

impl ThousandsSeparator {
    pub fn as_char(&self) -> char {
        match self {
            ThousandsSeparator::Comma => ',',
            ThousandsSeparator::Period => '.',
            ThousandsSeparator::Apostrophe => '\'',
            ThousandsSeparator::Space => ' ',
        }
    }

    /// The decimal mark paired with this separator.
    pub fn decimal_mark(&self) -> char {
        match self {
            ThousandsSeparator::Period => ',',
            _ => '.',
        }
    }
}

impl TryFrom<String> for ThousandsSeparator {
    type Error = SplitterError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "," => Ok(ThousandsSeparator::Comma),
            "." => Ok(ThousandsSeparator::Period),
            "'" => Ok(ThousandsSeparator::Apostrophe),
            " " => Ok(ThousandsSeparator::Space),
            other => Err(SplitterError::input(
                ErrorCode::InvalidSettings,
                format!("Unsupported thousands separator {:?}", other),
            )),
        }
    }
}

impl From<ThousandsSeparator> for String {
    fn from(separator: ThousandsSeparator) -> Self {
        separator.as_char().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub decimal_places: u8,
    pub rounding_precision: RoundingPrecision,
    pub thousands_separator: ThousandsSeparator,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            rounding_precision: RoundingPrecision::Cent,
            thousands_separator: ThousandsSeparator::Comma,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<()> {
        if self.decimal_places > MAX_DECIMAL_PLACES {
            return Err(SplitterError::input(
                ErrorCode::InvalidSettings,
                format!(
                    "Decimal places {} out of range: must be between 0 and {}",
                    self.decimal_places, MAX_DECIMAL_PLACES
                ),
            ));
        }
        Ok(())
    }

    pub fn rounding(&self) -> RoundingSettings {
        RoundingSettings::new(self.rounding_precision)
    }

    /// Returns a copy with every `Some` field of `update` applied.
    pub fn merged(&self, update: &SettingsUpdate) -> Self {
        Self {
            decimal_places: update.decimal_places.unwrap_or(self.decimal_places),
            rounding_precision: update.rounding_precision.unwrap_or(self.rounding_precision),
            thousands_separator: update.thousands_separator.unwrap_or(self.thousands_separator),
        }
    }

    /// Parses a stored entry, dropping a legacy locale field. Missing fields take their defaults.
    pub fn from_stored(raw: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        let object = value.as_object_mut().ok_or_else(|| {
            SplitterError::input(ErrorCode::InvalidSettings, "Stored settings are not an object")
        })?;
        object.remove(LEGACY_LOCALE_FIELD);

        let mut merged = serde_json::to_value(AppSettings::default())?;
        if let Some(target) = merged.as_object_mut() {
            for (key, field) in object.iter() {
                if target.contains_key(key) {
                    target.insert(key.clone(), field.clone());
                }
            }
        }

        let settings: AppSettings = serde_json::from_value(merged)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// A partial settings change; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding_precision: Option<RoundingPrecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thousands_separator: Option<ThousandsSeparator>,
}

/// A client-local key-value store.
pub trait SettingsBackend {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value.to_string());
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl SettingsBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SettingsBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = tmp_path(&path);
        write_file(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Owns the current settings and their persisted copy.
pub struct SettingsStore<B: SettingsBackend> {
    backend: B,
    current: AppSettings,
}

impl<B: SettingsBackend> SettingsStore<B> {
    pub fn open(backend: B) -> Self {
        let mut store = Self {
            backend,
            current: AppSettings::default(),
        };
        store.load();
        store
    }

    /// Reloads from the backend, falling back to defaults and clearing the entry if it is invalid.
    pub fn load(&mut self) -> AppSettings {
        let raw = match self.backend.read(SETTINGS_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read stored settings, using defaults: {}", e);
                None
            }
        };

        self.current = match raw {
            None => {
                debug!("No stored settings, using defaults");
                AppSettings::default()
            }
            Some(raw) => match AppSettings::from_stored(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Discarding invalid stored settings: {}", e);
                    if let Err(e) = self.backend.remove(SETTINGS_KEY) {
                        warn!("Could not clear invalid settings entry: {}", e);
                    }
                    AppSettings::default()
                }
            },
        };

        self.current
    }

    /// Merges `update` over the current settings and persists the result.
    pub fn save(&mut self, update: SettingsUpdate) -> Result<()> {
        let next = self.current.merged(&update);
        next.validate()?;

        // AppSettings has no locale field, so serializing it drops any legacy one
        let json = serde_json::to_string(&next)?;
        self.backend.write(SETTINGS_KEY, &json)?;
        self.current = next;

        debug!("Saved settings: {}", json);
        Ok(())
    }

    pub fn settings(&self) -> &AppSettings {
        &self.current
    }

    pub fn rounding(&self) -> RoundingSettings {
        self.current.rounding()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
