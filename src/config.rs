use crate::models::Viewport;
use eyre::Result;
use serde_json::{Map, Value};
use std::time::Duration;
use std::{fs, path::PathBuf};

/// Every delay the overlay controller uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    pub poll_interval: Duration,
    pub mutation_debounce: Duration,
    pub address_poll: Duration,
    pub address_settle: Duration,
    pub media_debounce: Duration,
    pub hold_threshold: Duration,
    pub feedback_lifetime: Duration,
    pub message_lifetime: Duration,
    pub countdown_seconds: u32,
    pub countdown_tick: Duration,
    pub prompt_ceiling: Duration,
    pub navigation_fallback: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            mutation_debounce: Duration::from_millis(100),
            address_poll: Duration::from_secs(1),
            address_settle: Duration::from_secs(1),
            media_debounce: Duration::from_millis(500),
            hold_threshold: Duration::from_millis(800),
            feedback_lifetime: Duration::from_secs(2),
            message_lifetime: Duration::from_secs(3),
            countdown_seconds: 5,
            countdown_tick: Duration::from_secs(1),
            prompt_ceiling: Duration::from_secs(6),
            navigation_fallback: Duration::from_millis(100),
        }
    }
}

const TIMING_KEYS: &[&str] = &[
    "poll_interval_ms",
    "mutation_debounce_ms",
    "address_poll_ms",
    "address_settle_ms",
    "media_debounce_ms",
    "hold_threshold_ms",
    "feedback_lifetime_ms",
    "message_lifetime_ms",
    "countdown_tick_ms",
    "prompt_ceiling_ms",
    "navigation_fallback_ms",
];

impl Timings {
    fn slot(&mut self, key: &str) -> Option<&mut Duration> {
        Some(match key {
            "poll_interval_ms" => &mut self.poll_interval,
            "mutation_debounce_ms" => &mut self.mutation_debounce,
            "address_poll_ms" => &mut self.address_poll,
            "address_settle_ms" => &mut self.address_settle,
            "media_debounce_ms" => &mut self.media_debounce,
            "hold_threshold_ms" => &mut self.hold_threshold,
            "feedback_lifetime_ms" => &mut self.feedback_lifetime,
            "message_lifetime_ms" => &mut self.message_lifetime,
            "countdown_tick_ms" => &mut self.countdown_tick,
            "prompt_ceiling_ms" => &mut self.prompt_ceiling,
            "navigation_fallback_ms" => &mut self.navigation_fallback,
            _ => return None,
        })
    }

    fn merge_map(&mut self, map: &Map<String, Value>) {
        for key in TIMING_KEYS {
            if let Some(ms) = map.get(*key).and_then(|v| v.as_u64()) {
                // Zero-length intervals would spin the scheduler.
                if ms > 0 {
                    if let Some(slot) = self.slot(key) {
                        *slot = Duration::from_millis(ms);
                    }
                }
            }
        }
        if let Some(val) = map.get("countdown_seconds").and_then(|v| v.as_u64()) {
            if let Ok(val) = u32::try_from(val) {
                if val > 0 {
                    self.countdown_seconds = val;
                }
            }
        }
    }

    fn to_value(&self) -> Value {
        let mut copy = *self;
        let mut map = Map::new();
        for key in TIMING_KEYS {
            if let Some(slot) = copy.slot(key) {
                map.insert(key.to_string(), Value::from(slot.as_millis() as u64));
            }
        }
        map.insert(
            "countdown_seconds".to_string(),
            Value::from(self.countdown_seconds),
        );
        Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    pub viewport: Viewport,
    pub timings: Timings,
    /// Duration given to videos of pages opened in the watch session.
    pub media_duration_secs: f64,
    pub extra_next_patterns: Vec<String>,
    filepath: PathBuf,
}

impl Config {
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        Self::load_from(prefix.join("configuration.json"))
    }

    /// Load configuration from a custom path, writing a default file when none exists.
    pub fn load_from(filepath: PathBuf) -> Result<Self> {
        let prefix = filepath
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::defaults(prefix.join("storage.db"), filepath.clone());

        if filepath.exists() {
            let config_str = fs::read_to_string(&filepath)?;
            if let Ok(user_config) = serde_json::from_str::<Value>(&config_str) {
                config.merge_value(&user_config);
            }
        } else {
            config.save()?;
        }

        Ok(config)
    }

    fn defaults(storage_path: PathBuf, filepath: PathBuf) -> Self {
        Self {
            storage_path,
            viewport: Viewport::default(),
            timings: Timings::default(),
            media_duration_secs: 24.0 * 60.0,
            extra_next_patterns: Vec::new(),
            filepath,
        }
    }

    /// Defaults rooted at `prefix`, never touching the filesystem.
    pub fn in_dir(prefix: PathBuf) -> Self {
        Self::defaults(prefix.join("storage.db"), prefix.join("configuration.json"))
    }

    fn merge_value(&mut self, user_config: &Value) {
        if let Some(storage) = user_config.get("Storage").and_then(|v| v.as_object()) {
            if let Some(val) = storage.get("path").and_then(|v| v.as_str()) {
                self.storage_path = PathBuf::from(val);
            }
        }
        if let Some(viewport) = user_config.get("Viewport").and_then(|v| v.as_object()) {
            if let Some(val) = viewport.get("width").and_then(|v| v.as_f64()) {
                self.viewport.width = val;
            }
            if let Some(val) = viewport.get("height").and_then(|v| v.as_f64()) {
                self.viewport.height = val;
            }
        }
        if let Some(timings) = user_config.get("Timings").and_then(|v| v.as_object()) {
            self.timings.merge_map(timings);
        }
        if let Some(session) = user_config.get("Session").and_then(|v| v.as_object()) {
            if let Some(val) = session.get("media_duration_secs").and_then(|v| v.as_f64()) {
                if val > 0.0 {
                    self.media_duration_secs = val;
                }
            }
        }
        if let Some(patterns) = user_config.get("NextPatterns").and_then(|v| v.as_array()) {
            self.extra_next_patterns = patterns
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "Storage": { "path": self.storage_path },
            "Viewport": { "width": self.viewport.width, "height": self.viewport.height },
            "Timings": self.timings.to_value(),
            "Session": { "media_duration_secs": self.media_duration_secs },
            "NextPatterns": self.extra_next_patterns,
        })
    }

    /// Get the configuration file path
    pub fn filepath(&self) -> &PathBuf {
        &self.filepath
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self.to_value())?;
        if let Some(parent) = self.filepath.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.filepath, config_str)?;
        Ok(())
    }
}

pub fn get_app_data_prefix() -> Result<PathBuf> {
    if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(config_home).join("skipnext"));
    } else if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home.clone()).join(".config").join("skipnext");
        if path.exists() {
            return Ok(path);
        } else {
            return Ok(PathBuf::from(home).join(".skipnext"));
        }
    } else if let Some(user_profile) = std::env::var_os("USERPROFILE") {
        return Ok(PathBuf::from(user_profile).join(".skipnext"));
    }

    Err(eyre::eyre!("Could not determine application data directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};
    use tempfile::tempdir;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex")
    }

    #[test]
    fn test_config_new_writes_defaults() -> Result<()> {
        let _env_lock = lock_env();
        let original_xdg = env::var_os("XDG_CONFIG_HOME");
        let dir = tempdir()?;
        unsafe {
            env::set_var("XDG_CONFIG_HOME", dir.path());
        }

        let config = Config::new()?;
        let expected = dir.path().join("skipnext").join("configuration.json");
        assert_eq!(config.filepath(), &expected);
        assert!(expected.exists());
        assert_eq!(config.storage_path, dir.path().join("skipnext").join("storage.db"));
        assert_eq!(config.timings, Timings::default());

        unsafe {
            match original_xdg {
                Some(xdg) => env::set_var("XDG_CONFIG_HOME", xdg),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }
        Ok(())
    }

    #[test]
    fn test_partial_config_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("configuration.json");
        let config_json = serde_json::json!({
            "Viewport": { "height": 1080 },
            "Timings": {
                "poll_interval_ms": 500,
                "hold_threshold_ms": "long",
                "mutation_debounce_ms": 0
            },
            "NextPatterns": [".watch-next a", 3]
        });
        fs::write(&path, serde_json::to_string(&config_json)?)?;

        let config = Config::load_from(path)?;
        assert_eq!(config.viewport.height, 1080.0);
        assert_eq!(config.viewport.width, Viewport::default().width);
        assert_eq!(config.timings.poll_interval, Duration::from_millis(500));
        assert_eq!(config.timings.hold_threshold, Duration::from_millis(800));
        assert_eq!(config.timings.mutation_debounce, Duration::from_millis(100));
        assert_eq!(config.extra_next_patterns, vec![".watch-next a".to_string()]);
        Ok(())
    }

    #[test]
    fn test_invalid_json_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("configuration.json");
        fs::write(&path, "{ not json")?;
        let config = Config::load_from(path)?;
        assert_eq!(config.timings, Timings::default());
        assert!(config.extra_next_patterns.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempdir()?;
        let mut config = Config::in_dir(dir.path().to_path_buf());
        config.timings.countdown_seconds = 9;
        config.media_duration_secs = 90.0;
        config.save()?;

        let reloaded = Config::load_from(config.filepath().clone())?;
        assert_eq!(reloaded.timings.countdown_seconds, 9);
        assert_eq!(reloaded.media_duration_secs, 90.0);
        assert_eq!(reloaded.storage_path, config.storage_path);
        Ok(())
    }
}
