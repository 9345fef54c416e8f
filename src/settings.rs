use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Storage key the overlay settings live under.
pub const SETTINGS_KEY: &str = "skipNextSettings";

pub const SKIP_TIME_MIN: u32 = 30;
pub const SKIP_TIME_MAX: u32 = 180;
pub const SKIP_TIME_STEP: u32 = 5;
pub const SKIP_TIME_PRESETS: &[u32] = &[60, 85, 120, 150];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextBehavior {
    #[default]
    Auto,
    Manual,
}

impl NextBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextBehavior::Auto => "auto",
            NextBehavior::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(NextBehavior::Auto),
            "manual" => Some(NextBehavior::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for NextBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub skip_time: u32,
    pub next_behavior: NextBehavior,
    pub skip_button_enabled: bool,
    pub next_button_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skip_time: 85,
            next_behavior: NextBehavior::Auto,
            skip_button_enabled: true,
            next_button_enabled: true,
        }
    }
}

impl Settings {
    /// Shallow merge of a persisted record over `self`.
    ///
    /// Every field present with the expected JSON type wins; missing,
    /// unknown or mistyped fields leave the current value alone.
    pub fn merge_value(&mut self, persisted: &Value) {
        let Some(map) = persisted.as_object() else {
            return;
        };
        if let Some(val) = map.get("skipTime").and_then(|v| v.as_u64()) {
            if let Ok(val) = u32::try_from(val) {
                self.skip_time = val;
            }
        }
        if let Some(val) = map
            .get("nextBehavior")
            .and_then(|v| v.as_str())
            .and_then(NextBehavior::parse)
        {
            self.next_behavior = val;
        }
        if let Some(val) = map.get("skipButtonEnabled").and_then(|v| v.as_bool()) {
            self.skip_button_enabled = val;
        }
        if let Some(val) = map.get("nextButtonEnabled").and_then(|v| v.as_bool()) {
            self.next_button_enabled = val;
        }
    }

    /// Defaults with `persisted` merged on top.
    pub fn from_persisted(persisted: Option<&Value>) -> Self {
        let mut settings = Settings::default();
        if let Some(value) = persisted {
            settings.merge_value(value);
        }
        settings
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "skipTime": self.skip_time,
            "nextBehavior": self.next_behavior.as_str(),
            "skipButtonEnabled": self.skip_button_enabled,
            "nextButtonEnabled": self.next_button_enabled,
        })
    }

    pub fn skip_label(&self) -> String {
        format!("Skip {}s", self.skip_time)
    }
}

/// Snap a slider value onto the panel's 30..=180 grid.
pub fn snap_skip_time(value: u32) -> u32 {
    let clamped = value.clamp(SKIP_TIME_MIN, SKIP_TIME_MAX);
    let offset = clamped - SKIP_TIME_MIN;
    let steps = (offset + SKIP_TIME_STEP / 2) / SKIP_TIME_STEP;
    (SKIP_TIME_MIN + steps * SKIP_TIME_STEP).min(SKIP_TIME_MAX)
}
