use crate::models::ControlKind;
use crate::settings::{
    NextBehavior, SKIP_TIME_MAX, SKIP_TIME_MIN, SKIP_TIME_PRESETS, SKIP_TIME_STEP, Settings,
    snap_skip_time,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelField {
    Slider,
    Preset(usize),
    Behavior(NextBehavior),
    Save,
    Cancel,
}

/// Ordered focus ring used by keyboard front-ends.
pub fn focus_order() -> Vec<PanelField> {
    let mut fields = vec![PanelField::Slider];
    fields.extend((0..SKIP_TIME_PRESETS.len()).map(PanelField::Preset));
    fields.push(PanelField::Behavior(NextBehavior::Auto));
    fields.push(PanelField::Behavior(NextBehavior::Manual));
    fields.push(PanelField::Save);
    fields.push(PanelField::Cancel);
    fields
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelOutcome {
    Open,
    Saved { skip_time: u32, next_behavior: NextBehavior },
    Closed,
}

/// Draft state of the settings panel; nothing is applied until save.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPanel {
    skip_time: u32,
    next_behavior: NextBehavior,
    focus: usize,
}

impl SettingsPanel {
    pub fn open(settings: &Settings) -> Self {
        Self {
            skip_time: snap_skip_time(settings.skip_time),
            next_behavior: settings.next_behavior,
            focus: 0,
        }
    }

    pub fn skip_time(&self) -> u32 {
        self.skip_time
    }

    pub fn next_behavior(&self) -> NextBehavior {
        self.next_behavior
    }

    pub fn value_label(&self) -> String {
        format!("{}s", self.skip_time)
    }

    pub fn set_slider(&mut self, value: u32) {
        self.skip_time = snap_skip_time(value);
    }

    pub fn step_slider(&mut self, steps: i32) {
        let delta = steps.unsigned_abs() * SKIP_TIME_STEP;
        let value = if steps < 0 {
            self.skip_time.saturating_sub(delta)
        } else {
            self.skip_time.saturating_add(delta)
        };
        self.set_slider(value);
    }

    pub fn apply_preset(&mut self, index: usize) {
        if let Some(value) = SKIP_TIME_PRESETS.get(index) {
            self.skip_time = *value;
        }
    }

    pub fn choose_behavior(&mut self, behavior: NextBehavior) {
        self.next_behavior = behavior;
    }

    pub fn focused(&self) -> PanelField {
        let order = focus_order();
        order[self.focus % order.len()]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % focus_order().len();
    }

    pub fn focus_prev(&mut self) {
        let len = focus_order().len();
        self.focus = (self.focus + len - 1) % len;
    }

    /// Activate the focused field.
    pub fn activate(&mut self) -> PanelOutcome {
        match self.focused() {
            PanelField::Slider => PanelOutcome::Open,
            PanelField::Preset(index) => {
                self.apply_preset(index);
                PanelOutcome::Open
            }
            PanelField::Behavior(behavior) => {
                self.choose_behavior(behavior);
                PanelOutcome::Open
            }
            PanelField::Save => self.save(),
            PanelField::Cancel => PanelOutcome::Closed,
        }
    }

    pub fn save(&self) -> PanelOutcome {
        PanelOutcome::Saved {
            skip_time: self.skip_time,
            next_behavior: self.next_behavior,
        }
    }

    pub fn markup(&self) -> String {
        let presets: String = SKIP_TIME_PRESETS
            .iter()
            .map(|t| format!(r#"<button data-time="{t}" class="snc-glassmorphism">{t}s</button>"#))
            .collect();
        let checked = |behavior: NextBehavior| {
            if self.next_behavior == behavior {
                " checked"
            } else {
                ""
            }
        };
        format!(
            concat!(
                r#"<div class="{panel}"><div class="snc-config-content snc-glassmorphism">"#,
                r#"<div class="snc-config-header">⚙️ Settings</div>"#,
                r#"<div class="snc-config-section"><label>Skip time (seconds):</label>"#,
                r#"<div class="snc-slider-container"><input type="range" id="snc-skip-slider" min="{min}" max="{max}" step="{step}" value="{value}">"#,
                r#"<span id="snc-skip-value">{label}</span></div>"#,
                r#"<div class="snc-preset-buttons">{presets}</div></div>"#,
                r#"<div class="snc-config-section"><label>Next episode:</label><div class="snc-radio-group">"#,
                r#"<label class="snc-radio-label"><input type="radio" name="nextBehavior" value="auto"{auto}><span>Automatic</span></label>"#,
                r#"<label class="snc-radio-label"><input type="radio" name="nextBehavior" value="manual"{manual}><span>Manual</span></label>"#,
                r#"</div></div><div class="snc-config-buttons">"#,
                r#"<button id="snc-save-config" class="snc-save-button snc-glassmorphism">Save</button>"#,
                r#"<button id="snc-cancel-config" class="snc-cancel-button snc-glassmorphism">Cancel</button>"#,
                r#"</div></div></div>"#
            ),
            panel = ControlKind::SettingsPanel.class_name(),
            min = SKIP_TIME_MIN,
            max = SKIP_TIME_MAX,
            step = SKIP_TIME_STEP,
            value = self.skip_time,
            label = self.value_label(),
            presets = presets,
            auto = checked(NextBehavior::Auto),
            manual = checked(NextBehavior::Manual),
        )
    }
}
