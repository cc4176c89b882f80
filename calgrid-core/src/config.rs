//! Engine configuration.
//!
//! Loaded from an optional TOML file layered under `CALGRID_*` environment
//! variables. Every field has a default, so an empty document is valid.

use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::duration::Duration;
use crate::error::{CalGridError, CalGridResult};
use crate::event::ui::{Display, EventUi};
use crate::marker::DateEnv;
use crate::placement::DayMaxEvents;
use crate::slice::order::EventOrder;

/// A row/event limit that may be switched on (`true`, fit to height) or
/// given as an explicit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LimitInput {
    Flag(bool),
    Count(usize),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `UTC` or an IANA zone name.
    pub time_zone: String,
    /// First day of the week, 0 = Sunday.
    pub first_day: u8,
    /// Timed events ending before this time of day don't occupy that day.
    pub next_day_threshold: Duration,
    pub default_timed_event_duration: Duration,
    pub default_all_day_event_duration: Duration,
    /// Mark events without an end as having one (the default duration).
    pub force_event_duration: bool,
    pub default_all_day: Option<bool>,
    pub event_order: EventOrder,
    /// Keep placement in event order instead of filling gaps.
    pub event_order_strict: bool,
    pub day_max_events: Option<LimitInput>,
    pub day_max_event_rows: Option<LimitInput>,
    pub event_max_stack: Option<usize>,
    /// Weekdays (0 = Sunday) left out of day tables.
    pub hidden_days: Vec<u8>,
    pub slot_min_time: Duration,
    pub slot_max_time: Duration,

    pub event_display: Display,
    pub editable: Option<bool>,
    pub event_start_editable: Option<bool>,
    pub event_duration_editable: Option<bool>,
    pub event_overlap: Option<bool>,
    pub event_color: Option<String>,
    pub event_background_color: Option<String>,
    pub event_border_color: Option<String>,
    pub event_text_color: Option<String>,
    pub event_class_names: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            time_zone: "UTC".to_string(),
            first_day: 0,
            next_day_threshold: Duration::zero(),
            default_timed_event_duration: Duration::from_hours(1),
            default_all_day_event_duration: Duration::from_days(1),
            force_event_duration: false,
            default_all_day: None,
            event_order: EventOrder::default(),
            event_order_strict: false,
            day_max_events: None,
            day_max_event_rows: None,
            event_max_stack: None,
            hidden_days: Vec::new(),
            slot_min_time: Duration::zero(),
            slot_max_time: Duration::from_hours(24),
            event_display: Display::Auto,
            editable: None,
            event_start_editable: None,
            event_duration_editable: None,
            event_overlap: None,
            event_color: None,
            event_background_color: None,
            event_border_color: None,
            event_text_color: None,
            event_class_names: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file (missing is fine) with `CALGRID_*` env overrides.
    pub fn load(path: &Path) -> CalGridResult<Self> {
        let config: EngineConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("CALGRID").try_parsing(true))
            .build()
            .map_err(|e| CalGridError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalGridError::Config(e.to_string()))?;

        config.validated()
    }

    pub fn from_toml_str(content: &str) -> CalGridResult<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| CalGridError::Config(e.to_string()))?;
        config.validated()
    }

    fn validated(mut self) -> CalGridResult<Self> {
        if self.first_day > 6 {
            return Err(CalGridError::Config(format!(
                "first_day must be 0-6, got {}",
                self.first_day
            )));
        }
        if !self.default_timed_event_duration.is_non_negative()
            || !self.default_all_day_event_duration.is_non_negative()
        {
            return Err(CalGridError::Config(
                "default event durations must not be negative".into(),
            ));
        }
        if self.slot_max_time.as_rough_ms() <= self.slot_min_time.as_rough_ms() {
            return Err(CalGridError::Config(
                "slot_max_time must be after slot_min_time".into(),
            ));
        }
        self.hidden_days.retain(|d| *d <= 6);
        if (0..7).all(|d| self.hidden_days.contains(&d)) {
            return Err(CalGridError::Config("cannot hide every day of the week".into()));
        }
        Ok(self)
    }

    pub fn date_env(&self) -> DateEnv {
        DateEnv::new(&self.time_zone, self.first_day)
    }

    pub fn default_duration(&self, all_day: bool) -> Duration {
        if all_day {
            self.default_all_day_event_duration
        } else {
            self.default_timed_event_duration
        }
    }

    /// The global UI fragment built from the display defaults.
    pub fn base_event_ui(&self) -> EventUi {
        EventUi {
            display: Some(self.event_display),
            start_editable: self.event_start_editable.or(self.editable),
            duration_editable: self.event_duration_editable.or(self.editable),
            constraints: Vec::new(),
            overlap: self.event_overlap,
            allows: Vec::new(),
            background_color: self
                .event_background_color
                .clone()
                .or_else(|| self.event_color.clone()),
            border_color: self
                .event_border_color
                .clone()
                .or_else(|| self.event_color.clone()),
            text_color: self.event_text_color.clone(),
            class_names: self.event_class_names.clone(),
        }
    }

    /// Resolve the day-grid overflow limit. `content_height` is the pixel
    /// height available for events in one cell, needed for the `true` forms.
    pub fn day_max_events(&self, content_height: Option<i64>) -> DayMaxEvents {
        let fit_to_height = matches!(self.day_max_events, Some(LimitInput::Flag(true)))
            || matches!(self.day_max_event_rows, Some(LimitInput::Flag(true)));

        if fit_to_height {
            return match content_height {
                Some(height) => DayMaxEvents::Height(height),
                None => DayMaxEvents::Unlimited,
            };
        }
        if let Some(LimitInput::Count(n)) = self.day_max_events {
            return DayMaxEvents::Events(n);
        }
        if let Some(LimitInput::Count(n)) = self.day_max_event_rows {
            return DayMaxEvents::Rows(n);
        }
        DayMaxEvents::Unlimited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::order::{OrderField, OrderSpec};

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_duration(false), Duration::from_hours(1));
        assert_eq!(config.default_duration(true), Duration::from_days(1));
    }

    #[test]
    fn test_parses_durations_order_and_limits() {
        let config = EngineConfig::from_toml_str(
            r#"
            time_zone = "America/New_York"
            first_day = 1
            next_day_threshold = "09:00"
            default_timed_event_duration = "PT30M"
            event_order = "-title,start"
            day_max_event_rows = 3
            hidden_days = [0, 6]
            event_display = "block"
            event_color = "teal"
            "#,
        )
        .unwrap();

        assert_eq!(config.next_day_threshold, Duration::from_hours(9));
        assert_eq!(config.default_timed_event_duration, Duration::from_minutes(30));
        assert_eq!(
            config.event_order.specs()[0],
            OrderSpec {
                field: OrderField::Title,
                descending: true
            }
        );
        assert_eq!(config.day_max_events(None), DayMaxEvents::Rows(3));
        assert_eq!(config.date_env().first_day, 1);

        let ui = config.base_event_ui();
        assert_eq!(ui.display, Some(Display::Block));
        assert_eq!(ui.border_color.as_deref(), Some("teal"));
    }

    #[test]
    fn test_fit_to_height_needs_a_height() {
        let config = EngineConfig {
            day_max_events: Some(LimitInput::Flag(true)),
            ..EngineConfig::default()
        };
        assert_eq!(config.day_max_events(Some(120)), DayMaxEvents::Height(120));
        assert_eq!(config.day_max_events(None), DayMaxEvents::Unlimited);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(EngineConfig::from_toml_str("first_day = 9").is_err());
        assert!(EngineConfig::from_toml_str("slot_min_time = \"10:00\"\nslot_max_time = \"08:00\"").is_err());
        assert!(EngineConfig::from_toml_str("hidden_days = [0,1,2,3,4,5,6]").is_err());
        assert!(EngineConfig::from_toml_str("default_timed_event_duration = \"soon\"").is_err());
    }

    #[test]
    fn test_load_tolerates_missing_file() {
        let config = EngineConfig::load(Path::new("/nonexistent/calgrid.toml")).unwrap();
        assert_eq!(config.slot_max_time, Duration::from_hours(24));
    }
}
