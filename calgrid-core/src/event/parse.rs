//! Refining raw event payloads into definitions and instances.
//!
//! Payloads that can't be made sense of (no parseable start, malformed
//! fields) are dropped with a debug log rather than reported as errors.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::date_range::DateRange;
use crate::duration::Duration;
use crate::event::def::{EventDef, RecurringDef};
use crate::event::ids::IdentityResolver;
use crate::event::instance::EventInstance;
use crate::event::store::EventStore;
use crate::event::ui::EventUiInput;
use crate::marker::{DateEnv, DateInput};
use crate::recurrence::RecurrenceRule;

/// Ids may arrive as strings or numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// An event as a source delivers it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEvent {
    pub id: Option<RawId>,
    pub group_id: Option<RawId>,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(alias = "date")]
    pub start: Option<DateInput>,
    pub end: Option<DateInput>,
    pub all_day: Option<bool>,

    pub days_of_week: Option<Vec<u8>>,
    pub start_time: Option<Duration>,
    pub end_time: Option<Duration>,
    pub start_recur: Option<DateInput>,
    pub end_recur: Option<DateInput>,
    pub duration: Option<Duration>,

    pub extended_props: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub ui: EventUiInput,
    /// Keys not recognised above. They become extended props.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawEvent {
    fn has_recurrence(&self) -> bool {
        self.days_of_week.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.start_recur.is_some()
            || self.end_recur.is_some()
    }
}

/// Deserialize every element of a JSON array, skipping the malformed ones.
pub fn raw_events_from_json(value: &Value) -> Vec<RawEvent> {
    let Some(items) = value.as_array() else {
        tracing::debug!("event payload is not an array");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match RawEvent::deserialize(item) {
            Ok(raw) => Some(raw),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed event payload");
                None
            }
        })
        .collect()
}

/// A definition with its single instance, if it isn't recurring.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTuple {
    pub def: EventDef,
    pub instance: Option<EventInstance>,
}

pub struct EventParser<'a> {
    config: &'a EngineConfig,
    env: DateEnv,
    source_id: String,
}

impl<'a> EventParser<'a> {
    pub fn new(config: &'a EngineConfig, source_id: impl Into<String>) -> Self {
        EventParser {
            config,
            env: config.date_env(),
            source_id: source_id.into(),
        }
    }

    pub fn env(&self) -> &DateEnv {
        &self.env
    }

    pub fn parse_event(&self, raw: &RawEvent, ids: &mut dyn IdentityResolver) -> Option<EventTuple> {
        if raw.has_recurrence() {
            self.parse_recurring(raw, ids)
        } else {
            self.parse_single(raw, ids)
        }
    }

    /// Parse all payloads into one store. Recurring definitions get instances
    /// only when a framing range is given.
    pub fn parse_events(
        &self,
        raws: &[RawEvent],
        framing: Option<&DateRange>,
        ids: &mut dyn IdentityResolver,
    ) -> EventStore {
        let mut defs = Vec::new();
        let mut instances = Vec::new();

        for raw in raws {
            if let Some(tuple) = self.parse_event(raw, ids) {
                defs.push(tuple.def);
                instances.extend(tuple.instance);
            }
        }

        tracing::debug!(
            source_id = %self.source_id,
            parsed = defs.len(),
            dropped = raws.len() - defs.len(),
            "parsed events"
        );

        let store = EventStore::new(defs, instances);
        match framing {
            Some(framing) => store.expand_recurring(framing, self.config, ids),
            None => store,
        }
    }

    fn parse_single(&self, raw: &RawEvent, ids: &mut dyn IdentityResolver) -> Option<EventTuple> {
        let Some(start_meta) = raw.start.as_ref().and_then(|s| self.env.create_marker_meta(s)) else {
            tracing::debug!(id = ?raw.id, "dropping event without a parseable start");
            return None;
        };
        let end_meta = raw.end.as_ref().and_then(|e| self.env.create_marker_meta(e));

        let all_day = raw
            .all_day
            .or(self.config.default_all_day)
            .unwrap_or_else(|| {
                start_meta.is_time_unspecified
                    && end_meta.as_ref().is_none_or(|end| end.is_time_unspecified)
            });

        let mut start = start_meta.marker;
        if all_day {
            start = start.start_of_day();
        }

        // An end at or before the start is treated as absent.
        let end = end_meta
            .map(|meta| {
                if all_day {
                    meta.marker.start_of_day()
                } else {
                    meta.marker
                }
            })
            .filter(|end| *end > start);

        let (end, has_end) = match end {
            Some(end) => (end, true),
            None => (
                start.add(&self.config.default_duration(all_day)),
                self.config.force_event_duration,
            ),
        };

        let Some(range) = DateRange::bounded(start, end) else {
            tracing::debug!(id = ?raw.id, "dropping event with an empty range");
            return None;
        };

        let def = self.build_def(raw, all_day, has_end, None, ids);
        let instance = EventInstance::new(ids.instance_id(&def.def_id), def.def_id.clone(), range)
            .with_forced_offsets(
                start_meta.forced_offset_minutes,
                end_meta.and_then(|meta| meta.forced_offset_minutes),
            );

        Some(EventTuple {
            def,
            instance: Some(instance),
        })
    }

    fn parse_recurring(&self, raw: &RawEvent, ids: &mut dyn IdentityResolver) -> Option<EventTuple> {
        let days_of_week = raw.days_of_week.as_ref().map(|days| {
            days.iter()
                .copied()
                .filter(|d| *d <= 6)
                .collect::<BTreeSet<u8>>()
        });

        let rule = RecurrenceRule {
            days_of_week,
            start_time: raw.start_time,
            end_time: raw.end_time,
            recur_start: raw.start_recur.as_ref().and_then(|d| self.env.create_marker(d)),
            recur_end: raw.end_recur.as_ref().and_then(|d| self.env.create_marker(d)),
        };

        if !rule.recur_range().is_valid() {
            tracing::debug!(id = ?raw.id, "dropping recurring event with an empty recurrence window");
            return None;
        }

        let all_day = raw
            .all_day
            .or(self.config.default_all_day)
            .unwrap_or_else(|| rule.is_all_day_guess());
        let duration = raw.duration.or_else(|| rule.inferred_duration());
        let has_end = duration.is_some();

        let recurring = RecurringDef { rule, duration };
        let def = self.build_def(raw, all_day, has_end, Some(recurring), ids);

        Some(EventTuple {
            def,
            instance: None,
        })
    }

    fn build_def(
        &self,
        raw: &RawEvent,
        all_day: bool,
        has_end: bool,
        recurring: Option<RecurringDef>,
        ids: &mut dyn IdentityResolver,
    ) -> EventDef {
        let public_id = raw.id.clone().map(RawId::into_string);

        let mut extended_props = raw.extra.clone();
        if let Some(explicit) = &raw.extended_props {
            extended_props.extend(explicit.clone());
        }

        EventDef {
            def_id: ids.def_id(public_id.as_deref()),
            source_id: self.source_id.clone(),
            public_id,
            group_id: raw.group_id.clone().map(RawId::into_string),
            title: raw.title.clone().unwrap_or_default(),
            url: raw.url.clone(),
            all_day,
            has_end,
            recurring,
            ui: raw.ui.refine(&self.env),
            extended_props,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::ids::{ReuseIds, SequentialIds};
    use crate::event::ui::Display;
    use crate::marker::Marker;

    fn make_test_raw(value: Value) -> RawEvent {
        serde_json::from_value(value).unwrap()
    }

    fn parse(config: &EngineConfig, value: Value) -> Option<EventTuple> {
        EventParser::new(config, "src").parse_event(&make_test_raw(value), &mut SequentialIds::new())
    }

    #[test]
    fn test_infers_all_day_from_bare_dates() {
        let config = EngineConfig::default();
        let tuple = parse(&config, json!({"id": 7, "title": "Trip", "start": "2024-03-04", "end": "2024-03-06"})).unwrap();

        assert!(tuple.def.all_day);
        assert!(tuple.def.has_end);
        assert_eq!(tuple.def.public_id.as_deref(), Some("7"));
        let range = tuple.instance.unwrap().range;
        assert_eq!(range.start, Marker::from_ymd(2024, 3, 4));
        assert_eq!(range.end, Marker::from_ymd(2024, 3, 6));
    }

    #[test]
    fn test_timed_event_without_end_gets_default_duration() {
        let config = EngineConfig::default();
        let tuple = parse(&config, json!({"start": "2024-03-04T10:00:00"})).unwrap();

        assert!(!tuple.def.all_day);
        assert!(!tuple.def.has_end, "default duration doesn't count as an explicit end");
        let range = tuple.instance.unwrap().range;
        assert_eq!(range.end, Marker::from_ymd_hms(2024, 3, 4, 11, 0, 0));
    }

    #[test]
    fn test_inverted_end_is_repaired() {
        let config = EngineConfig {
            force_event_duration: true,
            ..EngineConfig::default()
        };
        let tuple = parse(
            &config,
            json!({"start": "2024-03-04T10:00:00", "end": "2024-03-04T09:00:00"}),
        )
        .unwrap();
        assert!(tuple.def.has_end, "forced durations count as an end");
        assert_eq!(
            tuple.instance.unwrap().range.end,
            Marker::from_ymd_hms(2024, 3, 4, 11, 0, 0)
        );
    }

    #[test]
    fn test_drops_unparseable_start() {
        let config = EngineConfig::default();
        assert!(parse(&config, json!({"title": "no start"})).is_none());
        assert!(parse(&config, json!({"start": "sometime"})).is_none());
    }

    #[test_log::test]
    fn test_drops_out_of_range_payloads_without_panicking() {
        let config = EngineConfig::default();
        let raws = raw_events_from_json(&json!([
            {"id": "ok", "start": "2024-03-04T10:00:00"},
            {"id": "accented", "start": "2024-03-01T10:00+1\u{e9}1"},
            {"id": "huge", "daysOfWeek": [1], "duration": {"hours": i64::MAX}}
        ]));
        assert_eq!(raws.len(), 2, "the overflowing duration fails to deserialize");

        let store = EventParser::new(&config, "src").parse_events(&raws, None, &mut SequentialIds::new());
        let kept: Vec<_> = store.defs().values().filter_map(|d| d.public_id.as_deref()).collect();
        assert_eq!(kept, vec!["ok"], "the non-digit offset is dropped");
    }

    #[test]
    fn test_ui_fields_and_extra_props() {
        let config = EngineConfig::default();
        let tuple = parse(
            &config,
            json!({
                "start": "2024-03-04",
                "display": "background",
                "color": "green",
                "department": "ops",
                "extendedProps": {"room": 4}
            }),
        )
        .unwrap();

        assert_eq!(tuple.def.ui.display, Some(Display::Background));
        assert_eq!(tuple.def.ui.background_color.as_deref(), Some("green"));
        assert_eq!(tuple.def.extended_props.get("department"), Some(&json!("ops")));
        assert_eq!(tuple.def.extended_props.get("room"), Some(&json!(4)));
        assert!(!tuple.def.extended_props.contains_key("color"));
    }

    #[test]
    fn test_recurring_payload_builds_rule() {
        let config = EngineConfig::default();
        let tuple = parse(
            &config,
            json!({
                "groupId": "standup",
                "daysOfWeek": [1, 3, 9],
                "startTime": "09:00",
                "endTime": "09:15",
                "startRecur": "2024-03-01"
            }),
        )
        .unwrap();

        assert!(tuple.instance.is_none());
        assert!(!tuple.def.all_day);
        let recurring = tuple.def.recurring.unwrap();
        assert_eq!(recurring.rule.days_of_week, Some(BTreeSet::from([1, 3])));
        assert_eq!(recurring.duration, Some(Duration::from_minutes(15)));
        assert_eq!(recurring.rule.recur_start, Marker::from_ymd(2024, 3, 1));
    }

    #[test_log::test]
    fn test_parse_events_expands_and_reuses_ids() {
        let config = EngineConfig::default();
        let parser = EventParser::new(&config, "src");
        let raws = raw_events_from_json(&json!([
            {"id": "a", "start": "2024-03-04T10:00:00"},
            {"id": "r", "daysOfWeek": [2], "startTime": "08:00"},
            {"id": "bad", "start": {"nested": true}}
        ]));
        assert_eq!(raws.len(), 2, "the malformed payload is skipped");

        let framing = DateRange::bounded(
            Marker::from_ymd(2024, 3, 3).unwrap(),
            Marker::from_ymd(2024, 3, 10).unwrap(),
        )
        .unwrap();
        let first = parser.parse_events(&raws, Some(&framing), &mut SequentialIds::new());
        assert_eq!(first.defs().len(), 2);
        assert_eq!(first.len(), 2);

        let mut reuse = ReuseIds::from_store(&first, SequentialIds::new());
        let second = parser.parse_events(&raws, Some(&framing), &mut reuse);
        assert_eq!(
            first.defs().keys().collect::<Vec<_>>(),
            second.defs().keys().collect::<Vec<_>>(),
            "def ids are stable across re-parses"
        );

        let single_id = |store: &EventStore| {
            let def = store.defs().values().find(|d| d.public_id.as_deref() == Some("a")).unwrap();
            store.instances_of(&def.def_id).next().unwrap().instance_id.clone()
        };
        assert_eq!(single_id(&first), single_id(&second));
    }
}
