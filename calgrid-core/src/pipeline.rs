//! One render pass: expand recurrence, resolve UIs, slice, sort.
//!
//! Each step is memoized on its inputs, so repeating a pass with an
//! unchanged store and range reuses the previous results.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::date_range::DateRange;
use crate::event::ids::IdentityResolver;
use crate::event::store::EventStore;
use crate::event::ui::{EventUi, EventUiBases, build_event_ui_bases};
use crate::slice::{SlicedEvents, slice_event_store, sort_event_render_ranges};

/// A single-slot cache keyed by the full input.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    slot: Option<(K, V)>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Memo { slot: None }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value if `key` equals the last key, otherwise `compute`'s.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce(&K) -> V) -> &V {
        let entry = match self.slot.take() {
            Some((cached_key, value)) if cached_key == key => self.slot.insert((cached_key, value)),
            _ => {
                let value = compute(&key);
                self.slot.insert((key, value))
            }
        };
        &entry.1
    }

    pub fn is_cached(&self, key: &K) -> bool {
        matches!(&self.slot, Some((cached_key, _)) if cached_key == key)
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }
}

pub struct RenderPipeline<R> {
    config: EngineConfig,
    ids: R,
    day_ranges: bool,
    expanded: Memo<(EventStore, DateRange), EventStore>,
    ui_bases: Memo<(EventStore, BTreeMap<String, EventUi>), EventUiBases>,
    sliced: Memo<(EventStore, EventUiBases, DateRange), SlicedEvents>,
}

impl<R: IdentityResolver> RenderPipeline<R> {
    pub fn new(config: EngineConfig, ids: R) -> Self {
        RenderPipeline {
            config,
            ids,
            day_ranges: true,
            expanded: Memo::new(),
            ui_bases: Memo::new(),
            sliced: Memo::new(),
        }
    }

    /// Whether timed events are widened to the whole days they touch, as a
    /// day grid shows them. Time-column views want the exact times.
    #[must_use]
    pub fn with_day_ranges(mut self, day_ranges: bool) -> Self {
        self.day_ranges = day_ranges;
        self.sliced.invalidate();
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Swap the configuration. Every cached step depends on it.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        self.expanded.invalidate();
        self.ui_bases.invalidate();
        self.sliced.invalidate();
    }

    /// Run one pass. `source_uis` holds UI fragments per event source id.
    pub fn run(
        &mut self,
        store: &EventStore,
        source_uis: &BTreeMap<String, EventUi>,
        framing: &DateRange,
    ) -> &SlicedEvents {
        let config = &self.config;
        let ids = &mut self.ids;
        let next_day_threshold = self.day_ranges.then_some(&config.next_day_threshold);

        let expanded = self
            .expanded
            .get_or_compute((store.clone(), *framing), |(store, framing)| {
                store.expand_recurring(framing, config, ids)
            });

        let bases = self
            .ui_bases
            .get_or_compute((store.clone(), source_uis.clone()), |(store, source_uis)| {
                build_event_ui_bases(
                    store.defs().values().map(|def| def.as_ref()),
                    &config.base_event_ui(),
                    source_uis,
                )
            });

        self.sliced.get_or_compute(
            (expanded.clone(), bases.clone(), *framing),
            |(expanded, bases, framing)| {
                let mut sliced = slice_event_store(
                    expanded,
                    bases,
                    framing,
                    next_day_threshold,
                );
                sort_event_render_ranges(&mut sliced.background, &config.event_order);
                sort_event_render_ranges(&mut sliced.foreground, &config.event_order);
                sliced
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::duration::Duration;
    use crate::event::def::{EventDef, RecurringDef};
    use crate::event::ids::SequentialIds;
    use crate::marker::Marker;
    use crate::recurrence::RecurrenceRule;

    #[test]
    fn test_memo_recomputes_only_on_change() {
        let mut memo: Memo<u32, String> = Memo::new();
        let mut calls = 0;

        memo.get_or_compute(1, |k| {
            calls += 1;
            k.to_string()
        });
        let value = memo.get_or_compute(1, |k| {
            calls += 1;
            k.to_string()
        });
        assert_eq!(value, "1");
        assert_eq!(calls, 1);

        memo.get_or_compute(2, |k| {
            calls += 1;
            k.to_string()
        });
        assert_eq!(calls, 2);
        assert!(memo.is_cached(&2));

        memo.invalidate();
        assert!(!memo.is_cached(&2));
    }

    fn make_test_store() -> EventStore {
        let def = EventDef {
            def_id: "standup".into(),
            source_id: "team".into(),
            public_id: None,
            group_id: None,
            title: "Standup".into(),
            url: None,
            all_day: false,
            has_end: true,
            recurring: Some(RecurringDef {
                rule: RecurrenceRule {
                    days_of_week: Some(BTreeSet::from([1, 2, 3, 4, 5])),
                    start_time: Some(Duration::from_hours(9)),
                    ..RecurrenceRule::default()
                },
                duration: Some(Duration::from_minutes(15)),
            }),
            ui: EventUi::default(),
            extended_props: Default::default(),
        };
        EventStore::new([def], [])
    }

    #[test_log::test]
    fn test_pass_is_memoized_and_stable() {
        let mut pipeline = RenderPipeline::new(EngineConfig::default(), SequentialIds::new());
        let store = make_test_store();
        let week = DateRange::bounded(
            Marker::from_ymd(2024, 3, 3).unwrap(),
            Marker::from_ymd(2024, 3, 10).unwrap(),
        )
        .unwrap();
        let source_uis = BTreeMap::from([(
            "team".to_string(),
            EventUi {
                background_color: Some("navy".into()),
                ..EventUi::default()
            },
        )]);

        let first = pipeline.run(&store, &source_uis, &week).clone();
        assert_eq!(first.foreground.len(), 5);
        assert_eq!(
            first.foreground[0].range,
            DateRange::bounded(Marker::from_ymd(2024, 3, 4).unwrap(), Marker::from_ymd(2024, 3, 5).unwrap())
                .unwrap(),
            "day grid ranges cover whole days"
        );
        assert!(
            first
                .foreground
                .iter()
                .all(|r| r.ui.background_color.as_deref() == Some("navy")),
            "source UI reaches every range"
        );
        let starts: Vec<_> = first.foreground.iter().map(|r| r.range.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted, "ranges come out in event order");

        let second = pipeline.run(&store, &source_uis, &week).clone();
        assert_eq!(first, second, "same inputs reuse the cached expansion and ids");
    }

    #[test]
    fn test_time_columns_keep_exact_times() {
        let mut pipeline =
            RenderPipeline::new(EngineConfig::default(), SequentialIds::new()).with_day_ranges(false);
        let monday = DateRange::bounded(
            Marker::from_ymd(2024, 3, 4).unwrap(),
            Marker::from_ymd(2024, 3, 5).unwrap(),
        )
        .unwrap();

        let sliced = pipeline.run(&make_test_store(), &BTreeMap::new(), &monday);
        assert_eq!(sliced.foreground.len(), 1);
        assert_eq!(
            sliced.foreground[0].range,
            DateRange::bounded(
                Marker::from_ymd_hms(2024, 3, 4, 9, 0, 0).unwrap(),
                Marker::from_ymd_hms(2024, 3, 4, 9, 15, 0).unwrap(),
            )
            .unwrap()
        );
    }
}
