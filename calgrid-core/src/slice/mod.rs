//! Slicing event stores against a framing range.
//!
//! [`slice_event_store`] turns instances into render ranges and routes them
//! to the background or foreground list. The [`day_table`] and [`time_cols`]
//! slicers then cut render ranges into per-row or per-column segments.

pub mod day_table;
pub mod order;
pub mod time_cols;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::date_range::{DateRange, invert_ranges};
use crate::duration::Duration;
use crate::event::def::EventDef;
use crate::event::instance::EventInstance;
use crate::event::store::EventStore;
use crate::event::ui::{Display, EventUi, EventUiBases, compile_event_ui};

pub use day_table::{DaySeries, DayTable, TableSeg};
pub use order::{EventOrder, OrderField, OrderSpec, compare_event_ranges, sort_event_render_ranges};
pub use time_cols::{TimeColSeg, TimeCols};

/// An instance (or a synthetic inverse-background gap) clipped to the
/// framing range, with its resolved UI.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRenderRange {
    pub def: Arc<EventDef>,
    pub ui: EventUi,
    /// None for ranges synthesized from inverse backgrounds.
    pub instance: Option<EventInstance>,
    pub range: DateRange,
    /// The clipped start is the instance's own start.
    pub is_start: bool,
    /// The clipped end is the instance's own end.
    pub is_end: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlicedEvents {
    pub background: Vec<EventRenderRange>,
    pub foreground: Vec<EventRenderRange>,
}

/// Where inverse-background ranges of one definition or group collect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum InverseKey {
    Group(String),
    Def(String),
}

/// Clip every instance to `framing` and route it by its display mode.
///
/// `next_day_threshold` applies to timed events only: their visible range
/// is widened to whole days, and an end earlier in the day than the
/// threshold doesn't claim that day.
pub fn slice_event_store(
    store: &EventStore,
    ui_bases: &EventUiBases,
    framing: &DateRange,
    next_day_threshold: Option<&Duration>,
) -> SlicedEvents {
    let uis: BTreeMap<&str, EventUi> = store
        .defs()
        .iter()
        .map(|(id, def)| (id.as_str(), compile_event_ui(def, ui_bases)))
        .collect();

    let mut inverse: BTreeMap<InverseKey, (Arc<EventDef>, Vec<DateRange>)> = BTreeMap::new();
    for def in store.defs().values() {
        if uis.get(def.def_id.as_str()).map(EventUi::resolved_display) != Some(Display::InverseBackground) {
            continue;
        }
        let key = match &def.group_id {
            Some(group) => InverseKey::Group(group.clone()),
            None => InverseKey::Def(def.def_id.clone()),
        };
        // The first definition of a group speaks for all of it.
        inverse
            .entry(key)
            .or_insert_with(|| (Arc::clone(def), Vec::new()));
    }

    let mut sliced = SlicedEvents::default();

    for instance in store.instances().values() {
        let (Some(def), Some(ui)) = (store.get_def(&instance.def_id), uis.get(instance.def_id.as_str()))
        else {
            continue;
        };

        let orig = instance.range;
        let normal = match next_day_threshold {
            Some(threshold) if !def.all_day => compute_visible_day_range(&orig, threshold),
            _ => orig,
        };
        let Some(clipped) = normal.intersect(framing) else {
            continue;
        };

        match ui.resolved_display() {
            Display::InverseBackground => {
                let key = match &def.group_id {
                    Some(group) => InverseKey::Group(group.clone()),
                    None => InverseKey::Def(def.def_id.clone()),
                };
                if let Some((_, ranges)) = inverse.get_mut(&key) {
                    ranges.push(clipped);
                }
            }
            Display::None => {}
            display => {
                let range = EventRenderRange {
                    def: Arc::clone(def),
                    ui: ui.clone(),
                    instance: Some(instance.clone()),
                    range: clipped,
                    is_start: normal.start.is_some() && normal.start == clipped.start,
                    is_end: normal.end.is_some() && normal.end == clipped.end,
                };
                if display == Display::Background {
                    sliced.background.push(range);
                } else {
                    sliced.foreground.push(range);
                }
            }
        }
    }

    for (def, ranges) in inverse.into_values() {
        let ui = uis.get(def.def_id.as_str()).cloned().unwrap_or_default();
        for gap in invert_ranges(&ranges, framing) {
            sliced.background.push(EventRenderRange {
                def: Arc::clone(&def),
                ui: ui.clone(),
                instance: None,
                range: gap,
                is_start: false,
                is_end: false,
            });
        }
    }

    tracing::debug!(
        background = sliced.background.len(),
        foreground = sliced.foreground.len(),
        "sliced event store"
    );
    sliced
}

/// Widen a timed range to the whole days it visibly occupies.
///
/// An end less than `next_day_threshold` past midnight rolls back to that
/// midnight, so a 23:00 to 00:30 event stays on one day. The result always
/// spans at least one day.
pub fn compute_visible_day_range(range: &DateRange, next_day_threshold: &Duration) -> DateRange {
    let end_day = range.end.map(|end| {
        let day = end.start_of_day();
        let end_time_ms = day.diff_ms(&end);
        if end_time_ms != 0 && end_time_ms >= next_day_threshold.as_rough_ms() {
            day.add_days(1)
        } else {
            day
        }
    });

    let start_day = range.start.map(|start| start.start_of_day());
    let end_day = match (start_day, end_day) {
        (Some(start), Some(end)) if end <= start => Some(start.add_days(1)),
        _ => end_day,
    };

    DateRange::new(start_day, end_day)
}
