//! Simple recurrence: weekly day sets with an optional time of day.
//!
//! Expands a recurring definition into concrete instances within a framing
//! range. Expansion is a pure function of the rule, the duration and the
//! framing range; only the instance ids depend on the resolver.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::date_range::DateRange;
use crate::duration::Duration;
use crate::event::def::EventDef;
use crate::event::ids::IdentityResolver;
use crate::event::instance::EventInstance;
use crate::marker::Marker;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// Weekdays (0 = Sunday) the event occurs on. None means every day.
    pub days_of_week: Option<BTreeSet<u8>>,
    pub start_time: Option<Duration>,
    pub end_time: Option<Duration>,
    pub recur_start: Option<Marker>,
    pub recur_end: Option<Marker>,
}

impl RecurrenceRule {
    /// The window the rule itself is active in.
    pub fn recur_range(&self) -> DateRange {
        DateRange::new(self.recur_start, self.recur_end)
    }

    /// `end_time - start_time` when both are given.
    pub fn inferred_duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// A rule without any time of day describes all-day occurrences.
    pub fn is_all_day_guess(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    fn occurs_on(&self, weekday: u8) -> bool {
        self.days_of_week
            .as_ref()
            .is_none_or(|days| days.contains(&weekday))
    }

    /// Start markers of every occurrence in `framing`, clipped to the rule's
    /// own window. Walks day by day, so the framing range must be bounded
    /// once clipped.
    pub fn expand_starts(&self, all_day: bool, framing: &DateRange) -> Vec<Marker> {
        let Some(clipped) = framing.intersect(&self.recur_range()) else {
            return Vec::new();
        };
        let (Some(start), Some(end)) = (clipped.start, clipped.end) else {
            tracing::debug!("cannot expand recurrence over an unbounded range");
            return Vec::new();
        };

        let mut starts = Vec::new();
        let mut day = start.start_of_day();

        while day < end {
            if self.occurs_on(day.weekday()) {
                let occurrence = match &self.start_time {
                    Some(time) => day.add(time),
                    None => day,
                };
                starts.push(if all_day {
                    occurrence.start_of_day()
                } else {
                    occurrence
                });
            }
            day = day.add_days(1);
        }

        starts
    }
}

/// Concrete instances of a recurring definition within `framing`.
///
/// Occurrences whose computed range would be empty (e.g. an end time before
/// the start time) are dropped.
pub fn expand_instances(
    def: &EventDef,
    framing: &DateRange,
    config: &EngineConfig,
    ids: &mut dyn IdentityResolver,
) -> Vec<EventInstance> {
    let Some(recurring) = &def.recurring else {
        return Vec::new();
    };

    let duration = recurring
        .duration
        .unwrap_or_else(|| config.default_duration(def.all_day));

    let instances: Vec<EventInstance> = recurring
        .rule
        .expand_starts(def.all_day, framing)
        .into_iter()
        .filter_map(|start| {
            let range = DateRange::bounded(start, start.add(&duration));
            if range.is_none() {
                tracing::debug!(def_id = %def.def_id, %duration, "dropping empty occurrence");
            }
            range
        })
        .map(|range| EventInstance::new(ids.instance_id(&def.def_id), def.def_id.clone(), range))
        .collect();

    tracing::trace!(def_id = %def.def_id, count = instances.len(), "expanded recurring definition");
    instances
}
