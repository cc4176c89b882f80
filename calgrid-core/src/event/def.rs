//! Event definitions: the identity and template of an event.

use serde_json::{Map, Value};

use crate::duration::Duration;
use crate::event::ui::EventUi;
use crate::recurrence::RecurrenceRule;

/// An immutable event definition.
///
/// A recurring definition has no range of its own; its instances are
/// derived by expanding `recurring` against a framing range.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDef {
    pub def_id: String,
    pub source_id: String,
    /// The id the event was given by its source, if any.
    pub public_id: Option<String>,
    pub group_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub all_day: bool,
    /// Whether the source specified an end (rather than a default duration).
    pub has_end: bool,
    pub recurring: Option<RecurringDef>,
    pub ui: EventUi,
    pub extended_props: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringDef {
    pub rule: RecurrenceRule,
    /// Explicit or inferred event length. None falls back to the configured
    /// default for all-day or timed events.
    pub duration: Option<Duration>,
}

impl EventDef {
    pub fn is_recurring(&self) -> bool {
        self.recurring.is_some()
    }

    /// True when both definitions belong to the same non-empty group.
    pub fn is_grouped_with(&self, other: &EventDef) -> bool {
        self.group_id
            .as_ref()
            .is_some_and(|group| other.group_id.as_ref() == Some(group))
    }
}
