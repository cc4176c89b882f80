//! Concrete occurrences of event definitions.

use serde::{Deserialize, Serialize};

use crate::date_range::DateRange;

/// One occurrence of a definition at a specific range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventInstance {
    pub instance_id: String,
    pub def_id: String,
    pub range: DateRange,
    /// Offsets (minutes east of UTC) written in the raw input, carried only
    /// when the display time zone could not be resolved. Display-only.
    pub forced_start_offset: Option<i32>,
    pub forced_end_offset: Option<i32>,
}

impl EventInstance {
    pub fn new(instance_id: String, def_id: String, range: DateRange) -> Self {
        EventInstance {
            instance_id,
            def_id,
            range,
            forced_start_offset: None,
            forced_end_offset: None,
        }
    }

    #[must_use]
    pub fn with_forced_offsets(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.forced_start_offset = start;
        self.forced_end_offset = end;
        self
    }
}
