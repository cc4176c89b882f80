pub mod def;
pub mod ids;
pub mod instance;
pub mod parse;
pub mod store;
pub mod ui;

pub use def::{EventDef, RecurringDef};
pub use ids::{FreshIds, IdentityResolver, ReuseIds, SequentialIds};
pub use instance::EventInstance;
pub use parse::{EventParser, EventTuple, RawEvent, raw_events_from_json};
pub use store::{EventStore, event_tuple_to_store};
pub use ui::{
    AllowFn, Constraint, Display, EventUi, EventUiBases, EventUiInput, build_event_ui_bases,
    combine_event_uis, compile_event_ui,
};
