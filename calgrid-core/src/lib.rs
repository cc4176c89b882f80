//! Calendar event model and layout engine.
//!
//! This crate turns raw event input into positioned segments:
//! - `event` parses raw events into an `EventStore` of definitions and instances
//! - `recurrence` expands simple weekly rules into concrete instances
//! - `slice` clips a store against a visible range and cuts ranges per day cell or time column
//! - `placement` stacks those segments and decides what overflows into "+N more"
//! - `pipeline` runs one memoized pass over a store

pub mod config;
pub mod date_range;
pub mod duration;
pub mod error;
pub mod event;
pub mod marker;
pub mod pipeline;
pub mod placement;
pub mod recurrence;
pub mod slice;

pub use config::EngineConfig;
pub use date_range::DateRange;
pub use duration::{Duration, TimeUnit};
pub use error::{CalGridError, CalGridResult};
pub use event::{EventDef, EventInstance, EventStore, EventUi};
pub use marker::{DateEnv, Marker};
pub use pipeline::{Memo, RenderPipeline};
pub use recurrence::RecurrenceRule;
