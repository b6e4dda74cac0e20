//! Interactive terminal front end for the replication fleet.

pub mod app;
pub mod runtime;
pub mod theme;
pub mod ui;

pub use app::{App, AppEvent, Effect, ErrorSource, HeaderInfo, View};
pub use runtime::{run, TuiOptions};
