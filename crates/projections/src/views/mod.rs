//! Read model rows maintained by the projector.

pub mod current_state;
pub mod event_log;

pub use current_state::{Absorbed, CurrentStateRow, Details, Grouped, Outcome, Registration};
pub use event_log::EventLogRow;
