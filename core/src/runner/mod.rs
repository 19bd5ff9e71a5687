mod events;
pub mod exit;
mod supervisor;
mod tee;
pub mod tree;

pub use events::{EventSink, LogChannel, LogEvent, SupervisorEvent};
pub use exit::ExitOutcome;
pub use supervisor::{ProcessInfo, ProcessSupervisor, SupervisorState};
