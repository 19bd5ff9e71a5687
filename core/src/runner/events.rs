use chrono::{DateTime, Local};

/// Where a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    Stdout,
    Stderr,
    /// Lines produced by the launcher itself (start/stop/exit notices, failures).
    Notice,
}

impl LogChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogChannel::Stdout => "stdout",
            LogChannel::Stderr => "stderr",
            LogChannel::Notice => "notice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub channel: LogChannel,
    pub message: String,
    pub at: DateTime<Local>,
}

impl LogEvent {
    pub fn new(channel: LogChannel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
            at: Local::now(),
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(LogChannel::Notice, message)
    }

    /// `[HH:MM:SS] message`, with `[error] ` in front of stderr messages.
    pub fn render(&self) -> String {
        let ts = self.at.format("%H:%M:%S");
        match self.channel {
            LogChannel::Stderr => format!("[{ts}] [error] {}", self.message),
            LogChannel::Stdout | LogChannel::Notice => format!("[{ts}] {}", self.message),
        }
    }
}

/// Events emitted by the supervisor while it manages a child.
///
/// For each successful start exactly one `Started` is followed by exactly one
/// of `Exited` or `Stopped`. `Log` events for a run may still arrive after the
/// terminal event while the readers drain the pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Log(LogEvent),
    Started { pid: u32 },
    Exited { pid: u32, code: Option<i32> },
    Stopped { pid: u32 },
    /// Both output readers of the run reached end of stream.
    Drained { pid: u32 },
}

/// Receiver of supervisor events. Called from the reader and watcher tasks,
/// so implementations serialize their own state.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SupervisorEvent);
}
