use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use tokio::sync::broadcast;

use crate::error::{LaunchError, StopError};
use crate::launch::{LaunchPlanner, RunConfiguration, RunMode};
use crate::repo::RepoRootSource;
use crate::runner::{EventSink, LogEvent, ProcessInfo, ProcessSupervisor, SupervisorEvent};

use super::transcript::Transcript;

const UPDATE_CAPACITY: usize = 1024;

/// Which user commands are currently permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandAvailability {
    pub can_start: bool,
    pub can_stop: bool,
}

impl CommandAvailability {
    fn for_running(running: bool) -> Self {
        Self {
            can_start: !running,
            can_stop: running,
        }
    }
}

/// State changes published to front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Line(LogEvent),
    Cleared,
    RunningChanged {
        running: bool,
        commands: CommandAvailability,
    },
    /// The run ended. `code` is the exit code, or `None` when it was stopped.
    RunEnded { pid: u32, code: Option<i32> },
    /// All output of the run with this pid has been read.
    OutputDrained { pid: u32 },
}

#[derive(Debug)]
pub enum RunOutcome {
    Started(ProcessInfo),
    /// A run was already active; nothing happened.
    Rejected,
    /// The run could not be started; the reason is in the transcript.
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub repo_root: RepoRootSource,
    /// Directory that `save_log` writes into.
    pub log_dir: PathBuf,
}

#[derive(Default)]
struct SessionState {
    running: bool,
    transcript: Transcript,
}

/// Serialization point for the transcript and the running flag. Every
/// mutation goes through one mutex and is published after it is applied.
struct SessionSink {
    state: Mutex<SessionState>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionSink {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, update: SessionUpdate) {
        // No subscribers is fine; the transcript is the source of truth.
        let _ = self.updates.send(update);
    }

    fn append(&self, event: LogEvent) {
        let mut state = self.lock();
        state.transcript.push(event.clone());
        self.publish(SessionUpdate::Line(event));
    }

    fn set_running(&self, running: bool) {
        let mut state = self.lock();
        if state.running == running {
            return;
        }
        state.running = running;
        tracing::debug!(target: "hk3.session", running, "running flag changed");
        self.publish(SessionUpdate::RunningChanged {
            running,
            commands: CommandAvailability::for_running(running),
        });
    }
}

impl EventSink for SessionSink {
    fn emit(&self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Log(ev) => self.append(ev),
            SupervisorEvent::Started { .. } => self.set_running(true),
            SupervisorEvent::Exited { pid, code } => {
                self.set_running(false);
                self.publish(SessionUpdate::RunEnded { pid, code });
            }
            SupervisorEvent::Stopped { pid } => {
                self.set_running(false);
                self.publish(SessionUpdate::RunEnded { pid, code: None });
            }
            SupervisorEvent::Drained { pid } => self.publish(SessionUpdate::OutputDrained { pid }),
        }
    }
}

/// Runs the calibration tool or the agent on behalf of a front end and keeps
/// the session transcript.
///
/// Nothing here returns an error to the caller: every failure on the run and
/// stop paths ends up as a transcript line.
pub struct SessionController {
    planner: Arc<dyn LaunchPlanner>,
    options: SessionOptions,
    sink: Arc<SessionSink>,
    supervisor: ProcessSupervisor,
}

impl SessionController {
    pub fn new(planner: Arc<dyn LaunchPlanner>, options: SessionOptions) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let sink = Arc::new(SessionSink {
            state: Mutex::new(SessionState::default()),
            updates,
        });
        let supervisor = ProcessSupervisor::new(sink.clone());
        Self {
            planner,
            options,
            sink,
            supervisor,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.sink.updates.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.sink.lock().running
    }

    pub fn commands(&self) -> CommandAvailability {
        CommandAvailability::for_running(self.is_running())
    }

    pub fn current_process(&self) -> Option<ProcessInfo> {
        self.supervisor.current()
    }

    pub fn transcript(&self) -> Transcript {
        self.sink.lock().transcript.clone()
    }

    pub fn rendered(&self) -> String {
        self.sink.lock().transcript.render()
    }

    /// Appends a launcher notice to the transcript.
    pub fn notice(&self, message: impl Into<String>) {
        self.sink.append(LogEvent::notice(message));
    }

    pub fn run_calibration(&self, config: &RunConfiguration) -> RunOutcome {
        self.launch(config, RunMode::Calibration)
    }

    pub fn run_agent(&self, config: &RunConfiguration) -> RunOutcome {
        self.launch(config, RunMode::Agent)
    }

    fn launch(&self, config: &RunConfiguration, mode: RunMode) -> RunOutcome {
        if self.is_running() || !self.supervisor.state().accepts_start() {
            tracing::info!(target: "hk3.session", %mode, "run rejected: already active");
            self.notice("A run is already active.");
            return RunOutcome::Rejected;
        }

        self.notice(match mode {
            RunMode::Calibration => "Starting calibration...",
            RunMode::Agent => "Starting agent runner...",
        });

        let repo_root = match self.options.repo_root.resolve() {
            Ok(root) => root,
            Err(e) => return self.fail(mode, &e),
        };

        let spec = match self.planner.plan(config, mode, &repo_root) {
            Ok(spec) => spec,
            Err(e) => return self.fail(mode, &e),
        };
        tracing::debug!(
            target: "hk3.session",
            planner = self.planner.name(),
            %mode,
            program = %spec.program,
            "launch planned"
        );

        match self.supervisor.start(&spec) {
            Ok(info) => RunOutcome::Started(info),
            Err(LaunchError::AlreadyRunning) => {
                self.notice("A run is already active.");
                RunOutcome::Rejected
            }
            Err(e) => {
                let outcome = self.fail(mode, &e);
                self.sink.set_running(false);
                outcome
            }
        }
    }

    fn fail(&self, mode: RunMode, err: &dyn std::error::Error) -> RunOutcome {
        tracing::warn!(target: "hk3.session", %mode, error = %err, "run failed to start");
        self.notice(format!("Failed to start {mode}: {err}"));
        RunOutcome::Failed
    }

    /// Stops the active run. Returns whether a process was actually stopped.
    pub async fn stop(&self) -> bool {
        match self.supervisor.stop().await {
            Ok(()) => true,
            Err(StopError::NotRunning) => {
                self.notice("No process is running.");
                false
            }
        }
    }

    /// Saves the transcript to a timestamped file. Failures are reported in
    /// the transcript.
    pub fn save_log(&self) -> Option<PathBuf> {
        let transcript = self.transcript();
        match transcript.save_to(&self.options.log_dir, Local::now()) {
            Ok(path) => {
                tracing::info!(target: "hk3.session", path = %path.display(), "transcript saved");
                self.notice(format!("Log saved to: {}", path.display()));
                Some(path)
            }
            Err(e) => {
                tracing::warn!(target: "hk3.session", error = %e, "transcript save failed");
                self.notice(format!("Failed to save log: {e}"));
                None
            }
        }
    }

    pub fn clear_output(&self) {
        let mut state = self.sink.lock();
        state.transcript.clear();
        self.sink.publish(SessionUpdate::Cleared);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::error::ConfigError;
    use crate::launch::LaunchSpec;

    struct NoPlanner;

    impl LaunchPlanner for NoPlanner {
        fn name(&self) -> &str {
            "none"
        }

        fn plan(
            &self,
            config: &RunConfiguration,
            _mode: RunMode,
            repo_root: &Path,
        ) -> Result<LaunchSpec, ConfigError> {
            Err(ConfigError::NotFound {
                path: repo_root.join(&config.config_path),
            })
        }
    }

    fn controller() -> SessionController {
        SessionController::new(
            Arc::new(NoPlanner),
            SessionOptions {
                repo_root: RepoRootSource::SearchFrom(std::env::temp_dir()),
                log_dir: std::env::temp_dir(),
            },
        )
    }

    #[test]
    fn test_cleared_is_ordered_with_transcript() {
        let c = controller();
        c.notice("before");
        let mut rx = c.subscribe();

        c.clear_output();
        c.notice("after");

        assert_eq!(rx.try_recv().unwrap(), SessionUpdate::Cleared);
        match rx.try_recv().unwrap() {
            SessionUpdate::Line(ev) => assert_eq!(ev.message, "after"),
            other => panic!("unexpected update: {other:?}"),
        }
        let messages: Vec<_> = c
            .transcript()
            .events()
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(messages, vec!["after"]);
    }

    #[test]
    fn test_initial_commands_allow_start_only() {
        let c = controller();
        assert!(!c.is_running());
        assert_eq!(
            c.commands(),
            CommandAvailability {
                can_start: true,
                can_stop: false
            }
        );
    }
}
