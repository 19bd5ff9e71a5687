use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{KillFailure, LaunchError, StopError};
use crate::launch::LaunchSpec;

use super::events::{EventSink, LogChannel, LogEvent, SupervisorEvent};
use super::exit::ExitOutcome;
use super::tee::pump_lines;
use super::tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Stopping,
    /// The last run ended on its own. A new run may be started.
    Exited,
}

impl SupervisorState {
    pub fn accepts_start(&self) -> bool {
        matches!(self, SupervisorState::Idle | SupervisorState::Exited)
    }
}

/// Snapshot of the supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub run_id: Uuid,
    pub pid: u32,
    pub started_at: DateTime<Local>,
}

type KillRequest = oneshot::Sender<std::io::Result<()>>;

struct ActiveRun {
    info: ProcessInfo,
    kill_tx: mpsc::Sender<KillRequest>,
}

struct Slot {
    state: SupervisorState,
    active: Option<ActiveRun>,
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the lifecycle of at most one worker process.
///
/// The child handle itself lives in the exit watcher task; the supervisor
/// keeps the pid and a channel used to ask the watcher to kill it. Lock
/// order is always slot first, then whatever the sink locks.
pub struct ProcessSupervisor {
    slot: Arc<Mutex<Slot>>,
    sink: Arc<dyn EventSink>,
}

impl ProcessSupervisor {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: SupervisorState::Idle,
                active: None,
            })),
            sink,
        }
    }

    pub fn state(&self) -> SupervisorState {
        lock_slot(&self.slot).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SupervisorState::Running
    }

    pub fn current(&self) -> Option<ProcessInfo> {
        lock_slot(&self.slot)
            .active
            .as_ref()
            .map(|a| a.info.clone())
    }

    /// Spawns the worker described by `spec`. Must be called from within a
    /// tokio runtime; returns as soon as the process exists.
    pub fn start(&self, spec: &LaunchSpec) -> Result<ProcessInfo, LaunchError> {
        {
            let mut slot = lock_slot(&self.slot);
            if !slot.state.accepts_start() {
                return Err(LaunchError::AlreadyRunning);
            }
            slot.state = SupervisorState::Starting;
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.envs)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                lock_slot(&self.slot).state = SupervisorState::Idle;
                tracing::warn!(
                    target: "hk3.supervisor",
                    program = %spec.program,
                    error = %source,
                    "spawn failed"
                );
                return Err(LaunchError::SpawnFailed {
                    program: spec.program.clone(),
                    source,
                });
            }
        };

        let info = ProcessInfo {
            run_id: Uuid::new_v4(),
            pid: child.id().unwrap_or(0),
            started_at: Local::now(),
        };
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (kill_tx, kill_rx) = mpsc::channel::<KillRequest>(1);

        {
            let mut slot = lock_slot(&self.slot);
            slot.state = SupervisorState::Running;
            slot.active = Some(ActiveRun {
                info: info.clone(),
                kill_tx,
            });
            self.sink.emit(SupervisorEvent::Started { pid: info.pid });
        }

        tracing::info!(
            target: "hk3.supervisor",
            run_id = %info.run_id,
            pid = info.pid,
            program = %spec.program,
            args = ?spec.args,
            cwd = %spec.cwd.display(),
            "worker started"
        );

        let out_task = stdout.map(|s| pump_lines(s, LogChannel::Stdout, self.sink.clone()));
        let err_task = stderr.map(|s| pump_lines(s, LogChannel::Stderr, self.sink.clone()));
        let sink = self.sink.clone();
        let pid = info.pid;
        tokio::spawn(async move {
            if let Some(t) = out_task {
                let _ = t.await;
            }
            if let Some(t) = err_task {
                let _ = t.await;
            }
            sink.emit(SupervisorEvent::Drained { pid });
        });

        tokio::spawn(watch_exit(
            child,
            kill_rx,
            self.slot.clone(),
            self.sink.clone(),
            info.clone(),
        ));

        Ok(info)
    }

    /// Forcefully terminates the running worker and all of its descendants.
    ///
    /// Kill failures are reported as notices; the supervisor always ends up
    /// idle.
    pub async fn stop(&self) -> Result<(), StopError> {
        let active = {
            let mut slot = lock_slot(&self.slot);
            if slot.state != SupervisorState::Running {
                return Err(StopError::NotRunning);
            }
            slot.state = SupervisorState::Stopping;
            slot.active.take()
        };
        let Some(active) = active else {
            lock_slot(&self.slot).state = SupervisorState::Idle;
            return Err(StopError::NotRunning);
        };
        let pid = active.info.pid;

        // Best effort: the tree is a snapshot taken before the root dies, so
        // helpers spawned after it are not reached.
        let mut failures = if pid == 0 {
            Vec::new()
        } else {
            tokio::task::spawn_blocking(move || tree::kill_descendants(pid))
                .await
                .unwrap_or_else(|e| {
                    vec![KillFailure {
                        pid,
                        reason: format!("descendant scan failed: {e}"),
                    }]
                })
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if active.kill_tx.send(reply_tx).await.is_ok() {
            // A dropped reply means the watcher saw the exit first.
            if let Ok(Err(e)) = reply_rx.await {
                failures.push(KillFailure {
                    pid,
                    reason: e.to_string(),
                });
            }
        }

        for failure in &failures {
            tracing::warn!(target: "hk3.supervisor", pid = failure.pid, reason = %failure.reason, "kill failed");
            self.sink.emit(SupervisorEvent::Log(LogEvent::notice(format!(
                "Unable to stop process: {failure}"
            ))));
        }

        let mut slot = lock_slot(&self.slot);
        slot.state = SupervisorState::Idle;
        if failures.is_empty() {
            self.sink
                .emit(SupervisorEvent::Log(LogEvent::notice("Stopped.")));
        }
        self.sink.emit(SupervisorEvent::Stopped { pid });
        tracing::info!(
            target: "hk3.supervisor",
            run_id = %active.info.run_id,
            pid,
            failures = failures.len(),
            "worker stopped"
        );
        Ok(())
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        let active = {
            let mut slot = lock_slot(&self.slot);
            let live = matches!(
                slot.state,
                SupervisorState::Starting | SupervisorState::Running | SupervisorState::Stopping
            );
            slot.state = SupervisorState::Idle;
            if live {
                slot.active.take()
            } else {
                None
            }
        };
        if let Some(active) = active {
            if active.info.pid != 0 {
                for failure in tree::kill_tree(active.info.pid) {
                    tracing::debug!(target: "hk3.supervisor", %failure, "teardown kill failed");
                }
            }
        }
    }
}

enum Wake {
    Exited(std::io::Result<std::process::ExitStatus>),
    Kill(Option<KillRequest>),
}

async fn watch_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<KillRequest>,
    slot: Arc<Mutex<Slot>>,
    sink: Arc<dyn EventSink>,
    info: ProcessInfo,
) {
    let status = loop {
        let wake = tokio::select! {
            res = child.wait() => Wake::Exited(res),
            req = kill_rx.recv() => Wake::Kill(req),
        };
        match wake {
            Wake::Exited(res) => break res,
            Wake::Kill(Some(reply)) => {
                let _ = reply.send(child.start_kill());
            }
            // Supervisor dropped: teardown already killed the tree.
            Wake::Kill(None) => break child.wait().await,
        }
    };

    let notice = match &status {
        Ok(s) => ExitOutcome::from_status(*s).describe(),
        Err(e) => format!("Process exited (status unavailable: {e})."),
    };
    let code = status
        .as_ref()
        .ok()
        .map(|s| ExitOutcome::from_status(*s).normalized());

    let mut guard = lock_slot(&slot);
    let owns_run = guard.state == SupervisorState::Running
        && guard
            .active
            .as_ref()
            .is_some_and(|a| a.info.run_id == info.run_id);
    if owns_run {
        guard.state = SupervisorState::Exited;
        guard.active = None;
        sink.emit(SupervisorEvent::Log(LogEvent::notice(notice)));
        sink.emit(SupervisorEvent::Exited {
            pid: info.pid,
            code,
        });
        tracing::info!(
            target: "hk3.supervisor",
            run_id = %info.run_id,
            pid = info.pid,
            code = ?code,
            "worker exited"
        );
    } else {
        tracing::debug!(
            target: "hk3.supervisor",
            run_id = %info.run_id,
            pid = info.pid,
            "exit observed after stop claimed the run"
        );
    }
}
