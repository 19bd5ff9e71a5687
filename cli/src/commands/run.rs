use std::time::Duration;

use hk3_launcher_core::api::{LogEvent, RunMode, RunOutcome, SessionController, SessionUpdate};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::app::AppContext;
use crate::commands::cli::RunArgs;

/// How long to keep reading output after the run ended. Orphaned helpers
/// can hold the pipes open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Exit status when the run was stopped by Ctrl-C.
const STOPPED_STATUS: i32 = 130;

pub fn print_event(ev: &LogEvent) {
    println!("{}", ev.render());
}

/// Runs one mode to completion, mirroring transcript lines to stdout.
/// Returns the status the launcher should exit with.
pub async fn run_once(ctx: &AppContext, mode: RunMode, overrides: &RunArgs) -> anyhow::Result<i32> {
    let config = ctx.run_configuration(overrides)?;
    let session = ctx.session();
    let mut updates = session.subscribe();

    let outcome = match mode {
        RunMode::Calibration => session.run_calibration(&config),
        RunMode::Agent => session.run_agent(&config),
    };
    let info = match outcome {
        RunOutcome::Started(info) => info,
        RunOutcome::Rejected | RunOutcome::Failed => {
            for ev in session.transcript().events() {
                print_event(ev);
            }
            return Ok(1);
        }
    };
    tracing::debug!(pid = info.pid, run_id = %info.run_id, %mode, "one-shot run started");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;
    let mut status: Option<i32> = None;
    let mut drained = false;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(SessionUpdate::Line(ev)) => print_event(&ev),
                Ok(SessionUpdate::RunEnded { pid, code }) if pid == info.pid => {
                    status = Some(code.unwrap_or(STOPPED_STATUS));
                    deadline = Some(Instant::now() + DRAIN_GRACE);
                }
                Ok(SessionUpdate::OutputDrained { pid }) if pid == info.pid => drained = true,
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "output display fell behind; lines skipped on screen");
                }
                Err(RecvError::Closed) => break,
            },
            res = &mut ctrl_c, if !stopping => {
                stopping = true;
                if let Err(e) = res {
                    tracing::warn!(error = %e, "ctrl-c handler failed");
                }
                session.stop().await;
            }
            _ = sleep_until_opt(deadline) => {
                tracing::debug!("output drain grace period elapsed");
                break;
            }
        }
        if status.is_some() && drained {
            break;
        }
    }

    finish(&session, overrides.save_log);
    Ok(status.unwrap_or(1))
}

fn finish(session: &SessionController, save_log: bool) {
    if !save_log {
        return;
    }
    // Either "Log saved to: ..." or the failure notice.
    session.save_log();
    if let Some(last) = session.transcript().events().last() {
        print_event(last);
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
