use hk3_launcher_core::api::{RunMode, SessionController, SessionUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::app::AppContext;
use crate::commands::cli::RunArgs;
use crate::commands::run::print_event;

const HELP: &str = "\
commands:
  calibrate   start the calibration tool
  agent       start the agent runner
  stop        stop the active run and its helpers
  status      show whether a run is active
  save        save the transcript to the log directory
  clear       clear the transcript
  help        show this help
  quit        stop any active run and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Run(RunMode),
    Stop,
    Status,
    Save,
    Clear,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let cmd = match line.trim().to_ascii_lowercase().as_str() {
        "" => return Ok(None),
        "calibrate" | "calibration" | "c" => ConsoleCommand::Run(RunMode::Calibration),
        "agent" | "run" | "a" => ConsoleCommand::Run(RunMode::Agent),
        "stop" | "s" => ConsoleCommand::Stop,
        "status" => ConsoleCommand::Status,
        "save" => ConsoleCommand::Save,
        "clear" => ConsoleCommand::Clear,
        "help" | "?" | "h" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command: {other} (try 'help')")),
    };
    Ok(Some(cmd))
}

/// Interactive session: transcript lines go to stdout as they arrive,
/// commands are read line by line from stdin.
pub async fn run_console(ctx: &mut AppContext) -> anyhow::Result<i32> {
    let session = ctx.session();
    let printer = tokio::spawn(print_updates(session.subscribe()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut ctrl_c => None,
        };
        let Some(line) = line else {
            break;
        };

        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };
        match cmd {
            ConsoleCommand::Run(mode) => {
                ctx.reload();
                match ctx.run_configuration(&RunArgs::default()) {
                    Ok(config) => {
                        match mode {
                            RunMode::Calibration => session.run_calibration(&config),
                            RunMode::Agent => session.run_agent(&config),
                        };
                    }
                    Err(e) => session.notice(format!("Failed to start {mode}: {e:#}")),
                }
            }
            ConsoleCommand::Stop => {
                session.stop().await;
            }
            ConsoleCommand::Status => print_status(&session),
            ConsoleCommand::Save => {
                session.save_log();
            }
            ConsoleCommand::Clear => session.clear_output(),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => break,
        }
    }

    if session.is_running() {
        session.stop().await;
    }
    // Let the printer show the final notices before exiting.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    printer.abort();
    Ok(0)
}

fn print_status(session: &SessionController) {
    match session.current_process() {
        Some(info) => println!(
            "running: pid {} since {}",
            info.pid,
            info.started_at.format("%H:%M:%S")
        ),
        None => println!("idle"),
    }
    let commands = session.commands();
    println!(
        "available: start={} stop={}",
        commands.can_start, commands.can_stop
    );
}

async fn print_updates(mut updates: broadcast::Receiver<SessionUpdate>) {
    loop {
        match updates.recv().await {
            Ok(SessionUpdate::Line(ev)) => print_event(&ev),
            Ok(SessionUpdate::Cleared) => println!("-- output cleared --"),
            Ok(SessionUpdate::RunningChanged { running, .. }) => {
                tracing::debug!(running, "console saw running change");
            }
            Ok(SessionUpdate::RunEnded { .. } | SessionUpdate::OutputDrained { .. }) => {}
            Err(RecvError::Lagged(missed)) => {
                eprintln!("-- {missed} lines skipped on screen; use 'save' for the full log --");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command(" Calibrate "),
            Ok(Some(ConsoleCommand::Run(RunMode::Calibration)))
        );
        assert_eq!(
            parse_command("agent"),
            Ok(Some(ConsoleCommand::Run(RunMode::Agent)))
        );
        assert_eq!(parse_command("q"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse_command(""), Ok(None));
        assert!(parse_command("launch").is_err());
    }
}
