use clap::Parser;
mod app;
mod commands;
mod logging;
use commands::cli;
use hk3_launcher_core::api::{app_data_dir, report_fatal, CliError, RunMode};

/// Exit status after an unhandled failure.
const CRASH_STATUS: i32 = 70;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    install_crash_hook();

    let mut args = cli::Args::parse();
    let cmd = args.command.take().unwrap_or(cli::Commands::Console);
    let mut ctx = app::AppContext::load(&args)?;
    let guard = logging::init(&ctx.settings.logging);
    for warning in ctx.load_warnings.drain(..) {
        warning.log();
    }

    let exit = dispatch(cmd, &mut ctx).await?;
    drop(guard);
    std::process::exit(exit);
}

async fn dispatch(cmd: cli::Commands, ctx: &mut app::AppContext) -> Result<i32, CliError> {
    let result = match cmd {
        cli::Commands::Calibrate(run_args) => {
            commands::run::run_once(ctx, RunMode::Calibration, &run_args).await
        }
        cli::Commands::Agent(run_args) => {
            commands::run::run_once(ctx, RunMode::Agent, &run_args).await
        }
        cli::Commands::Console => commands::console::run_console(ctx).await,
        cli::Commands::Settings(settings_cmd) => {
            commands::settings::run_settings(ctx, &settings_cmd)
        }
    };
    result.map_err(|e| CliError::Command(format!("{e:#}")))
}

/// One boundary for every thread and runtime worker: record the panic and
/// terminate with a distinct status.
fn install_crash_hook() {
    std::panic::set_hook(Box::new(|info| {
        let message = format!(
            "{info}\n\nbacktrace:\n{}",
            std::backtrace::Backtrace::force_capture()
        );
        match report_fatal(&app_data_dir(), &message) {
            Some(path) => eprintln!(
                "hk3-launcher hit an unexpected error. Details were written to {}",
                path.display()
            ),
            None => eprintln!("hk3-launcher hit an unexpected error:\n{message}"),
        }
        std::process::exit(CRASH_STATUS);
    }));
}
