mod logging;
mod replay;
mod scenario;
mod settings;

use scenario::Scenario;
use settings::Settings;
use std::process::ExitCode;

fn main() -> ExitCode {
    logging::setup_logging();
    let settings = Settings::from_cli();

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> scenario::Result<()> {
    let scenario = Scenario::load(&settings.scenario)?;
    let config = settings.apply(scenario.config.clone());
    tracing::debug!(?config, "Effective configuration");

    let quiet = settings.quiet;
    let report = replay::run(&scenario, config, move |event| {
        if quiet {
            return;
        }
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("Could not serialize change notification: {e}"),
        }
    })?;

    tracing::info!(
        changes = report.changes.len(),
        shown = report.shown_count,
        markers = report.marker_count,
        "Replay finished"
    );
    let summary = if settings.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{summary}");
    Ok(())
}
