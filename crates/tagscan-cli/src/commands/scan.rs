//! Scan command - scan files and print the report.

use crate::app::App;
use crate::{OutputFormat, ScanArgs};
use crossbeam_channel::select;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tagscan_core::{
    organize, scan, ChannelProgress, Config, ScanEvent, ScanMetrics, ScanOutcome, TagGroup,
};

/// JSON shape of a finished scan.
#[derive(Serialize)]
struct JsonReport<'a> {
    metrics: &'a ScanMetrics,
    groups: &'a [TagGroup],
}

/// Run the scan command.
pub fn run(
    config: Config,
    args: ScanArgs,
    output: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let app = App::new(config, &args)?;
    let request = app.request(&args);

    let (progress, events) = ChannelProgress::new();
    let (done_tx, done_rx) = crossbeam_channel::bounded::<ScanOutcome>(1);
    let handle = scan::spawn(request, Some(Arc::new(progress)), move |outcome| {
        let _ = done_tx.send(outcome);
    })?;

    let show_progress = !quiet && std::io::stderr().is_terminal();
    let outcome = loop {
        select! {
            recv(done_rx) -> outcome => break outcome?,
            recv(events) -> event => {
                if let Ok(ScanEvent::Progress(scanned)) = event {
                    if show_progress {
                        eprint!("\rScanning... {} files", scanned);
                    }
                }
            }
        }
    };
    handle.join()?;
    if show_progress {
        eprintln!();
    }

    let metrics = outcome.metrics;
    let groups = organize(outcome.findings, &app.config.weights);

    match output {
        OutputFormat::Text => {
            let report = app.renderer().render(&groups, &metrics);
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.to_text().as_bytes())?;
            stdout.flush()?;
        }
        OutputFormat::Json => {
            let json = JsonReport {
                metrics: &metrics,
                groups: &groups,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
