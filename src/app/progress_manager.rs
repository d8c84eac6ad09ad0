//! Progress UI (bar or spinner) for a running download.

use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use musicdl_core::{GaugeReading, ProgressGauge};
use tokio_util::sync::CancellationToken;

/// Spawns the progress UI when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `enabled` is false, returns (None, stop) with stop already cancelled.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    gauge: &ProgressGauge,
    label: String,
) -> (Option<tokio::task::JoinHandle<()>>, CancellationToken) {
    let stop = CancellationToken::new();
    if !enabled {
        stop.cancel();
        return (None, stop);
    }
    let handle = spawn_bar_inner(gauge, label, stop.clone());
    (Some(handle), stop)
}

fn spawn_bar_inner(
    gauge: &ProgressGauge,
    label: String,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = gauge.subscribe();
    tokio::spawn(async move {
        let bar = ProgressBar::new(100);
        bar.set_style(percent_style());
        bar.set_message(label);

        let mut seen_transfer = false;
        let mut spinner_mode = false;
        loop {
            let reading = *rx.borrow_and_update();
            match reading {
                GaugeReading::Percent(percent) => {
                    seen_transfer = true;
                    bar.set_position(u64::from(percent));
                }
                GaugeReading::Indeterminate(bytes) => {
                    if !spinner_mode {
                        spinner_mode = true;
                        bar.set_style(spinner_style());
                        bar.enable_steady_tick(Duration::from_millis(100));
                    }
                    seen_transfer = true;
                    bar.set_prefix(HumanBytes(bytes).to_string());
                }
                GaugeReading::Idle if seen_transfer => break,
                GaugeReading::Idle => {}
            }

            tokio::select! {
                () = stop.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        bar.finish_and_clear();
    })
}

fn percent_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg} {prefix}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
