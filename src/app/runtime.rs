//! Main CLI flow: load configuration, search, show results, download a row.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result, bail};
use musicdl_core::config::default_config_path;
use musicdl_core::{AppConfig, PreferenceStore, Session, SourceId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{progress_manager, results_table};
use crate::cli::Args;

pub(crate) async fn run(args: Args) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("failed to load source configuration {}", config_path.display()))?;
    if args.strict_tls {
        config.http.accept_invalid_certs = false;
    }

    let store = args
        .prefs
        .clone()
        .map_or_else(PreferenceStore::at_default_location, PreferenceStore::new);
    debug!(config = %config_path.display(), prefs = %store.path().display(), "Configuration resolved");

    let session = Session::from_config(&config, store).context("failed to set up sources")?;

    if args.list_sources {
        print!("{}", results_table::render_sources(&session.registry().descriptors()));
        return Ok(());
    }

    if let Some(dir) = args.output_dir.as_deref() {
        let dir = session.set_download_path(dir)?;
        info!(dir = %dir.display(), "Download directory set");
    }

    let Some(keyword) = args.keyword() else {
        info!("No keyword given. Example: musicdl \"love story\" -s kuwo");
        return Ok(());
    };

    if session.registry().is_empty() {
        bail!(
            "no sources configured; add some to {} (see --list-sources)",
            config_path.display()
        );
    }

    let enabled = resolve_enabled(&session, &args.sources)?;
    info!(keyword = %keyword, sources = enabled.len(), "Searching");
    let outcome = session.search(&keyword, &enabled).await;

    eprint!(
        "{}",
        results_table::render_failures(&outcome.reports, session.registry())
    );
    if outcome.index.is_empty() {
        info!("No results");
        return Ok(());
    }
    print!(
        "{}",
        results_table::render_results(&outcome.index, session.registry())
    );

    let ordinal = match args.pick {
        Some(ordinal) => Some(ordinal),
        None if io::stdin().is_terminal() && io::stdout().is_terminal() => {
            prompt_for_row(outcome.index.len()).await?
        }
        None => None,
    };
    let Some(ordinal) = ordinal else {
        return Ok(());
    };

    let selection = session.selection(ordinal)?;
    let label = outcome
        .index
        .get(ordinal)
        .map(|t| t.song_name.clone())
        .unwrap_or_default();

    let cancel = CancellationToken::new();
    let ctrl_c = spawn_ctrl_c_watcher(cancel.clone());

    let show_progress = !args.quiet && io::stderr().is_terminal();
    let (ui_handle, ui_stop) =
        progress_manager::spawn_progress_ui(show_progress, session.gauge(), label);

    let result = session.download(selection, &cancel).await;

    ui_stop.cancel();
    if let Some(handle) = ui_handle {
        let _ = handle.await;
    }
    ctrl_c.abort();

    let outcome = result.context("download failed")?;
    println!("Saved {}", outcome.path.display());
    Ok(())
}

fn resolve_enabled(session: &Session, requested: &[String]) -> Result<Vec<SourceId>> {
    if requested.is_empty() {
        return Ok(session.default_enabled());
    }
    let enabled = session.registry().resolve_enabled(requested);
    if enabled.is_empty() {
        bail!(
            "none of the requested sources are configured: {}",
            requested.join(", ")
        );
    }
    Ok(enabled)
}

fn spawn_ctrl_c_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling download");
            cancel.cancel();
        }
    })
}

async fn prompt_for_row(rows: usize) -> Result<Option<usize>> {
    let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "Row to download (0-{}, Enter to skip): ", rows.saturating_sub(1))?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .context("prompt task failed")?
    .context("failed to read row number")?;

    parse_row_choice(&line, rows)
}

fn parse_row_choice(input: &str, rows: usize) -> Result<Option<usize>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let ordinal: usize = input
        .parse()
        .with_context(|| format!("'{input}' is not a row number"))?;
    if ordinal >= rows {
        bail!("row {ordinal} does not exist (0-{})", rows.saturating_sub(1));
    }
    Ok(Some(ordinal))
}
