//! The watch loop: `narrate watch`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use narrate::inference::InferenceClient;
use narrate::narrate_config::{CliOverrides, NarrateConfig};
use narrate::pipeline::{Dispatcher, Narrator, shared_console};
use narrate::tracker::{build_tracker, revisions_for};
use narrate::ui::{CommentaryWriter, print_watching};
use narrate::watch::{DirWatcher, PathFilter};

pub async fn cmd_watch(dir: &Path, overrides: CliOverrides) -> Result<()> {
    let config = NarrateConfig::with_overrides(dir.to_path_buf(), overrides)?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let settings = config.tracker_settings();
    tracing::info!(
        mode = %settings.mode,
        diff = %settings.diff,
        cache_size = settings.cache_size,
        reset_threshold = settings.reset_threshold,
        "tracker configured"
    );

    let client = InferenceClient::new(&config.endpoint(), &config.model())
        .context("Invalid model endpoint")?;
    tracing::info!(endpoint = %client.endpoint(), model = %client.model(), "model server");
    let model = client.model().to_string();

    let tracker = build_tracker(&settings, revisions_for(&config.root));
    let console = shared_console(CommentaryWriter::stdout().boxed());
    let narrator = Arc::new(Narrator::new(
        tracker,
        client,
        config.style().clone(),
        console,
    ));
    let mut dispatcher = Dispatcher::new(narrator);

    let patterns = config.patterns();
    let filter = PathFilter::new(&patterns, &config.ignore())?;
    let mut watcher = DirWatcher::start(&config.root, filter)?;
    print_watching(watcher.root(), &patterns, &model);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("interrupted, stopping watcher");
                break;
            }
            event = watcher.next() => {
                let Some(event) = event else {
                    tracing::warn!("file watcher closed");
                    break;
                };
                tracing::debug!(path = %event.relative, kind = ?event.kind, "file event");
                dispatcher.dispatch(event);
            }
        }
    }

    drop(watcher);
    eprintln!();
    Ok(())
}
