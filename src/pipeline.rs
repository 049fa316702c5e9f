//! Edit-to-commentary pipeline.
//!
//! [`Narrator`] handles one watch event end to end: read the file, let the
//! tracker decide whether it is worth commenting on, build the prompt and
//! stream the model's answer to the console. [`Dispatcher`] gives every path
//! its own worker queue, so edits of one file are handled strictly in order
//! while different files proceed independently.

use crate::errors::TrackerError;
use crate::inference::InferenceClient;
use crate::prompt::{PromptStyle, build_prompt};
use crate::tracker::{ChangeTracker, FileEdit};
use crate::ui::{CommentaryWriter, print_failure};
use crate::watch::{WatchEvent, WatchEventKind};
use futures::StreamExt;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Console sink shared by every worker.
pub type SharedConsole = Arc<Mutex<CommentaryWriter<Box<dyn Write + Send>>>>;

/// Wrap a writer as a [`SharedConsole`].
pub fn shared_console(writer: CommentaryWriter<Box<dyn Write + Send>>) -> SharedConsole {
    Arc::new(Mutex::new(writer))
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The tracker found nothing worth reporting
    Suppressed,
    /// Commentary was streamed
    Narrated { tokens: usize },
    /// The file was removed and its tracking state dropped
    Forgotten,
    /// A failure was reported on the console
    Failed,
}

pub struct Narrator {
    tracker: Arc<dyn ChangeTracker>,
    client: InferenceClient,
    style: PromptStyle,
    console: SharedConsole,
}

impl Narrator {
    pub fn new(
        tracker: Arc<dyn ChangeTracker>,
        client: InferenceClient,
        style: PromptStyle,
        console: SharedConsole,
    ) -> Self {
        Self {
            tracker,
            client,
            style,
            console,
        }
    }

    pub async fn handle(&self, event: &WatchEvent) -> EditOutcome {
        if event.kind == WatchEventKind::Removed {
            tracing::debug!(path = %event.relative, "file removed, dropping its baseline");
            self.tracker.forget(&event.path).await;
            return EditOutcome::Forgotten;
        }

        let edit = match read_edit(event).await {
            Ok(edit) => edit,
            Err(TrackerError::FileRead { source, .. })
                if source.kind() == std::io::ErrorKind::InvalidData =>
            {
                tracing::debug!(path = %event.relative, "not UTF-8 text, skipping");
                return EditOutcome::Suppressed;
            }
            Err(e) => {
                tracing::error!(path = %event.relative, "read failed: {e}");
                print_failure(&event.relative, "read", &e, None);
                return EditOutcome::Failed;
            }
        };

        let Some(report) = self.tracker.observe(&edit).await else {
            return EditOutcome::Suppressed;
        };

        let prompt = build_prompt(&report, &self.style);
        self.narrate(&report.display_path, &prompt).await
    }

    /// Stream commentary for one prompt. The console is held for the whole
    /// answer so two files never interleave their tokens.
    async fn narrate(&self, display_path: &str, prompt: &str) -> EditOutcome {
        let mut console = self.console.lock().await;

        let mut tokens = match self.client.generate(prompt).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(path = %display_path, "generate failed: {e}");
                print_failure(display_path, "generate", &e, Some(e.hint()));
                return EditOutcome::Failed;
            }
        };

        if let Err(e) = console.begin(display_path) {
            tracing::warn!("console write failed: {e}");
        }

        let mut count = 0;
        let mut outcome = None;
        while let Some(token) = tokens.next().await {
            match token {
                Ok(token) => {
                    count += 1;
                    if let Err(e) = console.token(&token.text) {
                        tracing::warn!("console write failed: {e}");
                    }
                }
                Err(e) => {
                    tracing::error!(path = %display_path, "stream failed: {e}");
                    outcome = Some((e.to_string(), e.hint()));
                    break;
                }
            }
        }

        if let Err(e) = console.end() {
            tracing::warn!("console write failed: {e}");
        }

        match outcome {
            Some((message, hint)) => {
                print_failure(display_path, "stream", &message, Some(hint));
                EditOutcome::Failed
            }
            None => EditOutcome::Narrated { tokens: count },
        }
    }
}

async fn read_edit(event: &WatchEvent) -> Result<FileEdit, TrackerError> {
    let content = tokio::fs::read_to_string(&event.path)
        .await
        .map_err(|source| TrackerError::FileRead {
            path: event.path.clone(),
            source,
        })?;

    Ok(FileEdit {
        path: event.path.clone(),
        display_path: event.relative.clone(),
        content,
    })
}

/// Routes events to one sequential worker per path.
pub struct Dispatcher {
    narrator: Arc<Narrator>,
    queues: HashMap<PathBuf, mpsc::UnboundedSender<WatchEvent>>,
}

impl Dispatcher {
    pub fn new(narrator: Arc<Narrator>) -> Self {
        Self {
            narrator,
            queues: HashMap::new(),
        }
    }

    /// Queue `event` behind any earlier events for the same path.
    pub fn dispatch(&mut self, event: WatchEvent) {
        // Workers of removed files close their queue once idle
        self.queues.retain(|_, queue| !queue.is_closed());

        let event = match self.queues.get(&event.path) {
            Some(queue) => match queue.send(event) {
                Ok(()) => return,
                // Worker exited; start a fresh one below
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let path = event.path.clone();
        // A freshly created receiver is open, so this cannot fail.
        let _ = tx.send(event);
        tokio::spawn(path_worker(self.narrator.clone(), rx));
        self.queues.insert(path, tx);
    }

    /// Number of paths with a live worker.
    pub fn workers(&self) -> usize {
        self.queues.values().filter(|queue| !queue.is_closed()).count()
    }
}

/// Take `first` and everything already queued behind it, keeping only the
/// newest event. Also returns whether a removal was skipped over.
fn collapse(
    first: WatchEvent,
    rx: &mut mpsc::UnboundedReceiver<WatchEvent>,
) -> (WatchEvent, bool) {
    let mut event = first;
    let mut removed = false;
    while let Ok(newer) = rx.try_recv() {
        removed |= event.kind == WatchEventKind::Removed;
        event = newer;
    }
    (event, removed)
}

/// Handle a path's events in arrival order. Events that piled up while the
/// previous one was being handled collapse into the newest, since the file is
/// re-read anyway; a removal inside the batch still resets the path first.
/// After a removal with nothing queued the worker closes its queue and exits.
async fn path_worker(narrator: Arc<Narrator>, mut rx: mpsc::UnboundedReceiver<WatchEvent>) {
    while let Some(first) = rx.recv().await {
        let (event, removed) = collapse(first, &mut rx);
        if removed && event.kind == WatchEventKind::Changed {
            tracing::debug!(path = %event.relative, "file was re-created, dropping its baseline");
            narrator.tracker.forget(&event.path).await;
        }

        let outcome = narrator.handle(&event).await;
        tracing::debug!(path = %event.relative, ?outcome, "event handled");

        if outcome == EditOutcome::Forgotten && rx.is_empty() {
            // Anything that raced the close is still drained by this loop
            rx.close();
        }
    }
}
