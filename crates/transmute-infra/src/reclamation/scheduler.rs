use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::time::DelayQueue;
use transmute_core::Artifact;
use transmute_storage::{ArtifactStore, RemoveOutcome};

enum Command {
    Register {
        artifact: Artifact,
        retention: Duration,
    },
    Shutdown,
}

/// Handle to the background reclamation task
///
/// Cheap to clone. Registration never blocks and never fails; the same artifact may be
/// registered any number of times.
#[derive(Clone)]
pub struct ReclamationScheduler {
    tx: mpsc::UnboundedSender<Command>,
    pending: Arc<AtomicUsize>,
}

impl ReclamationScheduler {
    /// Start the background reclamation task
    /// Returns the scheduler handle and a JoinHandle for graceful shutdown
    pub fn start(store: Arc<dyn ArtifactStore>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn(run(store, rx, pending.clone()));

        (Self { tx, pending }, handle)
    }

    /// Schedule `artifact` for removal once `retention` has elapsed from now
    pub fn register(&self, artifact: &Artifact, retention: Duration) {
        self.pending.fetch_add(1, Ordering::SeqCst);

        let command = Command::Register {
            artifact: artifact.clone(),
            retention,
        };
        if self.tx.send(command).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(
                artifact = %artifact,
                "Reclamation scheduler stopped, artifact will not be reclaimed"
            );
            return;
        }

        tracing::debug!(
            artifact = %artifact,
            retention_secs = retention.as_secs_f64(),
            "Artifact scheduled for reclamation"
        );
    }

    /// Number of registrations whose removal has not completed yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop the background task. Pending entries are dropped.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

async fn run(
    store: Arc<dyn ArtifactStore>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    pending: Arc<AtomicUsize>,
) {
    let mut queue: DelayQueue<Artifact> = DelayQueue::new();

    tracing::info!("Reclamation scheduler started");

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Register { artifact, retention }) => {
                    queue.insert(artifact, retention);
                }
                Some(Command::Shutdown) | None => break,
            },
            Some(expired) = queue.next(), if !queue.is_empty() => {
                let artifact = expired.into_inner();
                let store = store.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    reclaim(store.as_ref(), &artifact).await;
                    pending.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }
    }

    let dropped = queue.len();
    pending.fetch_sub(dropped, Ordering::SeqCst);
    tracing::info!(dropped, "Reclamation scheduler stopped");
}

async fn reclaim(store: &dyn ArtifactStore, artifact: &Artifact) {
    match store.remove(artifact).await {
        Ok(RemoveOutcome::Removed) => {
            tracing::info!(artifact = %artifact, "Artifact reclaimed");
        }
        Ok(RemoveOutcome::AlreadyAbsent) => {
            tracing::debug!(artifact = %artifact, "Artifact already absent at reclamation");
        }
        Err(e) => {
            tracing::warn!(artifact = %artifact, error = %e, "Failed to reclaim artifact");
        }
    }
}
