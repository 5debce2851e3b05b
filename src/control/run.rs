//! Single-run slot shared by both controllers.

use futures_util::future::join_all;
use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::ControlError;

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveRun {
    fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Holds at most one spawned controller run.
#[derive(Default)]
pub(crate) struct RunSlot {
    inner: Mutex<Option<ActiveRun>>,
}

impl RunSlot {
    pub(crate) async fn is_running(&self) -> bool {
        self.inner.lock().await.as_ref().is_some_and(ActiveRun::is_active)
    }

    /// Spawn `make(token)` unless a run is still active. Returns whether it was spawned.
    pub(crate) async fn launch<F, Fut>(&self, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.inner.lock().await;
        if slot.as_ref().is_some_and(ActiveRun::is_active) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(make(cancel.clone()));
        *slot = Some(ActiveRun { cancel, handle });
        true
    }

    /// Cancel the active run and wait until its task has exited.
    ///
    /// The run only observes cancellation at its next scheduling boundary, so
    /// a venue call already in flight completes first. The slot stays locked
    /// until then, so a concurrent `launch` cannot overlap the old run.
    /// Returns `false` when nothing was running.
    pub(crate) async fn stop(&self) -> bool {
        let mut slot = self.inner.lock().await;
        match slot.take() {
            Some(run) if run.is_active() => {
                run.cancel.cancel();
                if let Err(e) = run.handle.await {
                    error!("Controller task ended abnormally: {}", e);
                }
                true
            }
            _ => false,
        }
    }
}

/// Await every venue call, then report the first failure.
///
/// Calls already issued are never dropped halfway because a sibling failed.
pub(crate) async fn settle_all<I>(calls: I) -> Result<(), ControlError>
where
    I: IntoIterator,
    I::Item: Future<Output = Result<(), ControlError>>,
{
    join_all(calls).await.into_iter().collect()
}
