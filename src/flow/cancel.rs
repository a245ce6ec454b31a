//! Cooperative cancellation of running scripts.

use std::fmt;
use std::future::Future;
use tokio::runtime::Handle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation signal of a `work` call. Clones observe the same state.
#[derive(Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Token cancelled together with this one, but cancellable on its own.
    pub fn child(&self) -> CancelToken {
        Self(self.0.child_token())
    }

    /// Guard that cancels this token when dropped.
    pub fn drop_guard(self) -> CancelGuard {
        CancelGuard(self.0.drop_guard())
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }

    /// Runs `f` once the token is cancelled, or right away if it already
    /// is. The wait runs in the background until the returned guard is
    /// dropped; after that `f` never fires.
    ///
    /// Inside a tokio runtime the wait is a task on that runtime, otherwise
    /// it gets its own thread.
    pub fn watch(&self, f: impl FnOnce() + Send + 'static) -> CancelGuard {
        let done = CancellationToken::new();
        if self.is_cancelled() {
            f();
            return CancelGuard(done.drop_guard());
        }

        let token = self.0.clone();
        let finished = done.clone();
        let watcher = async move {
            if finished.run_until_cancelled(token.cancelled()).await.is_some() {
                f();
            }
        };
        spawn_watcher(watcher);
        CancelGuard(done.drop_guard())
    }
}

fn spawn_watcher(watcher: impl Future<Output = ()> + Send + 'static) {
    if let Ok(handle) = Handle::try_current() {
        handle.spawn(watcher);
        return;
    }
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!(error = %e, "cancellation watcher unavailable");
            return;
        }
    };
    let spawned = std::thread::Builder::new()
        .name("pipeflow-cancel".to_string())
        .spawn(move || runtime.block_on(watcher));
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "cancellation watcher unavailable");
    }
}

impl From<CancellationToken> for CancelToken {
    fn from(token: CancellationToken) -> Self {
        Self(token)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels a token when dropped. From [`CancelToken::watch`] that token is
/// the watcher's done signal, so dropping the guard stops the watcher.
#[must_use = "dropping the guard cancels immediately"]
pub struct CancelGuard(#[allow(dead_code)] DropGuard);

impl fmt::Debug for CancelGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelGuard").finish_non_exhaustive()
    }
}
