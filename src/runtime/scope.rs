//! Cancellation scopes.
//!
//! Every actor owns two scopes: a whole-lifetime scope for background
//! effects and a state scope replaced on every lifecycle-running
//! transition. Closing a scope interrupts everything forked into it and
//! stops every child actor adopted by it before `close` returns.

use crate::runtime::actor::ErasedActor;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    label: String,
    entries: Mutex<Entries>,
}

#[derive(Default)]
struct Entries {
    closed: bool,
    tasks: Vec<JoinHandle<()>>,
    children: Vec<Arc<dyn ErasedActor>>,
}

impl Scope {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                label: label.into(),
                entries: Mutex::new(Entries::default()),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_closed(&self) -> bool {
        self.inner.entries.lock().closed
    }

    /// Run `task` until it finishes or the scope closes.
    ///
    /// Returns `false` (and never starts the task) if the scope is closed.
    pub fn fork<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut entries = self.inner.entries.lock();
        if entries.closed {
            return false;
        }
        entries.tasks.retain(|handle| !handle.is_finished());
        entries.tasks.push(tokio::spawn(task));
        true
    }

    /// Tie a child actor's lifetime to this scope.
    pub(crate) fn adopt(&self, child: Arc<dyn ErasedActor>) -> Result<(), Arc<dyn ErasedActor>> {
        let mut entries = self.inner.entries.lock();
        if entries.closed {
            return Err(child);
        }
        entries.children.retain(|c| !c.is_stopped());
        entries.children.push(child);
        Ok(())
    }

    /// Close the scope: abort tasks, stop adopted children, then await the
    /// aborted tasks.
    ///
    /// Closing an already closed scope is a no-op.
    pub async fn close(&self) {
        let (tasks, children) = {
            let mut entries = self.inner.entries.lock();
            if entries.closed {
                return;
            }
            entries.closed = true;
            (
                std::mem::take(&mut entries.tasks),
                std::mem::take(&mut entries.children),
            )
        };

        if !children.is_empty() || !tasks.is_empty() {
            debug!(
                scope = %self.inner.label,
                children = children.len(),
                tasks = tasks.len(),
                "closing scope"
            );
        }

        for handle in &tasks {
            handle.abort();
        }
        for child in children.iter().rev() {
            child.stop_boxed().await;
        }
        for handle in tasks {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(scope = %self.inner.label, "scoped task panicked");
                }
            }
        }
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("label", &self.inner.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}
