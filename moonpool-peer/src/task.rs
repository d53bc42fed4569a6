//! Task spawning abstraction for single-threaded execution.

use std::future::Future;

/// Spawns the background work of a peer: timers and TCP writers.
///
/// Tasks run on the current thread, so callbacks spawned for one peer never
/// run concurrently with each other or with the code that owns the peer.
pub trait TaskProvider: Clone + 'static {
    /// Spawn `future` on the current thread; `name` only shows in traces.
    ///
    /// Must be called from within a `tokio::task::LocalSet`.
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + 'static;
}

/// Tokio-based task provider using `spawn_local`.
#[derive(Clone, Debug, Default)]
pub struct TokioTaskProvider;

impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        let name = name.to_string();
        tokio::task::spawn_local(async move {
            tracing::trace!(task = %name, "task started");
            future.await;
            tracing::trace!(task = %name, "task finished");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[tokio::test]
    async fn test_spawn_task_runs_locally() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let ran = Rc::new(Cell::new(false));
                let flag = ran.clone();
                let handle = TokioTaskProvider.spawn_task("flag", async move {
                    flag.set(true);
                });
                handle.await.unwrap();
                assert!(ran.get());
            })
            .await;
    }
}
