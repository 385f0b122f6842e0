//! Process runtime for the VeriSight server: one multi-threaded tokio runtime
//! and one cancellation token that every long-lived task watches.
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct VerisightHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct VerisightRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl VerisightRuntime {
    /// Build the runtime; `worker_threads` of `None` lets tokio size the pool.
    ///
    /// ```
    /// use verisight_runtime::VerisightRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = VerisightRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder
            .build()
            .with_context(|| format!("building tokio runtime {thread_name}"))?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> VerisightHandle {
        VerisightHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and give tasks `graceful` to wind down.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl VerisightHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the shared token on Ctrl-C.
    ///
    /// Returns the watcher task; it also ends if the token is cancelled first.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.inner.spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    match res {
                        Ok(()) => tracing::info!("runtime.ctrl_c"),
                        Err(err) => tracing::warn!(error = %err, "runtime.ctrl_c_unavailable"),
                    }
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        })
    }

    /// Resolves once shutdown has been requested; hand this to the server.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let cancel = self.cancel.clone();
        async move { cancel.cancelled().await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_tasks_run_on_the_handle() {
        let runtime = VerisightRuntime::build("spawn-test", Some(1)).unwrap();
        let task = runtime.handle().spawn(async { 21 * 2 });
        assert_eq!(runtime.block_on(async move { task.await.unwrap() }), 42);
        runtime.shutdown(Duration::from_millis(10));
    }

    #[test]
    fn shutdown_signal_follows_cancellation() {
        let runtime = VerisightRuntime::build("signal-test", Some(1)).unwrap();
        let handle = runtime.handle();
        let watcher = handle.cancel_on_ctrl_c();
        let signal = handle.shutdown_signal();

        handle.cancellation().cancel();
        runtime.block_on(async move {
            tokio::time::timeout(Duration::from_secs(1), signal)
                .await
                .expect("signal resolves after cancel");
            watcher.await.unwrap();
        });
        runtime.shutdown(Duration::from_millis(10));
    }
}
