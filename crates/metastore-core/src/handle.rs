//! Async handle returned by every dispatched operation

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::{DataObjectError, Result};

/// Completion handle for an operation running on a runtime worker.
///
/// Awaiting yields the operation result. Dropping or [`cancel`](Self::cancel)ling the handle
/// only discards the notification: the backend call already in flight keeps running.
#[derive(Debug)]
pub struct OperationHandle<T> {
    inner: Inner<T>,
}

#[derive(Debug)]
enum Inner<T> {
    Task(JoinHandle<Result<T>>),
    Ready(Option<Result<T>>),
}

impl<T: Send + 'static> OperationHandle<T> {
    /// Spawn `fut` on `runtime` and return immediately
    pub fn spawn<F>(runtime: &Handle, fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: Inner::Task(runtime.spawn(fut)),
        }
    }
}

// The pending result is never pinned structurally.
impl<T> Unpin for OperationHandle<T> {}

impl<T> OperationHandle<T> {
    /// A handle that is already complete, for requests rejected before dispatch
    pub fn ready(result: Result<T>) -> Self {
        Self {
            inner: Inner::Ready(Some(result)),
        }
    }

    /// Stop listening for the result
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the result is available without waiting
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            Inner::Task(task) => task.is_finished(),
            Inner::Ready(_) => true,
        }
    }
}

impl<T> Future for OperationHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            Inner::Task(task) => Pin::new(task).poll(cx).map(|joined| match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(DataObjectError::BackendUnavailable(
                    "operation was cancelled before completing".to_string(),
                )),
                Err(e) => Err(DataObjectError::BackendUnavailable(format!(
                    "operation task failed: {}",
                    e
                ))),
            }),
            Inner::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(DataObjectError::BackendUnavailable(
                    "operation result already taken".to_string(),
                ))
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_result_is_delivered() {
        let handle = OperationHandle::spawn(&Handle::current(), async { Ok(7) });
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let handle: OperationHandle<u8> =
            OperationHandle::ready(Err(DataObjectError::Validation("no tenant".to_string())));
        assert!(handle.is_finished());
        assert!(matches!(handle.await, Err(DataObjectError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancel_does_not_stop_in_flight_call() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = OperationHandle::spawn(&Handle::current(), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_backend_error() {
        let handle: OperationHandle<()> =
            OperationHandle::spawn(&Handle::current(), async {
                if true {
                    panic!("engine exploded");
                }
                Ok(())
            });
        assert!(matches!(
            handle.await,
            Err(DataObjectError::BackendUnavailable(_))
        ));
    }
}
