//! Concurrent fan-out with all-or-nothing aggregation.
//!
//! Sub-requests run as separate tasks. The join waits for every one of them
//! before deciding, and the first failure to arrive decides the outcome; the
//! other results are dropped. Tasks live in a [`JoinSet`], so dropping the
//! join (the inbound request went away) aborts whatever is still running.

use std::future::Future;

use futures::{future::BoxFuture, FutureExt};
use tokio::task::JoinSet;

use crate::{
    core::{GatewayError, GatewayResult},
    internal_error,
};

pub struct FanOut<T> {
    label: &'static str,
    tasks: Vec<(&'static str, BoxFuture<'static, GatewayResult<T>>)>,
}

impl<T> FanOut<T>
where
    T: Send + 'static,
{
    /// `label` names the endpoint in logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            tasks: Vec::new(),
        }
    }

    /// Queue a sub-request owned by `service`.
    pub fn task<F>(mut self, service: &'static str, fut: F) -> Self
    where
        F: Future<Output = GatewayResult<T>> + Send + 'static,
    {
        self.tasks.push((service, fut.boxed()));
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Results in submission order, or the first error observed.
    pub async fn join(self) -> GatewayResult<Vec<T>> {
        let total = self.tasks.len();
        if total == 1 {
            // nothing to overlap with
            let mut tasks = self.tasks;
            let (_, fut) = tasks.remove(0);
            return fut.await.map(|value| vec![value]);
        }

        let mut set = JoinSet::new();
        for (index, (service, fut)) in self.tasks.into_iter().enumerate() {
            set.spawn(async move { (index, service, fut.await) });
        }

        let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut first_error = None;

        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok((index, _, Ok(value))) => {
                    results[index] = Some(value);
                    continue;
                }
                Ok((_, service, Err(source))) => GatewayError::Aggregate {
                    service,
                    source: Box::new(source),
                },
                Err(e) => internal_error!("{} sub-request aborted: {}", self.label, e),
            };

            log::warn!("{}: sub-request failed: {failure}", self.label);
            if first_error.is_none() {
                first_error = Some(failure);
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        results
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| internal_error!("{} lost a sub-result", self.label))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use tokio::time::sleep;

    use super::*;
    use crate::backend::{BackendError, ErrorKind};

    fn failing(message: &str) -> GatewayError {
        GatewayError::Backend(BackendError::new(ErrorKind::Internal, message))
    }

    #[tokio::test]
    async fn test_results_keep_submission_order() {
        let results = FanOut::new("test")
            .task("a", async {
                sleep(Duration::from_millis(30)).await;
                Ok(1)
            })
            .task("b", async { Ok(2) })
            .task("c", async {
                sleep(Duration::from_millis(10)).await;
                Ok(3)
            })
            .join()
            .await
            .unwrap();
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_one_failure_fails_all_after_barrier() {
        let finished = Arc::new(AtomicUsize::new(0));

        let slow_ok = |delay: u64, value: u32| {
            let finished = finished.clone();
            async move {
                sleep(Duration::from_millis(delay)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }
        };

        let err = FanOut::new("test")
            .task("profile", slow_ok(40, 1))
            .task("orders", async { Err(failing("orders down")) })
            .task("reviews", slow_ok(20, 3))
            .join()
            .await
            .unwrap_err();

        assert_eq!(err.public_message(), "failed to orders: orders down");
        // the failure did not cut the barrier short
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_error_wins() {
        let err = FanOut::<u32>::new("test")
            .task("late", async {
                sleep(Duration::from_millis(40)).await;
                Err(failing("late"))
            })
            .task("early", async { Err(failing("early")) })
            .join()
            .await
            .unwrap_err();
        assert_eq!(err.public_message(), "failed to early: early");
    }

    #[tokio::test]
    async fn test_not_found_status_survives_aggregation() {
        let err = FanOut::<u32>::new("test")
            .task("orders", async {
                Err(GatewayError::Backend(BackendError::new(
                    ErrorKind::NotFound,
                    "order not found",
                )))
            })
            .task("reviews", async { Ok(1) })
            .join()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_single_task_runs_inline() {
        let err = FanOut::<u32>::new("test")
            .task("orders", async { Err(failing("boom")) })
            .join()
            .await
            .unwrap_err();
        // not wrapped: nothing was aggregated
        assert_eq!(err.public_message(), "boom");
    }

    #[tokio::test]
    async fn test_panicking_task_is_internal_error() {
        let err = FanOut::<u32>::new("test")
            .task("a", async { panic!("bug") })
            .task("b", async { Ok(1) })
            .join()
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }

    #[tokio::test]
    async fn test_dropping_join_aborts_tasks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let counter2 = finished.clone();

        let join = FanOut::new("test")
            .task("a", async move {
                sleep(Duration::from_millis(50)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .task("b", async move {
                sleep(Duration::from_millis(50)).await;
                counter2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .join();

        assert!(tokio::time::timeout(Duration::from_millis(10), join)
            .await
            .is_err());
        sleep(Duration::from_millis(80)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
