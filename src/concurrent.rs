use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Semaphore-bounded fan-out/fan-in executor.
///
/// Permits are taken before spawning, so at most `concurrency` tasks exist
/// at once and the producer is back-pressured. Dropping an unfinished
/// `execute` future aborts the tasks it spawned.
pub struct ConcurrentProbe {
    semaphore: Arc<Semaphore>,
    completed: Arc<AtomicUsize>,
    panicked: Arc<AtomicUsize>,
}

impl ConcurrentProbe {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            completed: Arc::new(AtomicUsize::new(0)),
            panicked: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `task_fn` over every input and collect the outputs in completion order.
    ///
    /// Outputs are expected to carry their own per-task failures. A task
    /// that panics is a bug, not a probe failure: the remaining tasks are
    /// still drained, then an error is returned.
    pub async fn execute<T, F, Fut>(&self, tasks: Vec<T>, task_fn: F) -> anyhow::Result<Vec<Fut::Output>>
    where
        F: Fn(T) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future + Send + 'static,
        Fut::Output: Send + 'static,
        T: Send + 'static,
    {
        let mut set = JoinSet::new();

        for task in tasks {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .context("probe semaphore closed")?;
            let task_fn = task_fn.clone();
            let completed = self.completed.clone();

            set.spawn(async move {
                let result = task_fn(task).await;
                completed.fetch_add(1, Ordering::Relaxed);
                drop(permit);
                result
            });
        }

        let mut results = Vec::new();
        let mut first_panic = None;
        while let Some(result) = set.join_next().await {
            match result {
                Ok(output) => results.push(output),
                Err(e) => {
                    self.panicked.fetch_add(1, Ordering::Relaxed);
                    first_panic.get_or_insert(e);
                }
            }
        }

        match first_panic {
            Some(e) => Err(anyhow::Error::new(e).context("probe task failed")),
            None => Ok(results),
        }
    }

    /// (completed, panicked) task counts since construction.
    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.panicked.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_execute_collects_all_outputs() {
        let exec = ConcurrentProbe::new(3);
        let mut out = exec
            .execute((1..=10).collect(), |n: u32| async move { n * 2 })
            .await
            .unwrap();
        out.sort();
        assert_eq!(out, (1..=10).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(exec.get_stats(), (10, 0));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let exec = ConcurrentProbe::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (f, p) = (in_flight.clone(), peak.clone());
        exec.execute((0..8).collect::<Vec<u32>>(), move |_| {
            let (f, p) = (f.clone(), p.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                f.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let exec = ConcurrentProbe::new(4);
        let res = exec
            .execute(vec![1u32, 2, 3], |n| async move {
                if n == 2 {
                    panic!("bad input");
                }
                n
            })
            .await;
        assert!(res.is_err());
        assert_eq!(exec.get_stats().1, 1);
    }

    #[tokio::test]
    async fn test_dropping_execute_aborts_tasks() {
        let exec = ConcurrentProbe::new(4);
        let finished = Arc::new(AtomicUsize::new(0));

        let f = finished.clone();
        let run = exec.execute(vec![1u32, 2, 3], move |_| {
            let f = f.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                f.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(tokio::time::timeout(Duration::from_millis(50), run).await.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
