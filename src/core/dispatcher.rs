use crate::utils::error::{GeoError, ProviderError, Result};
use futures::future::join_all;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 滑動視窗長度
pub const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub max_concurrent: usize,
    pub max_per_second: usize,
}

impl RateLimits {
    pub fn new(max_concurrent: usize, max_per_second: usize) -> Result<Self> {
        crate::utils::validation::validate_limits("", max_concurrent, max_per_second)?;
        Ok(Self {
            max_concurrent,
            max_per_second,
        })
    }
}

/// 單一任務的結果；失敗不會中斷整批
#[derive(Debug, PartialEq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(ProviderError),
    /// 取消訊號出現時尚未被放行
    NotStarted,
}

impl<T> TaskOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// 記錄最近一秒內「開始」的時間點
struct SlidingWindow {
    limit: usize,
    starts: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            starts: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// 鎖在等待期間持有，等候者依序放行
    async fn admit(&self) {
        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while let Some(front) = starts.front() {
                if now.duration_since(*front) >= WINDOW {
                    starts.pop_front();
                } else {
                    break;
                }
            }

            if starts.len() < self.limit {
                starts.push_back(now);
                return;
            }

            if let Some(oldest) = starts.front().copied() {
                tokio::time::sleep_until(oldest + WINDOW).await;
            }
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 同時限制並行數與每秒啟動數。每個供應商層級共用一個實例。
#[derive(Clone)]
pub struct Dispatcher {
    limits: RateLimits,
    semaphore: Arc<Semaphore>,
    window: Arc<SlidingWindow>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    started: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            semaphore: Arc::new(Semaphore::new(limits.max_concurrent)),
            window: Arc::new(SlidingWindow::new(limits.max_per_second)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// 等待放行後執行單一任務。只有內部不變量被破壞時才回傳 `Err`。
    pub async fn call<T, F, Fut>(&self, task: F, cancel: &CancellationToken) -> Result<TaskOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        if cancel.is_cancelled() {
            return Ok(TaskOutcome::NotStarted);
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TaskOutcome::NotStarted),
            permit = self.semaphore.acquire() => permit.map_err(|_| GeoError::DispatcherClosed)?,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TaskOutcome::NotStarted),
            _ = self.window.admit() => {}
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);

        if current > self.limits.max_concurrent {
            return Err(GeoError::RateLimitViolation {
                admitted: current,
                limit: self.limits.max_concurrent,
            });
        }

        match task().await {
            Ok(value) => Ok(TaskOutcome::Completed(value)),
            Err(cause) => {
                tracing::debug!("Task failed inside dispatcher: {}", cause);
                Ok(TaskOutcome::Failed(cause))
            }
        }
    }

    /// 批次執行，結果依提交順序排列
    pub async fn run<T, F, Fut>(
        &self,
        tasks: Vec<F>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskOutcome<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        tracing::debug!(
            "Dispatching {} tasks (max {} at once, {} per second)",
            tasks.len(),
            self.limits.max_concurrent,
            self.limits.max_per_second
        );
        let calls = tasks.into_iter().map(|task| self.call(task, cancel));
        join_all(calls).await.into_iter().collect()
    }
}
