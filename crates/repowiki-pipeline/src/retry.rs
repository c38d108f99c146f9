//! Per-stage retry policies
//!
//! LLM-bearing stages retry transient failures with back-off. Streamed
//! output accumulates into a buffer local to the attempt, so a retry
//! starts from an empty buffer — attempts are never concatenated.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use repowiki_kernel::Kernel;

use crate::error::{StageError, StageResult};

#[derive(Clone, Copy, Debug)]
pub enum Backoff {
    /// Delay doubles each attempt: base, 2·base, 4·base, …
    Exponential(Duration),
    /// Delay grows by base each attempt: base, 2·base, 3·base, …
    Linear(Duration),
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Default stage policy: 3 attempts, exponential 2^n seconds.
    pub fn standard() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Exponential(Duration::from_secs(2)),
        }
    }

    /// Directory-filter policy: 5 attempts, linear 5 s × attempt.
    pub fn smart_filter() -> Self {
        Self {
            attempts: 5,
            backoff: Backoff::Linear(Duration::from_secs(5)),
        }
    }

    /// Delay after the given 1-based failed attempt.
    pub fn delay_after(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Exponential(base) => base * 2u32.saturating_pow(attempt as u32 - 1),
            Backoff::Linear(base) => base * attempt as u32,
        }
    }

    /// Run an attempt factory under this policy. Transient errors are
    /// retried; anything else fails immediately.
    pub async fn run<T, F, Fut>(&self, stage: &str, mut attempt_fn: F) -> StageResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = StageResult<T>>,
    {
        let mut last: Option<StageError> = None;
        for attempt in 1..=self.attempts {
            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        stage,
                        attempt,
                        retry_count = attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "transient stage failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| StageError::failed(stage, "retry budget exhausted")))
    }
}

/// Stream a kernel invocation to completion, accumulating into a fresh
/// buffer. Callers wrap this in a retry policy; each call starts empty.
pub async fn invoke_collected(
    kernel: &Kernel,
    prompt: String,
    cancel: CancellationToken,
) -> StageResult<String> {
    let mut buffer = String::new();
    let stream = kernel.invoke_streaming(prompt, cancel);
    tokio::pin!(stream);
    while let Some(chunk) = stream.next().await {
        buffer.push_str(&chunk?);
    }
    Ok(buffer)
}
