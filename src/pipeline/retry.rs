//! Retry with exponential backoff for the extraction phase.

use std::time::Duration;

use tracing::warn;

use super::PipelineError;
use crate::extract::ExtractionError;

/// Retry schedule plus the predicate deciding which errors are worth a
/// second attempt.
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    retryable: fn(&PipelineError) -> bool,
}

impl RetryPolicy {
    /// Retries only errors that plausibly clear on their own: I/O hiccups,
    /// parser trip-ups on a file still being written, OCR backend wobble.
    /// Catalog errors never clear by retrying and are excluded.
    pub fn transient() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            retryable: is_transient,
        }
    }

    /// Retries every error. Matches the behavior of callers that predate the
    /// transient predicate.
    pub fn retry_all() -> Self {
        Self {
            retryable: |_| true,
            ..Self::transient()
        }
    }

    /// Same predicate, no sleeping. For tests.
    pub fn immediate(retryable: fn(&PipelineError) -> bool) -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            retryable,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Run `op` up to `max_attempts` times.
    ///
    /// Non-retryable errors surface immediately. Exhaustion wraps the last
    /// error in [`PipelineError::RetryExhausted`] so callers can tell "failed
    /// once" from "kept failing".
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if !(self.retryable)(&e) => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(PipelineError::RetryExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Extraction attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Delay after the `attempt`-th failure: base doubled per failure, capped.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

fn is_transient(error: &PipelineError) -> bool {
    match error {
        PipelineError::Extraction(e) => matches!(
            e,
            ExtractionError::Io(_)
                | ExtractionError::PdfParsing(_)
                | ExtractionError::OcrInit(_)
                | ExtractionError::OcrProcessing(_)
        ),
        _ => false,
    }
}
