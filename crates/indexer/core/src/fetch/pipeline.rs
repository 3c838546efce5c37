use crate::{CircuitBreaker, FetchConfig, FetchError, Metrics};
use futures::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Outcome of [`FetchPipeline::fetch_batched`].
#[derive(Debug)]
pub struct BatchedFetch<I, T> {
    /// Values of every sub-request that succeeded, in input order.
    pub values: Vec<T>,
    /// Sub-requests that failed inside an otherwise successful batch.
    pub failed: Vec<(I, FetchError)>,
    /// Sub-requests of batches that were exhausted or skipped by the open breaker.
    pub unfetched: Vec<I>,
}

impl<I, T> BatchedFetch<I, T> {
    /// Returns true if every sub-request produced a value.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.unfetched.is_empty()
    }
}

impl<I, T> Default for BatchedFetch<I, T> {
    fn default() -> Self {
        Self { values: Vec::new(), failed: Vec::new(), unfetched: Vec::new() }
    }
}

/// Wraps remote reads of one stream with bounded retries, exponential backoff and a circuit
/// breaker.
///
/// Batches are processed sequentially. Sub-requests inside one batch run concurrently.
#[derive(Debug)]
pub struct FetchPipeline {
    stream: String,
    config: FetchConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl FetchPipeline {
    /// Creates a pipeline that owns the given breaker.
    pub fn new(stream: impl Into<String>, config: FetchConfig, breaker: CircuitBreaker) -> Self {
        Self { stream: stream.into(), config, breaker: Mutex::new(breaker) }
    }

    /// Name of the stream, used in logs and metrics.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Returns true while the stream's breaker rejects requests.
    pub fn is_open(&self) -> bool {
        self.breaker.lock().is_open()
    }

    /// Runs one remote call with the retry and breaker policy.
    pub async fn fetch<T, E, F, Fut>(&self, call: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<FetchError>,
    {
        if let Some(open_until_ms) = self.open_until() {
            metrics::counter!(Metrics::FETCH_SKIPPED_BATCHES_TOTAL, "stream" => self.stream.clone())
                .increment(1);
            debug!(target: "fetch_pipeline", stream = %self.stream, open_until_ms, "Call skipped");
            return Err(FetchError::CircuitOpen { open_until_ms });
        }

        let attempts = self.config.attempts();
        let mut attempt = 1;
        loop {
            match call().await.map_err(Into::<FetchError>::into) {
                Ok(value) => {
                    self.breaker.lock().record_success();
                    return Ok(value);
                }
                Err(err) if attempt < attempts => {
                    self.before_retry(attempt, &err).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.on_exhausted(attempts, &err);
                    return Err(FetchError::RetriesExhausted { attempts, last: Box::new(err) });
                }
            }
        }
    }

    /// Partitions `items` into batches and fetches every item with `fetch_item`.
    ///
    /// A batch attempt fails only if all of its items failed. An exhausted batch or one skipped
    /// by the open breaker contributes no values, its items are reported as unfetched.
    pub async fn fetch_batched<I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        fetch_item: F,
    ) -> BatchedFetch<I, T>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<FetchError>,
    {
        let mut outcome = BatchedFetch::default();
        let batch_size = self.config.batch_size.max(1);
        let batch_count = items.len().div_ceil(batch_size);

        for (index, batch) in items.chunks(batch_size).enumerate() {
            if index > 0 {
                sleep(self.config.batch_delay).await;
            }

            if let Some(open_until_ms) = self.open_until() {
                metrics::counter!(
                    Metrics::FETCH_SKIPPED_BATCHES_TOTAL,
                    "stream" => self.stream.clone()
                )
                .increment(1);
                debug!(
                    target: "fetch_pipeline",
                    stream = %self.stream,
                    batch = index,
                    open_until_ms,
                    "Batch skipped"
                );
                outcome.unfetched.extend_from_slice(batch);
                continue;
            }

            match self.fetch_batch(index, batch, &fetch_item).await {
                Some((values, failed)) => {
                    outcome.values.extend(values);
                    outcome.failed.extend(failed);
                }
                None => outcome.unfetched.extend_from_slice(batch),
            }
        }

        debug!(
            target: "fetch_pipeline",
            stream = %self.stream,
            batches = batch_count,
            values = outcome.values.len(),
            failed = outcome.failed.len(),
            unfetched = outcome.unfetched.len(),
            "Batched fetch finished"
        );
        outcome
    }

    async fn fetch_batch<I, T, E, F, Fut>(
        &self,
        index: usize,
        batch: &[I],
        fetch_item: &F,
    ) -> Option<(Vec<T>, Vec<(I, FetchError)>)>
    where
        I: Clone,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<FetchError>,
    {
        let attempts = self.config.attempts();
        for attempt in 1..=attempts {
            let results = join_all(batch.iter().cloned().map(fetch_item)).await;

            let mut values = Vec::with_capacity(results.len());
            let mut failed = Vec::new();
            for (item, result) in batch.iter().cloned().zip(results) {
                match result.map_err(Into::<FetchError>::into) {
                    Ok(value) => values.push(value),
                    Err(err) => failed.push((item, err)),
                }
            }

            if !values.is_empty() || batch.is_empty() {
                self.breaker.lock().record_success();
                if !failed.is_empty() {
                    warn!(
                        target: "fetch_pipeline",
                        stream = %self.stream,
                        batch = index,
                        failed = failed.len(),
                        "Batch partially failed"
                    );
                }
                return Some((values, failed));
            }

            let Some((_, err)) = failed.pop() else { break };
            if attempt < attempts {
                self.before_retry(attempt, &err).await;
            } else {
                self.on_exhausted(attempts, &err);
            }
        }
        None
    }

    fn open_until(&self) -> Option<u64> {
        let breaker = self.breaker.lock();
        if breaker.is_open() { breaker.open_until() } else { None }
    }

    async fn before_retry(&self, attempt: u32, err: &FetchError) {
        let backoff = self.config.backoff(attempt);
        metrics::counter!(Metrics::FETCH_RETRIES_TOTAL, "stream" => self.stream.clone())
            .increment(1);
        warn!(
            target: "fetch_pipeline",
            stream = %self.stream,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            %err,
            "Fetch attempt failed, retrying"
        );
        sleep(backoff).await;
    }

    fn on_exhausted(&self, attempts: u32, err: &FetchError) {
        metrics::counter!(Metrics::FETCH_EXHAUSTED_TOTAL, "stream" => self.stream.clone())
            .increment(1);
        error!(
            target: "fetch_pipeline",
            stream = %self.stream,
            attempts,
            %err,
            "Fetch failed after all attempts"
        );
        self.breaker.lock().record_failure();
    }
}
