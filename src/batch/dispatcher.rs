//! Concurrent batch dispatcher.
//!
//! Every record becomes one future. All futures are polled together on the
//! connection's task, so the batch costs no extra threads and each unit's
//! sleep is a suspension point.

use futures_util::stream::{FuturesUnordered, StreamExt};
use rand::Rng;
use std::time::Duration;

use crate::batch::{BatchReply, BatchRequest, RequestRecord};
use crate::config::{BatchConfig, BatchOrdering, JitterRange};
use crate::http::response;

#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    admission: JitterRange,
    processing: JitterRange,
    ordering: BatchOrdering,
}

impl BatchDispatcher {
    pub fn new(admission: JitterRange, processing: JitterRange, ordering: BatchOrdering) -> Self {
        Self {
            admission,
            processing,
            ordering,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(
            config.admission_jitter_ms,
            config.processing_jitter_ms,
            config.ordering,
        )
    }

    pub fn ordering(&self) -> BatchOrdering {
        self.ordering
    }

    /// Process every record concurrently with random latency.
    pub async fn dispatch(&self, batch: BatchRequest) -> Vec<BatchReply> {
        self.run(batch, |_| {
            (sample(self.admission), sample(self.processing))
        })
        .await
    }

    /// Process a batch and serialize the result array.
    pub async fn dispatch_json(&self, batch: BatchRequest) -> Result<Vec<u8>, serde_json::Error> {
        let replies = self.dispatch(batch).await;
        serde_json::to_vec(&replies)
    }

    async fn run<F>(&self, batch: BatchRequest, mut delays: F) -> Vec<BatchReply>
    where
        F: FnMut(&RequestRecord) -> (Duration, Duration),
    {
        let total = batch.len();
        let mut pending: FuturesUnordered<_> = batch
            .requests
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let (admission, processing) = delays(&record);
                async move {
                    tokio::time::sleep(admission).await;
                    tokio::time::sleep(processing).await;
                    (index, respond(&record))
                }
            })
            .collect();

        let mut finished = Vec::with_capacity(total);
        while let Some((index, reply)) = pending.next().await {
            tracing::debug!(index, body = %reply.body(), "Batch item completed");
            finished.push((index, reply));
        }

        if self.ordering == BatchOrdering::Input {
            finished.sort_by_key(|(index, _)| *index);
        }

        tracing::info!(items = total, ordering = ?self.ordering, "Batch completed");
        finished.into_iter().map(|(_, reply)| reply).collect()
    }
}

fn respond(record: &RequestRecord) -> BatchReply {
    BatchReply(
        format!("Async response for {} {}", record.method, record.path),
        response::OK,
    )
}

fn sample(range: JitterRange) -> Duration {
    let millis = if range.min() >= range.max() {
        range.min()
    } else {
        rand::thread_rng().gen_range(range.min()..=range.max())
    };
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Instant;

    fn batch(paths: &[&str]) -> BatchRequest {
        BatchRequest::new(paths.iter().map(|p| RequestRecord::new("GET", *p)).collect())
    }

    fn fixed_delays(record: &RequestRecord) -> (Duration, Duration) {
        let ms = match record.path.as_str() {
            "/slow" => 80,
            "/medium" => 40,
            _ => 5,
        };
        (Duration::ZERO, Duration::from_millis(ms))
    }

    fn bodies(replies: &[BatchReply]) -> Vec<&str> {
        replies.iter().map(BatchReply::body).collect()
    }

    #[tokio::test]
    async fn completion_order_follows_latency() {
        let dispatcher =
            BatchDispatcher::new(JitterRange(0, 0), JitterRange(0, 0), BatchOrdering::Completion);
        let replies = dispatcher
            .run(batch(&["/slow", "/fast", "/medium"]), fixed_delays)
            .await;

        assert_eq!(
            bodies(&replies),
            vec![
                "Async response for GET /fast",
                "Async response for GET /medium",
                "Async response for GET /slow",
            ]
        );
    }

    #[tokio::test]
    async fn input_order_restores_positions() {
        let dispatcher =
            BatchDispatcher::new(JitterRange(0, 0), JitterRange(0, 0), BatchOrdering::Input);
        let replies = dispatcher
            .run(batch(&["/slow", "/fast", "/medium"]), fixed_delays)
            .await;

        assert_eq!(
            bodies(&replies),
            vec![
                "Async response for GET /slow",
                "Async response for GET /fast",
                "Async response for GET /medium",
            ]
        );
    }

    #[tokio::test]
    async fn units_run_concurrently() {
        let dispatcher =
            BatchDispatcher::new(JitterRange(0, 0), JitterRange(100, 100), BatchOrdering::Completion);
        let start = Instant::now();
        let replies = dispatcher.dispatch(batch(&["/a", "/b", "/c", "/d", "/e"])).await;

        assert_eq!(replies.len(), 5);
        // Sequential execution would take at least 500ms.
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn random_latency_returns_every_body() {
        let dispatcher =
            BatchDispatcher::new(JitterRange(1, 20), JitterRange(1, 30), BatchOrdering::Completion);
        let mut input = batch(&["/one", "/two", "/three"]);
        input.requests[1].method = "POST".into();

        let replies = dispatcher.dispatch(input).await;
        assert!(replies.iter().all(|r| r.status() == 200));

        let got: HashSet<&str> = bodies(&replies).into_iter().collect();
        let expected: HashSet<&str> = [
            "Async response for GET /one",
            "Async response for POST /two",
            "Async response for GET /three",
        ]
        .into_iter()
        .collect();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_array() {
        let dispatcher = BatchDispatcher::from_config(&BatchConfig::default());
        let json = dispatcher.dispatch_json(BatchRequest::new(Vec::new())).await.unwrap();
        assert_eq!(json, b"[]".to_vec());
    }

    #[test]
    fn sample_stays_in_range() {
        for _ in 0..100 {
            let d = sample(JitterRange(10, 20));
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        assert_eq!(sample(JitterRange(7, 7)), Duration::from_millis(7));
    }
}
