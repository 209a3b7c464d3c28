//! The schema-change stream puller.
//!
//! Watches the source's DDL metadata spans, funnels both through the
//! commit-ts sorter, and keeps a deduplicated FIFO of finished jobs
//! next to a resolved timestamp. The owner tick polls
//! [`front_ddl`](DdlPuller::front_ddl) /
//! [`pop_front_ddl`](DdlPuller::pop_front_ddl) between barrier steps.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use rill_model::{DdlFilter, DdlJob, Ts};
use rill_source::{
    run_sorter, EventFeed, RawKvEntry, RegionFeedEvent, ResolvedFrontier, SourceError, Span,
};

const CHANNEL_CAPACITY: usize = 128;

#[derive(Debug)]
struct PullerState {
    resolved_ts: Ts,
    pending_jobs: VecDeque<DdlJob>,
}

/// Pulls the DDL region stream and queues finished jobs in order.
pub struct DdlPuller {
    feed: Arc<dyn EventFeed>,
    filter: DdlFilter,
    start_ts: Ts,
    state: Arc<Mutex<PullerState>>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl DdlPuller {
    /// Creates a puller reading from `start_ts`.
    ///
    /// Callers must pass `start_ts >= 1`; the resolved timestamp
    /// initialises to `start_ts - 1` so the first marker at exactly
    /// `start_ts` advances it.
    #[must_use]
    pub fn new(feed: Arc<dyn EventFeed>, filter: DdlFilter, start_ts: Ts) -> Self {
        debug_assert!(start_ts >= 1, "start_ts must be >= 1");
        Self {
            feed,
            filter,
            start_ts,
            state: Arc::new(Mutex::new(PullerState {
                resolved_ts: start_ts - 1,
                pending_jobs: VecDeque::new(),
            })),
            cancel: Mutex::new(None),
        }
    }

    /// Runs the feeder and consumer until cancellation or the first
    /// error.
    ///
    /// # Errors
    ///
    /// Surfaces the first failure from either side; the other task is
    /// torn down with it. The caller decides whether to restart.
    pub async fn run(&self) -> Result<(), SourceError> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.cancel.lock() = Some(cancel_tx);

        let (raw_tx, raw_rx) = mpsc::channel::<RawKvEntry>(CHANNEL_CAPACITY);
        let (sorted_tx, sorted_rx) = mpsc::channel::<RawKvEntry>(CHANNEL_CAPACITY);

        let (tx_a, mut chan_a) = mpsc::channel::<RegionFeedEvent>(CHANNEL_CAPACITY);
        let (tx_b, mut chan_b) = mpsc::channel::<RegionFeedEvent>(CHANNEL_CAPACITY);
        let feed_a = {
            let feed = Arc::clone(&self.feed);
            let start_ts = self.start_ts;
            async move { feed.run(Span::ddl(), start_ts, tx_a).await }
        };
        let feed_b = {
            let feed = Arc::clone(&self.feed);
            let start_ts = self.start_ts;
            async move { feed.run(Span::add_index_ddl(), start_ts, tx_b).await }
        };

        // Merge both spans, combining their resolved markers into the
        // joint frontier before anything reaches the sorter.
        let merge = async move {
            let mut frontier = ResolvedFrontier::new(2);
            loop {
                let (index, event) = tokio::select! {
                    event = chan_a.recv() => (0, event),
                    event = chan_b.recv() => (1, event),
                };
                let Some(event) = event else {
                    return Ok::<(), SourceError>(());
                };
                match event {
                    RegionFeedEvent::Resolved { ts, .. } => {
                        if let Some(combined) = frontier.advance(index, ts) {
                            if raw_tx.send(RawKvEntry::resolved(combined)).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    RegionFeedEvent::Entry(entry) => {
                        if raw_tx.send(entry).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        };

        let sorter = run_sorter(raw_rx, sorted_tx);
        let consumer = self.consume(sorted_rx);

        tokio::select! {
            _ = cancel_rx => {
                tracing::debug!("ddl puller cancelled");
                Ok(())
            }
            result = async { tokio::try_join!(feed_a, feed_b, merge, sorter, consumer) } => {
                result.map(|_| ())
            }
        }
    }

    async fn consume(&self, mut sorted_rx: mpsc::Receiver<RawKvEntry>) -> Result<(), SourceError> {
        let mut last_ddl_finished_ts: Ts = 0;
        while let Some(entry) = sorted_rx.recv().await {
            if entry.is_resolved() {
                let mut state = self.state.lock();
                if entry.crts > state.resolved_ts {
                    state.resolved_ts = entry.crts;
                }
                continue;
            }
            if entry.value.is_empty() {
                continue;
            }
            let job = DdlJob::from_json(&entry.value)?;
            if self.filter.should_discard(job.job_type) {
                tracing::info!(job_id = job.id, query = %job.query, "discarding filtered ddl job");
                continue;
            }
            if job.finished_ts == last_ddl_finished_ts {
                continue;
            }
            last_ddl_finished_ts = job.finished_ts;
            self.state.lock().pending_jobs.push_back(job);
        }
        Ok(())
    }

    /// The head of the job queue without removing it, or the resolved
    /// timestamp when the queue is empty.
    #[must_use]
    pub fn front_ddl(&self) -> (Ts, Option<DdlJob>) {
        let state = self.state.lock();
        match state.pending_jobs.front() {
            Some(job) => (job.finished_ts, Some(job.clone())),
            None => (state.resolved_ts, None),
        }
    }

    /// Removes and returns the head of the job queue, or the resolved
    /// timestamp when the queue is empty.
    #[must_use]
    pub fn pop_front_ddl(&self) -> (Ts, Option<DdlJob>) {
        let mut state = self.state.lock();
        match state.pending_jobs.pop_front() {
            Some(job) => (job.finished_ts, Some(job)),
            None => (state.resolved_ts, None),
        }
    }

    /// Cancels the running tasks without waiting. Idempotent.
    pub fn close(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            let _ = cancel.send(());
        }
    }
}

impl std::fmt::Debug for DdlPuller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DdlPuller")
            .field("resolved_ts", &state.resolved_ts)
            .field("pending_jobs", &state.pending_jobs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_model::{DdlJobType, ReplicaConfig};
    use rill_source::testing::MockEventFeed;
    use rill_source::OpType;
    use std::time::Duration;

    fn job_entry(finished_ts: Ts, job_type: DdlJobType, query: &str) -> RegionFeedEvent {
        let job = DdlJob {
            id: finished_ts as i64,
            job_type,
            schema_name: "test".into(),
            table_name: "t".into(),
            table_id: 1,
            query: query.into(),
            finished_ts,
        };
        RegionFeedEvent::Entry(RawKvEntry {
            op_type: OpType::Put,
            key: b"m/ddl-job/1".to_vec(),
            value: serde_json::to_vec(&job).unwrap(),
            start_ts: finished_ts - 1,
            crts: finished_ts,
        })
    }

    fn resolved(ts: Ts) -> RegionFeedEvent {
        RegionFeedEvent::Resolved {
            span: Span::ddl(),
            ts,
        }
    }

    fn default_filter() -> DdlFilter {
        DdlFilter::new(&ReplicaConfig::default()).unwrap()
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn resolved_ts_initialises_below_start() {
        let puller = DdlPuller::new(
            Arc::new(MockEventFeed::new(Vec::new())),
            default_filter(),
            100,
        );
        assert_eq!(puller.front_ddl(), (99, None));
    }

    #[tokio::test]
    async fn dedups_jobs_and_orders_by_finished_ts() {
        // Both spans must resolve for the combined frontier to move.
        let script = vec![
            job_entry(100, DdlJobType::CreateTable, "create table a(x int)"),
            job_entry(100, DdlJobType::CreateTable, "create table a(x int)"),
            job_entry(105, DdlJobType::AddColumn, "alter table a add y int"),
            job_entry(105, DdlJobType::AddColumn, "alter table a add y int"),
            job_entry(110, DdlJobType::DropTable, "drop table a"),
            resolved(120),
            resolved(120),
        ];
        let puller = Arc::new(DdlPuller::new(
            Arc::new(MockEventFeed::new(script)),
            default_filter(),
            50,
        ));
        let runner = {
            let puller = Arc::clone(&puller);
            tokio::spawn(async move { puller.run().await })
        };

        wait_for(|| puller.front_ddl().0 == 100 && puller.front_ddl().1.is_some()).await;
        wait_for(|| puller.state.lock().resolved_ts == 120).await;

        let mut seen = Vec::new();
        loop {
            let (ts, job) = puller.pop_front_ddl();
            if job.is_none() {
                assert_eq!(ts, 120);
                break;
            }
            seen.push(ts);
        }
        assert_eq!(seen, vec![100, 105, 110]);

        puller.close();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn filtered_job_types_are_discarded() {
        let config = ReplicaConfig {
            filter: rill_model::FilterConfig {
                rules: vec!["*.*".into()],
                ignore_ddl_types: vec![DdlJobType::AddIndex],
            },
            ..ReplicaConfig::default()
        };
        let script = vec![
            job_entry(10, DdlJobType::AddIndex, "create index i on t(x)"),
            job_entry(20, DdlJobType::CreateTable, "create table t2(x int)"),
            resolved(30),
            resolved(30),
        ];
        let puller = Arc::new(DdlPuller::new(
            Arc::new(MockEventFeed::new(script)),
            DdlFilter::new(&config).unwrap(),
            5,
        ));
        let runner = {
            let puller = Arc::clone(&puller);
            tokio::spawn(async move { puller.run().await })
        };

        wait_for(|| puller.state.lock().resolved_ts == 30).await;
        let (ts, job) = puller.pop_front_ddl();
        assert_eq!(ts, 20);
        assert_eq!(job.unwrap().job_type, DdlJobType::CreateTable);
        assert_eq!(puller.pop_front_ddl(), (30, None));

        puller.close();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn feeder_error_surfaces_from_run() {
        let feed = MockEventFeed::new(vec![resolved(10), resolved(10)])
            .failing_with("region stream broke");
        let puller = Arc::new(DdlPuller::new(Arc::new(feed), default_filter(), 5));
        let result = puller.run().await;
        assert!(matches!(result, Err(SourceError::Feed(_))));
    }

    #[tokio::test]
    async fn close_cancels_and_is_idempotent() {
        let puller = Arc::new(DdlPuller::new(
            Arc::new(MockEventFeed::new(Vec::new())),
            default_filter(),
            5,
        ));
        let runner = {
            let puller = Arc::clone(&puller);
            tokio::spawn(async move { puller.run().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        puller.close();
        puller.close();
        runner.await.unwrap().unwrap();
    }
}
