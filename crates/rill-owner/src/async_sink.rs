//! Checkpoint/DDL serialisation onto the backend sink.
//!
//! One background worker owns all blocking backend calls so the owner
//! tick stays non-blocking. Checkpoints coalesce through an atomic and
//! flush on a periodic tick; DDL events go through a capacity-1
//! channel with an idempotent two-phase handshake:
//!
//! - `commit_ts <= ddl_finished_ts`: already executed, done.
//! - `commit_ts <= ddl_sent_ts`: in flight, poll again.
//! - otherwise: enqueue and record `ddl_sent_ts`.
//!
//! `ddl_sent_ts >= ddl_finished_ts` always holds, and `emit_ddl_event`
//! reports done only for a DDL the backend has actually accepted (or
//! deliberately ignored).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use rill_model::{ChangefeedId, DdlEvent, SimpleTableInfo, Ts};
use rill_sink::{Sink, SinkError, SyncpointStore};

use crate::ErrorReporter;

const CHECKPOINT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Serialises checkpoints and DDL events onto one backend sink.
pub struct AsyncSink {
    changefeed_id: ChangefeedId,
    backend: Arc<dyn Sink>,
    syncpoint_store: Option<Arc<dyn SyncpointStore>>,

    checkpoint_ts: Arc<AtomicU64>,
    ddl_finished_ts: Arc<AtomicU64>,
    ddl_sent_ts: AtomicU64,
    ddl_tx: mpsc::Sender<DdlEvent>,

    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncSink {
    /// Spawns the worker over `backend`.
    ///
    /// `error_rx` carries the backend's asynchronous errors; the
    /// worker forwards them to `reporter` and exits. When a syncpoint
    /// store is supplied its synctable is created here, binding the
    /// store's lifecycle to this sink.
    ///
    /// # Errors
    ///
    /// Propagates synctable creation failure.
    pub async fn new(
        changefeed_id: ChangefeedId,
        backend: Arc<dyn Sink>,
        syncpoint_store: Option<Arc<dyn SyncpointStore>>,
        error_rx: mpsc::UnboundedReceiver<SinkError>,
        reporter: ErrorReporter,
    ) -> Result<Self, SinkError> {
        if let Some(store) = &syncpoint_store {
            store.create_synctable().await?;
        }

        let (ddl_tx, ddl_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let checkpoint_ts = Arc::new(AtomicU64::new(0));
        let ddl_finished_ts = Arc::new(AtomicU64::new(0));

        let worker = tokio::spawn(run_worker(WorkerCtx {
            changefeed_id: changefeed_id.clone(),
            backend: Arc::clone(&backend),
            checkpoint_ts: Arc::clone(&checkpoint_ts),
            ddl_finished_ts: Arc::clone(&ddl_finished_ts),
            ddl_rx,
            error_rx,
            shutdown_rx,
            reporter,
        }));

        Ok(Self {
            changefeed_id,
            backend,
            syncpoint_store,
            checkpoint_ts,
            ddl_finished_ts,
            ddl_sent_ts: AtomicU64::new(0),
            ddl_tx,
            shutdown: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Declares the replicated tables on the backend.
    ///
    /// # Errors
    ///
    /// Propagates the backend failure.
    pub async fn initialize(&self, tables: &[SimpleTableInfo]) -> Result<(), SinkError> {
        self.backend.initialize(tables).await
    }

    /// Records the latest checkpoint; non-blocking, coalescing.
    ///
    /// The worker forwards the newest value on its next tick; equal or
    /// regressing values are dropped there.
    pub fn emit_checkpoint_ts(&self, ts: Ts) {
        self.checkpoint_ts.store(ts, Ordering::Release);
    }

    /// Hands a DDL to the worker, idempotently.
    ///
    /// Returns `true` once the backend has executed (or deliberately
    /// ignored) the DDL; callers poll until then. Distinct DDLs must
    /// arrive with non-decreasing `commit_ts`.
    ///
    /// # Errors
    ///
    /// [`SinkError::Cancelled`] when the sink shut down while the DDL
    /// was waiting to enqueue.
    pub async fn emit_ddl_event(&self, ddl: &DdlEvent) -> Result<bool, SinkError> {
        if ddl.commit_ts <= self.ddl_finished_ts.load(Ordering::Acquire) {
            return Ok(true);
        }
        if ddl.commit_ts <= self.ddl_sent_ts.load(Ordering::Acquire) {
            return Ok(false);
        }
        // The worker dropping its receiver doubles as the cancel
        // signal for a blocked send.
        self.ddl_tx
            .send(ddl.clone())
            .await
            .map_err(|_| SinkError::Cancelled)?;
        self.ddl_sent_ts.store(ddl.commit_ts, Ordering::Release);
        Ok(false)
    }

    /// Writes a syncpoint for the changefeed at `checkpoint_ts`.
    ///
    /// # Errors
    ///
    /// Propagates the syncpoint store failure.
    pub async fn sink_syncpoint(&self, checkpoint_ts: Ts) -> Result<(), SinkError> {
        match &self.syncpoint_store {
            Some(store) => store.sink_syncpoint(&self.changefeed_id, checkpoint_ts).await,
            None => Ok(()),
        }
    }

    /// Shuts the worker down, closes the backend and the syncpoint
    /// store, and waits for the worker to exit.
    ///
    /// Sub-close errors are merged; the last failure wins.
    ///
    /// # Errors
    ///
    /// The merged close failure, if any.
    pub async fn close(&self) -> Result<(), SinkError> {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }
        let mut result = self.backend.close().await;
        if let Some(store) = &self.syncpoint_store {
            if let Err(e) = store.close().await {
                result = Err(e);
            }
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(changefeed = %self.changefeed_id, error = %e, "async sink worker join failed");
            }
        }
        result
    }
}

impl std::fmt::Debug for AsyncSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSink")
            .field("changefeed_id", &self.changefeed_id)
            .field("checkpoint_ts", &self.checkpoint_ts.load(Ordering::Acquire))
            .field(
                "ddl_finished_ts",
                &self.ddl_finished_ts.load(Ordering::Acquire),
            )
            .field("ddl_sent_ts", &self.ddl_sent_ts.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

struct WorkerCtx {
    changefeed_id: ChangefeedId,
    backend: Arc<dyn Sink>,
    checkpoint_ts: Arc<AtomicU64>,
    ddl_finished_ts: Arc<AtomicU64>,
    ddl_rx: mpsc::Receiver<DdlEvent>,
    error_rx: mpsc::UnboundedReceiver<SinkError>,
    shutdown_rx: oneshot::Receiver<()>,
    reporter: ErrorReporter,
}

async fn run_worker(mut ctx: WorkerCtx) {
    let mut ticker = tokio::time::interval(CHECKPOINT_FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_checkpoint_ts: Ts = 0;

    loop {
        tokio::select! {
            // Shutdown and backend errors take priority over more work.
            biased;
            _ = &mut ctx.shutdown_rx => return,
            Some(err) = ctx.error_rx.recv() => {
                ctx.reporter.report(err);
                return;
            }
            _ = ticker.tick() => {
                let checkpoint_ts = ctx.checkpoint_ts.load(Ordering::Acquire);
                if checkpoint_ts == 0 || checkpoint_ts <= last_checkpoint_ts {
                    continue;
                }
                last_checkpoint_ts = checkpoint_ts;
                if let Err(e) = ctx.backend.emit_checkpoint_ts(checkpoint_ts).await {
                    ctx.reporter.report(e);
                    return;
                }
            }
            Some(ddl) = ctx.ddl_rx.recv() => {
                match ctx.backend.emit_ddl_event(&ddl).await {
                    Ok(()) => {
                        tracing::info!(
                            changefeed = %ctx.changefeed_id,
                            commit_ts = ddl.commit_ts,
                            query = %ddl.query,
                            "ddl executed",
                        );
                        ctx.ddl_finished_ts.store(ddl.commit_ts, Ordering::Release);
                    }
                    Err(e) if e.is_ddl_ignored() => {
                        tracing::info!(
                            changefeed = %ctx.changefeed_id,
                            commit_ts = ddl.commit_ts,
                            query = %ddl.query,
                            "ddl ignored by the sink",
                        );
                        ctx.ddl_finished_ts.store(ddl.commit_ts, Ordering::Release);
                    }
                    Err(e) => {
                        tracing::error!(
                            changefeed = %ctx.changefeed_id,
                            commit_ts = ddl.commit_ts,
                            error = %e,
                            "ddl execution failed",
                        );
                        ctx.reporter.report(e);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rill_model::DdlJobType;
    use rill_sink::InMemorySyncpointStore;
    use std::time::Duration;

    #[derive(Default)]
    struct MockBackend {
        checkpoint_ts: AtomicU64,
        ddls: Mutex<Vec<Ts>>,
        checkpoints: Mutex<Vec<Ts>>,
        ddl_delay: Option<Duration>,
        ddl_error: Mutex<Option<fn() -> SinkError>>,
    }

    impl MockBackend {
        fn slow(delay: Duration) -> Self {
            Self {
                ddl_delay: Some(delay),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Sink for MockBackend {
        async fn initialize(&self, _tables: &[SimpleTableInfo]) -> Result<(), SinkError> {
            Ok(())
        }

        async fn emit_row_changed_events(
            &self,
            _rows: &[rill_model::RowChangedEvent],
        ) -> Result<(), SinkError> {
            Ok(())
        }

        async fn emit_ddl_event(&self, ddl: &DdlEvent) -> Result<(), SinkError> {
            if let Some(delay) = self.ddl_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(make_err) = *self.ddl_error.lock() {
                self.ddls.lock().push(ddl.commit_ts);
                return Err(make_err());
            }
            self.ddls.lock().push(ddl.commit_ts);
            Ok(())
        }

        async fn emit_checkpoint_ts(&self, ts: Ts) -> Result<(), SinkError> {
            self.checkpoint_ts.store(ts, Ordering::Release);
            self.checkpoints.lock().push(ts);
            Ok(())
        }

        async fn flush_row_changed_events(&self, resolved_ts: Ts) -> Result<Ts, SinkError> {
            Ok(resolved_ts)
        }

        async fn close(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn ddl(commit_ts: Ts) -> DdlEvent {
        DdlEvent {
            commit_ts,
            schema: "test".into(),
            table: "t".into(),
            query: format!("alter table t comment '{commit_ts}'"),
            job_type: DdlJobType::ModifyColumn,
        }
    }

    async fn new_sink(
        backend: Arc<MockBackend>,
    ) -> (
        AsyncSink,
        mpsc::UnboundedReceiver<crate::OwnerError>,
        mpsc::UnboundedSender<SinkError>,
    ) {
        let (reporter, errors) = ErrorReporter::channel("cf-test".to_string());
        let (backend_err_tx, backend_err_rx) = mpsc::unbounded_channel();
        let sink = AsyncSink::new(
            "cf-test".to_string(),
            backend as Arc<dyn Sink>,
            None,
            backend_err_rx,
            reporter,
        )
        .await
        .unwrap();
        (sink, errors, backend_err_tx)
    }

    async fn emit_until_done(sink: &AsyncSink, event: &DdlEvent) {
        loop {
            if sink.emit_ddl_event(event).await.unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoints_coalesce_and_stay_monotonic() {
        let backend = Arc::new(MockBackend::default());
        let (sink, _errors, _err_tx) = new_sink(Arc::clone(&backend)).await;

        // After each store the backend must settle on the expected
        // latest value; 5 regresses and the duplicate 10 coalesces.
        for (ts, latest) in [(1, 1), (10, 10), (5, 10), (10, 10), (20, 20)] {
            sink.emit_checkpoint_ts(ts);
            for _ in 0..5 {
                tokio::time::advance(Duration::from_millis(1100)).await;
                tokio::task::yield_now().await;
                if backend.checkpoint_ts.load(Ordering::Acquire) == latest {
                    break;
                }
            }
            assert_eq!(backend.checkpoint_ts.load(Ordering::Acquire), latest);
        }

        let seen = backend.checkpoints.lock().clone();
        assert_eq!(seen, vec![1, 10, 20]);

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn ddl_handshake_is_idempotent_and_ordered() {
        let backend = Arc::new(MockBackend::slow(Duration::from_millis(50)));
        let (sink, _errors, _err_tx) = new_sink(Arc::clone(&backend)).await;

        emit_until_done(&sink, &ddl(1)).await;
        assert_eq!(backend.ddls.lock().as_slice(), &[1]);

        // Queue two more; poll both to completion interleaved.
        assert!(!sink.emit_ddl_event(&ddl(2)).await.unwrap());
        let _ = sink.emit_ddl_event(&ddl(3)).await.unwrap();
        emit_until_done(&sink, &ddl(2)).await;
        emit_until_done(&sink, &ddl(3)).await;
        assert_eq!(backend.ddls.lock().as_slice(), &[1, 2, 3]);

        // Re-emitting an executed DDL reports done immediately.
        assert!(sink.emit_ddl_event(&ddl(2)).await.unwrap());
        assert_eq!(backend.ddls.lock().as_slice(), &[1, 2, 3]);

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn ignored_ddl_counts_as_executed() {
        let backend = Arc::new(MockBackend::default());
        *backend.ddl_error.lock() = Some(|| SinkError::DdlIgnored);
        let (sink, mut errors, _err_tx) = new_sink(Arc::clone(&backend)).await;

        emit_until_done(&sink, &ddl(1)).await;
        assert!(errors.try_recv().is_err());

        // The next DDL fails for real; the reporter fires exactly once.
        *backend.ddl_error.lock() = Some(|| SinkError::DdlExecFailed("bad".into()));
        let emitted = sink.emit_ddl_event(&ddl(2)).await.unwrap();
        assert!(!emitted);
        let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            err,
            crate::OwnerError::Sink(SinkError::DdlExecFailed(_))
        ));
        assert!(errors.try_recv().is_err());

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn backend_error_channel_reaches_reporter() {
        let backend = Arc::new(MockBackend::default());
        let (reporter, mut errors) = ErrorReporter::channel("cf-test".to_string());
        let (backend_err_tx, backend_err_rx) = mpsc::unbounded_channel();
        let sink = AsyncSink::new(
            "cf-test".to_string(),
            backend as Arc<dyn Sink>,
            None,
            backend_err_rx,
            reporter,
        )
        .await
        .unwrap();

        backend_err_tx
            .send(SinkError::Backend("broker gone".into()))
            .unwrap();
        let err = tokio::time::timeout(Duration::from_secs(1), errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(err, crate::OwnerError::Sink(SinkError::Backend(_))));

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn syncpoint_store_lifecycle_is_bound_to_the_sink() {
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(InMemorySyncpointStore::new());
        let (reporter, _errors) = ErrorReporter::channel("cf-test".to_string());
        let (_err_tx, err_rx) = mpsc::unbounded_channel();
        let sink = AsyncSink::new(
            "cf-test".to_string(),
            backend as Arc<dyn Sink>,
            Some(Arc::clone(&store) as Arc<dyn SyncpointStore>),
            err_rx,
            reporter,
        )
        .await
        .unwrap();

        sink.sink_syncpoint(7).await.unwrap();
        sink.sink_syncpoint(9).await.unwrap();
        assert_eq!(
            store.records(),
            vec![("cf-test".to_string(), 7), ("cf-test".to_string(), 9)]
        );

        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_cancels_a_blocked_emit() {
        let backend = Arc::new(MockBackend::slow(Duration::from_millis(200)));
        let (sink, _errors, _err_tx) = new_sink(Arc::clone(&backend)).await;
        let sink = Arc::new(sink);

        // First DDL occupies the worker; the second fills the
        // capacity-1 channel; the third blocks in send.
        assert!(!sink.emit_ddl_event(&ddl(1)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sink.emit_ddl_event(&ddl(2)).await.unwrap());

        let blocked = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sink.emit_ddl_event(&ddl(3)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.close().await.unwrap();

        let result = blocked.await.unwrap();
        assert!(matches!(result, Err(SinkError::Cancelled)));
    }
}
