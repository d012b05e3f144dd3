//! Client-side reconnecting subscription over a run event stream.
//!
//! [`RunStreamClient`] drives a connect/read/reconnect loop against any
//! [`Connector`]. Every failure is treated as transient: the loop backs off
//! exponentially (capped, with jitter) and tries again until the subscriber
//! disposes. Disposal always wins over a pending reconnect: no connection
//! attempt is started after `dispose` is observed.
//!
//! Received events land in [`StreamBuffers`], which deduplicate on re-delivery
//! so that replays after a reconnect never produce visible duplicates.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::types::{LogLine, MetricPoint, RunStatus, RunStreamEvent, TimelineEvent};

/// Observable lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    /// Advisory: the last attempt failed with an explicit error. Retries
    /// continue regardless.
    Error,
}

/// Exponential backoff with a cap and uniform jitter.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(450),
            max: Duration::from_millis(8000),
            jitter: Duration::from_millis(250),
        }
    }
}

impl BackoffPolicy {
    /// Deterministic part of the delay before retry number `failures`.
    ///
    /// The exponent saturates at 5, so delays stop growing after six
    /// consecutive failures even before the cap applies.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.min(5);
        let scaled = self.base.saturating_mul(2u32.saturating_pow(exponent));
        scaled.min(self.max)
    }

    /// `delay` plus uniform jitter in `[0, jitter)`.
    #[must_use]
    pub fn jittered_delay(&self, failures: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(250).max(1);
        let drawn = rand::rng().random_range(0..jitter_ms);
        self.delay(failures) + Duration::from_millis(drawn)
    }
}

/// One frame delivered by an [`EventStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event(RunStreamEvent),
    /// The server closed the connection, e.g. a synthetic disconnect.
    Closed { code: u16, reason: String },
    /// The connection failed with an explicit error.
    Failed(String),
}

/// A single open connection delivering frames until it closes.
pub trait EventStream: Send {
    /// Next frame, or `None` once the connection is gone.
    fn next_frame(&mut self) -> impl Future<Output = Option<StreamFrame>> + Send;
}

/// Adapter turning any [`futures::Stream`] of frames into an [`EventStream`].
///
/// Lets a transport that already yields frames as a stream, e.g. a decoded
/// WebSocket connection, plug into the reconnect loop directly.
#[derive(Debug)]
pub struct FrameStream<S>(pub S);

impl<S> EventStream for FrameStream<S>
where
    S: futures::Stream<Item = StreamFrame> + Unpin + Send,
{
    fn next_frame(&mut self) -> impl Future<Output = Option<StreamFrame>> + Send {
        futures::StreamExt::next(&mut self.0)
    }
}

/// Opens connections for a run subscription.
pub trait Connector: Send + Sync + 'static {
    type Stream: EventStream;

    fn connect(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<Self::Stream, String>> + Send;
}

/// Merged client-side view of a run's stream.
///
/// Merges are idempotent: each collection is keyed on enough fields that a
/// re-delivered event is dropped, and stays sorted ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamBuffers {
    pub status: Option<RunStatus>,
    pub logs: Vec<LogLine>,
    pub timeline: Vec<TimelineEvent>,
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
}

impl StreamBuffers {
    pub fn apply(&mut self, event: &RunStreamEvent) {
        match event {
            RunStreamEvent::Status { status, .. } => self.status = Some(*status),
            RunStreamEvent::LogLine { line, .. } => {
                let duplicate = self.logs.iter().any(|existing| {
                    existing.ts == line.ts
                        && existing.level == line.level
                        && existing.source == line.source
                        && existing.message == line.message
                });
                if !duplicate {
                    let at = self.logs.partition_point(|l| l.ts <= line.ts);
                    self.logs.insert(at, line.clone());
                }
            }
            RunStreamEvent::TimelineEvent { event, .. } => {
                let duplicate = self.timeline.iter().any(|existing| {
                    existing.ts == event.ts
                        && existing.event_type == event.event_type
                        && existing.title == event.title
                });
                if !duplicate {
                    let at = self.timeline.partition_point(|e| e.ts <= event.ts);
                    self.timeline.insert(at, event.clone());
                }
            }
            RunStreamEvent::MetricPoint { point, .. } => {
                let series = self.metrics.entry(point.name.clone()).or_default();
                if !series.iter().any(|existing| existing.ts == point.ts) {
                    let at = series.partition_point(|p| p.ts <= point.ts);
                    series.insert(at, point.clone());
                }
            }
        }
    }
}

/// A running subscription.
///
/// Dropping the handle without calling [`dispose`](Self::dispose) aborts the
/// background task without the orderly-teardown guarantees.
pub struct RunStreamClient {
    phase: watch::Receiver<StreamPhase>,
    buffers: Arc<Mutex<StreamBuffers>>,
    disposed: Arc<AtomicBool>,
    notify: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RunStreamClient {
    /// Subscribe to `run_id` through `connector`.
    #[must_use]
    pub fn spawn<C: Connector>(connector: C, run_id: &str, backoff: BackoffPolicy) -> Self {
        let (phase_tx, phase_rx) = watch::channel(StreamPhase::Idle);
        let buffers = Arc::new(Mutex::new(StreamBuffers::default()));
        let disposed = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        #[allow(clippy::disallowed_methods)] // Arc::clone for the background task
        let task = tokio::spawn(run_loop(
            connector,
            run_id.to_owned(),
            backoff,
            phase_tx,
            buffers.clone(),
            disposed.clone(),
            notify.clone(),
        ));

        Self {
            phase: phase_rx,
            buffers,
            disposed,
            notify,
            task,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> StreamPhase {
        *self.phase.borrow()
    }

    /// A watcher for phase transitions.
    #[must_use]
    pub fn phase_watch(&self) -> watch::Receiver<StreamPhase> {
        self.phase.clone()
    }

    /// Snapshot of the merged buffers.
    #[must_use]
    pub fn buffers(&self) -> StreamBuffers {
        self.buffers
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Tear the subscription down. Cancels any pending reconnect and waits
    /// for the background task to observe the disposal.
    pub async fn dispose(self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        let _ = self.task.await;
    }
}

async fn run_loop<C: Connector>(
    connector: C,
    run_id: String,
    backoff: BackoffPolicy,
    phase: watch::Sender<StreamPhase>,
    buffers: Arc<Mutex<StreamBuffers>>,
    disposed: Arc<AtomicBool>,
    notify: Arc<Notify>,
) {
    let mut failures: u32 = 0;

    'subscription: loop {
        if disposed.load(Ordering::SeqCst) {
            break;
        }
        let _ = phase.send(if failures == 0 {
            StreamPhase::Connecting
        } else {
            StreamPhase::Reconnecting
        });

        match connector.connect(&run_id).await {
            Ok(mut stream) => {
                failures = 0;
                let _ = phase.send(StreamPhase::Connected);

                loop {
                    tokio::select! {
                        () = notify.notified() => break 'subscription,
                        frame = stream.next_frame() => match frame {
                            Some(StreamFrame::Event(event)) => {
                                if let Ok(mut guard) = buffers.lock() {
                                    guard.apply(&event);
                                }
                            }
                            Some(StreamFrame::Closed { .. }) | None => break,
                            Some(StreamFrame::Failed(_)) => {
                                let _ = phase.send(StreamPhase::Error);
                                break;
                            }
                        },
                    }
                }
            }
            Err(_) => {
                let _ = phase.send(StreamPhase::Error);
            }
        }

        if disposed.load(Ordering::SeqCst) {
            break;
        }
        failures = failures.saturating_add(1);
        let delay = backoff.jittered_delay(failures);
        if *phase.borrow() != StreamPhase::Error {
            let _ = phase.send(StreamPhase::Reconnecting);
        }
        tokio::select! {
            () = notify.notified() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }
    let _ = phase.send(StreamPhase::Idle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;

    fn ts(seconds: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, seconds).unwrap()
    }

    fn log_event(seconds: u32, message: &str) -> RunStreamEvent {
        RunStreamEvent::LogLine {
            run_id: "run_1".to_owned(),
            line: LogLine {
                ts: ts(seconds),
                level: crate::types::LogLevel::Info,
                source: "trainer".to_owned(),
                message: message.to_owned(),
            },
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(450));
        assert_eq!(policy.delay(1), Duration::from_millis(900));
        assert_eq!(policy.delay(2), Duration::from_millis(1800));
        assert_eq!(policy.delay(3), Duration::from_millis(3600));
        assert_eq!(policy.delay(4), Duration::from_millis(7200));
        // capped from here on
        assert_eq!(policy.delay(5), Duration::from_millis(8000));
        assert_eq!(policy.delay(50), Duration::from_millis(8000));
    }

    #[test]
    fn test_jitter_stays_in_window() {
        let policy = BackoffPolicy::default();
        for _ in 0..100 {
            let jittered = policy.jittered_delay(1);
            assert!(jittered >= Duration::from_millis(900));
            assert!(jittered < Duration::from_millis(900 + 250));
        }
    }

    #[test]
    fn test_buffers_deduplicate_and_sort() {
        let mut buffers = StreamBuffers::default();
        buffers.apply(&log_event(5, "b"));
        buffers.apply(&log_event(3, "a"));
        buffers.apply(&log_event(5, "b")); // replay
        buffers.apply(&log_event(7, "c"));

        let messages: Vec<&str> = buffers.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, ["a", "b", "c"]);
    }

    #[test]
    fn test_metric_buffer_keyed_by_name_and_ts() {
        let mut buffers = StreamBuffers::default();
        let point = |seconds: u32, name: &str, value: f64| RunStreamEvent::MetricPoint {
            run_id: "run_1".to_owned(),
            point: MetricPoint {
                ts: ts(seconds),
                name: name.to_owned(),
                value,
            },
        };
        buffers.apply(&point(1, "loss", 0.5));
        buffers.apply(&point(1, "loss", 0.5)); // replay
        buffers.apply(&point(1, "accuracy", 0.8));
        buffers.apply(&point(0, "loss", 0.6));

        assert_eq!(buffers.metrics["loss"].len(), 2);
        assert_eq!(buffers.metrics["loss"][0].ts, ts(0));
        assert_eq!(buffers.metrics["accuracy"].len(), 1);
    }

    struct ScriptedStream {
        frames: VecDeque<StreamFrame>,
    }

    impl EventStream for ScriptedStream {
        async fn next_frame(&mut self) -> Option<StreamFrame> {
            // yield so phase watchers observe Connected before frames land
            tokio::task::yield_now().await;
            match self.frames.pop_front() {
                Some(frame) => Some(frame),
                // connection stays open with nothing more to say
                None => std::future::pending().await,
            }
        }
    }

    /// Fails the first `fail_first` connects, then delivers `frames` and
    /// stays open.
    struct ScriptedConnector {
        attempts: Arc<AtomicU32>,
        fail_first: u32,
        frames: Vec<StreamFrame>,
    }

    impl Connector for ScriptedConnector {
        type Stream = ScriptedStream;

        async fn connect(&self, _run_id: &str) -> Result<ScriptedStream, String> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err("connection refused".to_owned());
            }
            Ok(ScriptedStream {
                frames: self.frames.clone().into(),
            })
        }
    }

    async fn wait_for_phase(client: &RunStreamClient, wanted: StreamPhase) {
        let mut watch = client.phase_watch();
        while *watch.borrow() != wanted {
            watch.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_buffers_events() {
        let connector = ScriptedConnector {
            attempts: Arc::new(AtomicU32::new(0)),
            fail_first: 0,
            frames: vec![
                StreamFrame::Event(log_event(1, "hello")),
                StreamFrame::Event(log_event(2, "world")),
            ],
        };
        let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());
        wait_for_phase(&client, StreamPhase::Connected).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.buffers().logs.len(), 2);
        client.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_connected() {
        let attempts = Arc::new(AtomicU32::new(0));
        let connector = ScriptedConnector {
            attempts: attempts.clone(),
            fail_first: 3,
            frames: vec![StreamFrame::Event(log_event(1, "after retries"))],
        };
        let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());

        wait_for_phase(&client, StreamPhase::Connected).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.buffers().logs.len(), 1);
        client.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_server_close() {
        let attempts = Arc::new(AtomicU32::new(0));
        let connector = ScriptedConnector {
            attempts: attempts.clone(),
            fail_first: 0,
            frames: vec![
                StreamFrame::Event(log_event(1, "before drop")),
                StreamFrame::Closed {
                    code: crate::types::stream::SYNTHETIC_DISCONNECT_CODE,
                    reason: crate::types::stream::SYNTHETIC_DISCONNECT_REASON.to_owned(),
                },
            ],
        };
        let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());
        wait_for_phase(&client, StreamPhase::Connected).await;

        // the close triggers a reconnect; same frames arrive again but the
        // buffers stay deduplicated
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(attempts.load(Ordering::SeqCst) >= 2);
        assert_eq!(client.buffers().logs.len(), 1);
        client.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_reconnect() {
        let attempts = Arc::new(AtomicU32::new(0));
        let connector = ScriptedConnector {
            attempts: attempts.clone(),
            fail_first: u32::MAX,
            frames: Vec::new(),
        };
        let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());

        // let a couple of failed attempts happen
        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = attempts.load(Ordering::SeqCst);
        assert!(before >= 1);

        client.dispose().await;
        let after_dispose = attempts.load(Ordering::SeqCst);

        // a long wait later, no further attempts were made
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), after_dispose);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_surfaces_error_phase() {
        let connector = ScriptedConnector {
            attempts: Arc::new(AtomicU32::new(0)),
            fail_first: u32::MAX,
            frames: Vec::new(),
        };
        let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());
        wait_for_phase(&client, StreamPhase::Error).await;
        client.dispose().await;
    }

    #[tokio::test]
    async fn test_frame_stream_adapts_a_futures_stream() {
        let frames = vec![StreamFrame::Closed {
            code: 1000,
            reason: "done".to_owned(),
        }];
        let mut stream = FrameStream(futures::stream::iter(frames));
        assert!(matches!(
            stream.next_frame().await,
            Some(StreamFrame::Closed { code: 1000, .. })
        ));
        assert!(stream.next_frame().await.is_none());
    }
}
