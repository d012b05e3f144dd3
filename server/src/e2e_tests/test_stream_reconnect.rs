//! Reconnect protocol against a simulated feed: the client survives a
//! synthetic disconnect, deduplicates the replayed frames, and stops
//! cleanly on dispose.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{
    BackoffPolicy, Connector, EventStream, RunStreamClient, StreamFrame, StreamPhase,
};
use crate::live::LiveFeed;
use crate::testing::fixed_now;
use crate::types::RunStatus;
use crate::types::stream::{SYNTHETIC_DISCONNECT_CODE, SYNTHETIC_DISCONNECT_REASON};

/// Connector replaying one scripted session per connect attempt; once the
/// script runs out, further connects yield an empty open stream.
struct ReplayConnector {
    attempts: Arc<AtomicU32>,
    sessions: Mutex<VecDeque<Vec<StreamFrame>>>,
}

struct ReplayStream {
    frames: VecDeque<StreamFrame>,
}

impl EventStream for ReplayStream {
    async fn next_frame(&mut self) -> Option<StreamFrame> {
        // yield so phase watchers observe Connected before frames land
        tokio::task::yield_now().await;
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            // stay open once drained
            None => std::future::pending().await,
        }
    }
}

impl Connector for ReplayConnector {
    type Stream = ReplayStream;

    async fn connect(&self, _run_id: &str) -> Result<ReplayStream, String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let frames = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(ReplayStream {
            frames: frames.into(),
        })
    }
}

async fn wait_for_phase(client: &RunStreamClient, wanted: StreamPhase) {
    let mut watch = client.phase_watch();
    while *watch.borrow() != wanted {
        watch.changed().await.unwrap();
    }
}

/// Two sessions over the same feed: the first drops after six events with a
/// synthetic disconnect, the second replays from the start and goes further.
fn scripted_sessions(run_id: &str) -> (Vec<StreamFrame>, Vec<StreamFrame>) {
    let last_values = std::collections::BTreeMap::new();
    let events: Vec<_> = {
        let mut feed = LiveFeed::new("reconnect", run_id, 7, &last_values);
        let status = feed.status_event(RunStatus::Running);
        std::iter::once(status)
            .chain((0..10).map(|_| feed.next_event(fixed_now())))
            .collect()
    };

    let mut first: Vec<StreamFrame> = events[..6].iter().cloned().map(StreamFrame::Event).collect();
    first.push(StreamFrame::Closed {
        code: SYNTHETIC_DISCONNECT_CODE,
        reason: SYNTHETIC_DISCONNECT_REASON.to_owned(),
    });
    let second: Vec<StreamFrame> = events.iter().cloned().map(StreamFrame::Event).collect();
    (first, second)
}

#[tokio::test(start_paused = true)]
async fn test_survives_synthetic_disconnect_without_duplicates() {
    let (first, second) = scripted_sessions("run_1");
    let attempts = Arc::new(AtomicU32::new(0));
    let connector = ReplayConnector {
        attempts: Arc::clone(&attempts),
        sessions: Mutex::new(VecDeque::from(vec![first, second.clone()])),
    };

    let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());
    wait_for_phase(&client, StreamPhase::Connected).await;

    // let the disconnect, backoff, and replay play out
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(client.phase(), StreamPhase::Connected);

    // buffers match a single clean application of the full session
    let mut expected = crate::client::StreamBuffers::default();
    for frame in &second {
        if let StreamFrame::Event(event) = frame {
            expected.apply(event);
        }
    }
    assert_eq!(client.buffers(), expected);

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_dispose_lands_back_on_idle() {
    let (first, second) = scripted_sessions("run_1");
    let connector = ReplayConnector {
        attempts: Arc::new(AtomicU32::new(0)),
        sessions: Mutex::new(VecDeque::from(vec![first, second])),
    };

    let client = RunStreamClient::spawn(connector, "run_1", BackoffPolicy::default());
    wait_for_phase(&client, StreamPhase::Connected).await;

    let watch = client.phase_watch();
    client.dispose().await;
    assert_eq!(*watch.borrow(), StreamPhase::Idle);
}
