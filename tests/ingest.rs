use anyhow::Result;
use eth_tracker::address::{AddressSet, parse_address_list};
use eth_tracker::block::{BlockLight, TransactionTrace};
use eth_tracker::cursor::CursorStore;
use eth_tracker::notify::NotificationSink;
use eth_tracker::stream::{BlockEnvelope, BlockSession, BlockSource, StreamError, SubscribeRequest};
use eth_tracker::tracker::{RetryPolicy, Tracker};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn envelope(block_number: u64) -> BlockEnvelope {
    BlockEnvelope {
        block: json!({
            "number": block_number,
            "hash": format!("0xb{block_number}"),
            "transaction_traces": [{
                "hash": format!("0xt{block_number}"),
                "calls": [{
                    "caller": "0x560a8e3b79d23b0a525e15c6f3486c6a293ddad2",
                    "address": "0x905315602ed9a854e325f692ff82f58799beab57",
                    "value": "1500000000000000000",
                }],
            }],
        }),
        cursor: format!("c{block_number}"),
    }
}

struct ScriptedSession {
    events: VecDeque<Result<BlockEnvelope, StreamError>>,
}

impl BlockSession for ScriptedSession {
    async fn next_block(&mut self) -> Result<BlockEnvelope, StreamError> {
        self.events
            .pop_front()
            .unwrap_or(Err(StreamError::Closed))
    }
}

struct ScriptedSource {
    sessions: VecDeque<ScriptedSession>,
    opens: Arc<Mutex<Vec<String>>>,
}

impl BlockSource for ScriptedSource {
    type Session = ScriptedSession;

    async fn open(&mut self, request: SubscribeRequest) -> Result<ScriptedSession> {
        self.opens.lock().unwrap().push(request.start_cursor);
        self.sessions
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted session left"))
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    blocks: Arc<Mutex<Vec<u64>>>,
}

impl NotificationSink for RecordingSink {
    fn notify_transaction(
        &mut self,
        block: &BlockLight,
        _trace: &TransactionTrace,
        _tracked: &AddressSet,
    ) {
        self.blocks.lock().unwrap().push(block.number);
    }
}

#[tokio::test]
async fn resumes_from_persisted_cursor_after_session_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cursor_store = CursorStore::new(dir.path().join("cursor.txt"));

    // Session 1 delivers blocks 1-3 then fails mid-stream; session 2 resumes
    // and delivers blocks 4-5 before the remote closes cleanly. No third
    // session is scripted, so the loop exits with an open error.
    let sessions = VecDeque::from([
        ScriptedSession {
            events: VecDeque::from([
                Ok(envelope(1)),
                Ok(envelope(2)),
                Ok(envelope(3)),
                Err(StreamError::Transport("connection reset".to_string())),
            ]),
        },
        ScriptedSession {
            events: VecDeque::from([
                Ok(envelope(4)),
                Ok(envelope(5)),
                Err(StreamError::Closed),
            ]),
        },
    ]);

    let opens = Arc::new(Mutex::new(Vec::new()));
    let source = ScriptedSource {
        sessions,
        opens: opens.clone(),
    };
    let sink = RecordingSink::default();
    let notified = sink.blocks.clone();

    let addresses =
        parse_address_list("0x560a8e3b79d23b0a525e15c6f3486c6a293ddad2").unwrap();
    let mut tracker = Tracker::new(
        source,
        sink,
        cursor_store,
        &addresses,
        11_878_000,
        Duration::from_secs(3600),
        RetryPolicy::immediate(),
    );

    let err = tracker.run().await.unwrap_err();
    assert!(err.to_string().contains("unable to start blocks stream"));

    // Each block notified exactly once, in order, none skipped.
    assert_eq!(*notified.lock().unwrap(), vec![1, 2, 3, 4, 5]);

    // First session starts fresh, the reconnects resume from the cursor of
    // the last processed block.
    assert_eq!(
        *opens.lock().unwrap(),
        vec!["".to_string(), "c3".to_string(), "c5".to_string()]
    );

    // The durable cursor matches the last processed block.
    let store = CursorStore::new(dir.path().join("cursor.txt"));
    assert_eq!(store.load().unwrap(), "c5");

    let state = tracker.state();
    assert_eq!(state.head_block, 5);
    assert_eq!(state.block_count, 5);
    assert_eq!(state.reconnect_count, 2);
}

#[tokio::test]
async fn undecodable_payload_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cursor_store = CursorStore::new(dir.path().join("cursor.txt"));

    let sessions = VecDeque::from([ScriptedSession {
        events: VecDeque::from([Ok(BlockEnvelope {
            block: json!({"unexpected": "shape"}),
            cursor: "c1".to_string(),
        })]),
    }]);

    let opens = Arc::new(Mutex::new(Vec::new()));
    let source = ScriptedSource {
        sessions,
        opens,
    };

    let addresses =
        parse_address_list("0x560a8e3b79d23b0a525e15c6f3486c6a293ddad2").unwrap();
    let mut tracker = Tracker::new(
        source,
        RecordingSink::default(),
        cursor_store,
        &addresses,
        0,
        Duration::from_secs(3600),
        RetryPolicy::immediate(),
    );

    let err = tracker.run().await.unwrap_err();
    assert!(
        err.to_string()
            .contains("should have been able to decode received block payload")
    );

    // Nothing was persisted for the bad block.
    let store = CursorStore::new(dir.path().join("cursor.txt"));
    assert_eq!(store.load().unwrap(), "");
}

#[tokio::test]
async fn resumes_from_cursor_stored_before_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cursor.txt");
    CursorStore::new(path.clone()).save("c41").unwrap();

    let sessions = VecDeque::from([ScriptedSession {
        events: VecDeque::from([Ok(envelope(42)), Err(StreamError::Closed)]),
    }]);

    let opens = Arc::new(Mutex::new(Vec::new()));
    let source = ScriptedSource {
        sessions,
        opens: opens.clone(),
    };

    let addresses =
        parse_address_list("0x560a8e3b79d23b0a525e15c6f3486c6a293ddad2").unwrap();
    let mut tracker = Tracker::new(
        source,
        RecordingSink::default(),
        CursorStore::new(path),
        &addresses,
        11_878_000,
        Duration::from_secs(3600),
        RetryPolicy::immediate(),
    );

    tracker.run().await.unwrap_err();
    assert_eq!(opens.lock().unwrap()[0], "c41");
}
