use crate::address::{AddressSet, EthAddress, filter_expression};
use crate::block::decode_block;
use crate::cursor::CursorStore;
use crate::notify::NotificationSink;
use crate::stream::{BlockSession, BlockSource, StreamError, SubscribeRequest};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Reconnect policy: a fixed delay between sessions, no jitter, no growth,
/// no retry cap. The tracker is a never-ending background service.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub reconnect_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests.
    pub fn immediate() -> Self {
        RetryPolicy {
            reconnect_delay: Duration::ZERO,
        }
    }
}

/// Process-lifetime stream counters. Never reset across sessions and never
/// persisted.
#[derive(Debug)]
pub struct StreamState {
    pub start_time: Instant,
    pub head_block: u64,
    pub block_count: u64,
    pub reconnect_count: u64,
}

impl StreamState {
    fn new() -> Self {
        StreamState {
            start_time: Instant::now(),
            head_block: 0,
            block_count: 0,
            reconnect_count: 0,
        }
    }

    fn record_block(&mut self, block_number: u64) {
        self.head_block = block_number;
        self.block_count += 1;
    }
}

/// Orchestrates repeated stream sessions: per-block matching and
/// notification, synchronous cursor persistence, periodic status reporting,
/// and fixed-delay reconnection on session failure.
pub struct Tracker<S, N> {
    source: S,
    sink: N,
    cursor_store: CursorStore,
    tracked: AddressSet,
    filter: String,
    start_block: u64,
    status_interval: Duration,
    policy: RetryPolicy,
    state: StreamState,
}

impl<S: BlockSource, N: NotificationSink> Tracker<S, N> {
    pub fn new(
        source: S,
        sink: N,
        cursor_store: CursorStore,
        addresses: &[EthAddress],
        start_block: u64,
        status_interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        let filter = filter_expression(addresses);
        debug!(filter = %filter, "using filter expression");

        Tracker {
            source,
            sink,
            cursor_store,
            tracked: AddressSet::new(addresses),
            filter,
            start_block,
            status_interval,
            policy,
            state: StreamState::new(),
        }
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Runs the never-ending ingest loop. Only fatal conditions return:
    /// session open failure, payload decode failure or cursor persistence
    /// failure. Stream-level failures are logged and retried forever.
    pub async fn run(&mut self) -> Result<()> {
        let mut cursor = self
            .cursor_store
            .load()
            .context("unable to load latest cursor")?;

        let starting_at = if cursor.is_empty() {
            self.start_block.to_string()
        } else {
            format!("cursor ({cursor})")
        };
        info!(starting_at = %starting_at, "starting stream (never ending)");

        let mut next_status = Instant::now() + self.status_interval;

        loop {
            let request =
                SubscribeRequest::new(self.start_block, cursor.clone(), self.filter.clone());
            let mut session = self
                .source
                .open(request)
                .await
                .context("unable to start blocks stream")?;

            loop {
                let envelope = match session.next_block().await {
                    Ok(envelope) => envelope,
                    Err(e) if e.is_fatal() => {
                        return Err(e).context("stream delivered an undecodable frame");
                    }
                    Err(StreamError::Closed) => {
                        error!(
                            "received a termination signal, this is unexpected as the stream is never ending"
                        );
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "stream encountered a remote error, going to retry");
                        break;
                    }
                };

                let block = decode_block(&envelope.block)?;
                for trace in &block.transaction_traces {
                    self.sink.notify_transaction(&block, trace, &self.tracked);
                }

                cursor = envelope.cursor;
                self.state.record_block(block.number);
                self.cursor_store
                    .save(&cursor)
                    .context("unable to write cursor to persistent storage")?;

                let now = Instant::now();
                if now >= next_status {
                    info!(
                        head_block = self.state.head_block,
                        block_count = self.state.block_count,
                        reconnect_count = self.state.reconnect_count,
                        uptime_secs = self.state.start_time.elapsed().as_secs(),
                        "stream state"
                    );
                    next_status = now + self.status_interval;
                }
            }

            info!(delay = ?self.policy.reconnect_delay, "waiting before retrying");
            sleep(self.policy.reconnect_delay).await;
            self.state.reconnect_count += 1;
        }
    }
}
