//! Reliable delivery channel to a single neighbor.
//!
//! A [`Neighbor`] is bound to one remote address and shares the peer's
//! socket. Each message is sent as a data segment and retransmitted until an
//! acknowledgment carrying the same sequence number arrives or the retry
//! budget runs out.
//!
//! # Architecture
//!
//! ```text
//!   send / send_with ──► request queue ──► channel task ──► socket.send_to
//!                                             ▲
//!   listener ──► acknowledge(ack) ──► ack queue
//! ```
//!
//! The channel task owns all in-flight state and handles one request at a
//! time, so at most one exchange is outstanding per neighbor. Requests made
//! while an exchange is in flight wait in the queue.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::segment::Segment;
use super::socket::PeerSocket;
use crate::core::constants::{DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES};
use crate::core::DeliveryError;
use crate::message::{Message, MessageKind};

/// Retransmission settings for a neighbor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Time to wait for an acknowledgment before retransmitting.
    pub ack_timeout: Duration,
    /// Retransmissions allowed after the first attempt.
    pub max_retries: u32,
}

impl DeliveryConfig {
    /// Create a delivery configuration.
    pub fn new(ack_timeout: Duration, max_retries: u32) -> Self {
        Self {
            ack_timeout,
            max_retries,
        }
    }

    /// Total transmissions for one message.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ACK_TIMEOUT, DEFAULT_MAX_RETRIES)
    }
}

type DeliveryResult = Result<(), DeliveryError>;
type SuccessFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(DeliveryError) + Send>;
type InspectFn = Box<dyn FnOnce(&DeliveryError) + Send>;

/// How the outcome of a send is reported.
enum Completion {
    Future {
        tx: oneshot::Sender<DeliveryResult>,
        inspect: Option<InspectFn>,
    },
    Callbacks {
        on_success: SuccessFn,
        on_error: ErrorFn,
    },
}

impl Completion {
    fn complete(self, result: DeliveryResult) {
        match self {
            Completion::Future { tx, inspect } => {
                if let (Err(e), Some(inspect)) = (&result, inspect) {
                    inspect(e);
                }
                let _ = tx.send(result);
            }
            Completion::Callbacks {
                on_success,
                on_error,
            } => match result {
                Ok(()) => on_success(),
                Err(e) => on_error(e),
            },
        }
    }
}

struct Outbound {
    kind: MessageKind,
    payload: Vec<u8>,
    completion: Completion,
}

/// Completion of a [`Neighbor::send`].
///
/// Resolves once the message is acknowledged or has failed. If the channel is
/// detached first, resolves to [`DeliveryError::Detached`].
#[must_use = "a Delivery does nothing unless awaited; dropping it does not cancel the send"]
#[derive(Debug)]
pub struct Delivery {
    rx: oneshot::Receiver<DeliveryResult>,
}

impl Future for Delivery {
    type Output = DeliveryResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DeliveryError::Detached)))
    }
}

/// Reliable send primitive bound to one remote address.
pub struct Neighbor {
    addr: SocketAddr,
    requests: mpsc::UnboundedSender<Outbound>,
    acks: mpsc::UnboundedSender<u32>,
    task: JoinHandle<()>,
    detached: AtomicBool,
}

impl Neighbor {
    /// Start a channel to `addr` with a random initial sequence number.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(socket: PeerSocket, addr: SocketAddr, config: DeliveryConfig) -> Self {
        Self::spawn_with_initial_seq(socket, addr, config, rand::random())
    }

    /// Start a channel to `addr` whose first message uses `initial_seq`.
    pub fn spawn_with_initial_seq(
        socket: PeerSocket,
        addr: SocketAddr,
        config: DeliveryConfig,
        initial_seq: u32,
    ) -> Self {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (acks, acks_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_channel(
            socket,
            addr,
            config,
            requests_rx,
            acks_rx,
            initial_seq,
        ));

        Self {
            addr,
            requests,
            acks,
            task,
            detached: AtomicBool::new(false),
        }
    }

    /// Remote address of this channel.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Check if the channel has been detached.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Queue `message` for reliable delivery.
    ///
    /// Returns immediately; await the returned [`Delivery`] for the outcome.
    pub fn send(&self, message: &Message) -> Delivery {
        let (tx, rx) = oneshot::channel();
        self.enqueue(message, Completion::Future { tx, inspect: None });
        Delivery { rx }
    }

    /// Queue `message` like [`send`](Self::send), running `on_error` with
    /// the failure before the returned [`Delivery`] resolves.
    ///
    /// `on_error` runs even if the [`Delivery`] has been dropped. It does not
    /// run for a detached channel.
    pub fn send_inspect<E>(&self, message: &Message, on_error: E) -> Delivery
    where
        E: FnOnce(&DeliveryError) + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let completion = Completion::Future {
            tx,
            inspect: Some(Box::new(on_error)),
        };
        self.enqueue(message, completion);
        Delivery { rx }
    }

    /// Queue `message` for reliable delivery with continuations.
    ///
    /// Exactly one of `on_success` or `on_error` runs, unless the channel is
    /// detached first, in which case neither runs.
    pub fn send_with<S, E>(&self, message: &Message, on_success: S, on_error: E)
    where
        S: FnOnce() + Send + 'static,
        E: FnOnce(DeliveryError) + Send + 'static,
    {
        self.enqueue(
            message,
            Completion::Callbacks {
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            },
        );
    }

    fn enqueue(&self, message: &Message, completion: Completion) {
        if self.is_detached() {
            trace!(peer = %self.addr, kind = %message.kind(), "send on detached neighbor discarded");
            return;
        }

        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                completion.complete(Err(e.into()));
                return;
            }
        };

        let outbound = Outbound {
            kind: message.kind(),
            payload,
            completion,
        };
        if self.requests.send(outbound).is_err() {
            trace!(peer = %self.addr, "neighbor channel closed");
        }
    }

    /// Feed an acknowledgment received from this neighbor.
    ///
    /// Acknowledgments that do not match the in-flight sequence number are
    /// ignored.
    pub fn acknowledge(&self, ack: u32) {
        let _ = self.acks.send(ack);
    }

    /// Stop the channel.
    ///
    /// Cancels the pending retransmission timer and drops queued and
    /// in-flight continuations without invoking them. Later sends are
    /// discarded.
    pub fn detach(&self) {
        if !self.detached.swap(true, Ordering::AcqRel) {
            self.task.abort();
            debug!(peer = %self.addr, "neighbor detached");
        }
    }
}

impl Drop for Neighbor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for Neighbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neighbor")
            .field("addr", &self.addr)
            .field("detached", &self.is_detached())
            .finish_non_exhaustive()
    }
}

async fn run_channel(
    socket: PeerSocket,
    addr: SocketAddr,
    config: DeliveryConfig,
    mut requests: mpsc::UnboundedReceiver<Outbound>,
    mut acks: mpsc::UnboundedReceiver<u32>,
    mut next_seq: u32,
) {
    while let Some(outbound) = requests.recv().await {
        let seq = next_seq;
        next_seq = next_seq.wrapping_add(1);

        let result = deliver(&socket, addr, config, &mut acks, seq, outbound.payload).await;
        match &result {
            Ok(()) => trace!(peer = %addr, seq, kind = %outbound.kind, "delivered"),
            Err(e) => debug!(peer = %addr, seq, kind = %outbound.kind, error = %e, "delivery failed"),
        }
        outbound.completion.complete(result);
    }
}

async fn deliver(
    socket: &PeerSocket,
    addr: SocketAddr,
    config: DeliveryConfig,
    acks: &mut mpsc::UnboundedReceiver<u32>,
    seq: u32,
    payload: Vec<u8>,
) -> DeliveryResult {
    let datagram = Segment::data(seq, payload).encode();
    let attempts = config.max_attempts();

    for attempt in 1..=attempts {
        if attempt > 1 {
            debug!(peer = %addr, seq, attempt, "retransmitting");
        }

        // A failed transmission counts as a lost datagram.
        if let Err(e) = socket.send_to(&datagram, addr).await {
            warn!(peer = %addr, seq, error = %e, "transmission failed");
        }

        match tokio::time::timeout(config.ack_timeout, wait_for_ack(acks, seq)).await {
            Ok(true) => return Ok(()),
            Ok(false) => return Err(DeliveryError::Detached),
            Err(_) => {}
        }
    }

    Err(DeliveryError::RetriesExhausted { attempts })
}

async fn wait_for_ack(acks: &mut mpsc::UnboundedReceiver<u32>, seq: u32) -> bool {
    while let Some(ack) = acks.recv().await {
        if ack == seq {
            return true;
        }
        trace!(ack, expected = seq, "ignoring stale acknowledgment");
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use tokio::net::UdpSocket;

    use super::*;

    const FAST: DeliveryConfig = DeliveryConfig {
        ack_timeout: Duration::from_millis(50),
        max_retries: 2,
    };

    async fn setup(config: DeliveryConfig) -> (Neighbor, UdpSocket) {
        let local = PeerSocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let neighbor = Neighbor::spawn(local, remote.local_addr().unwrap(), config);
        (neighbor, remote)
    }

    async fn recv_segment(remote: &UdpSocket, wait: Duration) -> Option<Segment> {
        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(wait, remote.recv_from(&mut buf))
            .await
            .ok()?
            .ok()?;
        Segment::decode(&buf[..len]).ok()
    }

    #[tokio::test]
    async fn test_send_acknowledged() {
        let (neighbor, remote) = setup(FAST).await;
        let message = Message::text("hello", "alice");

        let delivery = neighbor.send(&message);
        let segment = recv_segment(&remote, Duration::from_secs(1)).await.unwrap();
        assert!(segment.is_data());
        assert_eq!(Message::decode(&segment.payload).unwrap(), message);

        neighbor.acknowledge(segment.seq);
        assert_eq!(delivery.await, Ok(()));
    }

    #[tokio::test]
    async fn test_success_continuation_runs_once() {
        let (neighbor, remote) = setup(FAST).await;
        let successes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = oneshot::channel();

        let s = successes.clone();
        let e = errors.clone();
        neighbor.send_with(
            &Message::join("bob"),
            move || {
                s.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            },
            move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            },
        );

        let segment = recv_segment(&remote, Duration::from_secs(1)).await.unwrap();
        neighbor.acknowledge(segment.seq);
        neighbor.acknowledge(segment.seq);

        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(FAST.ack_timeout * 4).await;

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (neighbor, remote) = setup(FAST).await;

        let result = neighbor.send(&Message::leave()).await;
        assert_eq!(
            result,
            Err(DeliveryError::RetriesExhausted {
                attempts: FAST.max_attempts()
            })
        );

        let mut transmissions = Vec::new();
        while let Some(segment) = recv_segment(&remote, FAST.ack_timeout * 3).await {
            transmissions.push(segment);
        }

        assert_eq!(transmissions.len(), 3);
        assert!(transmissions.iter().all(|s| s.seq == transmissions[0].seq));
    }

    #[tokio::test]
    async fn test_stale_ack_ignored() {
        let config = DeliveryConfig::new(Duration::from_millis(100), 0);
        let (neighbor, remote) = setup(config).await;

        let delivery = neighbor.send(&Message::leave());
        let segment = recv_segment(&remote, Duration::from_secs(1)).await.unwrap();
        neighbor.acknowledge(segment.seq.wrapping_add(1));
        neighbor.acknowledge(segment.seq.wrapping_sub(1));

        assert_eq!(
            delivery.await,
            Err(DeliveryError::RetriesExhausted { attempts: 1 })
        );
    }

    #[tokio::test]
    async fn test_sends_are_serialized() {
        let config = DeliveryConfig::new(Duration::from_secs(5), 0);
        let (neighbor, remote) = setup(config).await;

        let first = neighbor.send(&Message::text("one", "a"));
        let second = neighbor.send(&Message::text("two", "a"));

        let segment = recv_segment(&remote, Duration::from_secs(1)).await.unwrap();
        assert!(recv_segment(&remote, Duration::from_millis(100)).await.is_none());

        neighbor.acknowledge(segment.seq);
        assert_eq!(first.await, Ok(()));

        let next = recv_segment(&remote, Duration::from_secs(1)).await.unwrap();
        assert_eq!(next.seq, segment.seq.wrapping_add(1));
        neighbor.acknowledge(next.seq);
        assert_eq!(second.await, Ok(()));
    }

    #[tokio::test]
    async fn test_detach_discards_continuations() {
        let (neighbor, remote) = setup(FAST).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let on_success = calls.clone();
        let on_error = calls.clone();
        neighbor.send_with(
            &Message::join("carol"),
            move || {
                on_success.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                on_error.fetch_add(1, Ordering::SeqCst);
            },
        );
        let pending = neighbor.send(&Message::leave());

        recv_segment(&remote, Duration::from_secs(1)).await.unwrap();
        neighbor.detach();
        assert!(neighbor.is_detached());

        assert_eq!(pending.await, Err(DeliveryError::Detached));
        tokio::time::sleep(FAST.ack_timeout * 4).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        while recv_segment(&remote, FAST.ack_timeout * 2).await.is_some() {}
        assert_eq!(
            neighbor.send(&Message::leave()).await,
            Err(DeliveryError::Detached)
        );
        assert!(recv_segment(&remote, FAST.ack_timeout * 2).await.is_none());
    }

    #[tokio::test]
    async fn test_inspect_runs_before_delivery_resolves() {
        let (neighbor, _remote) = setup(FAST).await;
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let delivery = neighbor.send_inspect(&Message::leave(), move |e| {
            assert!(matches!(e, DeliveryError::RetriesExhausted { .. }));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(delivery.await.is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inspect_runs_without_awaiting() {
        let (neighbor, _remote) = setup(FAST).await;
        let (seen_tx, seen_rx) = oneshot::channel();

        drop(neighbor.send_inspect(&Message::leave(), move |_| {
            let _ = seen_tx.send(());
        }));

        tokio::time::timeout(Duration::from_secs(2), seen_rx)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = DeliveryConfig::default();
        assert_eq!(config.ack_timeout, DEFAULT_ACK_TIMEOUT);
        assert_eq!(config.max_attempts(), DEFAULT_MAX_RETRIES + 1);
    }
}
