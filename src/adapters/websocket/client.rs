//! Per-connection actor.
//!
//! A [`Client`] bridges one socket to the [`Hub`]. It runs two pumps that
//! share one cancellation token:
//!
//! ```text
//!            hub loop ──try_send──► outbound queue ──► write pump ──► socket
//!                                        ▲                 │ keepalive ping
//!   socket ──► read pump ── pong ────────┘                 │
//!                  │                                       │
//!                  └──────── cancel + unregister ◄─────────┘
//! ```
//!
//! Either pump exiting cancels the other and asks the hub to unregister
//! the client. Unregistration is idempotent, so both pumps doing it is
//! harmless.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::{ClientId, TenantId, UserId};
use crate::domain::realtime::{Message, MessageType};

use super::frame::{Frame, TransportError};
use super::hub::Hub;

/// Tunables for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    /// Period of transport-level keepalive pings.
    pub ping_interval: Duration,
    /// Upper bound on any single write, pings included.
    pub write_timeout: Duration,
    /// Outbound queue capacity. Sends beyond it are dropped.
    pub queue_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            queue_capacity: 256,
        }
    }
}

/// Receiving half of a client's outbound queue, consumed by the write pump.
#[derive(Debug)]
pub struct OutboundQueue(mpsc::Receiver<Arc<Message>>);

impl OutboundQueue {
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.0.try_recv().ok()
    }
}

/// One live connection as seen by the hub.
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    tenant_id: TenantId,
    user_id: UserId,
    outbound: mpsc::Sender<Arc<Message>>,
    cancel: CancellationToken,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl Client {
    /// Create a client for an admitted connection.
    ///
    /// Tenant and user are fixed for the client's lifetime.
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        queue_capacity: usize,
    ) -> (Arc<Self>, OutboundQueue) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let client = Arc::new(Self {
            id: ClientId::new(),
            tenant_id,
            user_id,
            outbound: tx,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });
        (client, OutboundQueue(rx))
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Enqueue a message without waiting.
    ///
    /// Returns `false` when the message was not queued: the queue was full
    /// (the message is dropped and counted), or the client is closed.
    pub fn send(&self, message: Arc<Message>) -> bool {
        if self.is_closed() {
            return false;
        }

        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    client_id = %self.id,
                    tenant_id = %self.tenant_id,
                    user_id = %self.user_id,
                    message_type = %message.kind(),
                    dropped,
                    "Client outbound queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Tear the connection down. Safe to call any number of times.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(client_id = %self.id, "Closing client");
        }
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Messages dropped because the outbound queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn handle_text(&self, text: &str) {
        let message = match Message::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(client_id = %self.id, error = %e, "Ignoring malformed frame");
                return;
            }
        };

        match message.kind() {
            MessageType::Ping => {
                self.send(Arc::new(Message::pong()));
            }
            other => {
                tracing::trace!(client_id = %self.id, message_type = %other, "Ignoring client message");
            }
        }
    }
}

/// Run both pumps for a registered client until the connection ends.
///
/// The write pump is spawned; the read pump runs on the caller's task.
/// Returns after both have exited.
pub async fn run<S, R>(
    client: Arc<Client>,
    queue: OutboundQueue,
    hub: Hub,
    sink: S,
    stream: R,
    settings: ClientSettings,
) where
    S: Sink<Frame, Error = TransportError> + Unpin + Send + 'static,
    R: Stream<Item = Result<Frame, TransportError>> + Unpin + Send + 'static,
{
    let writer = tokio::spawn(write_pump(
        client.clone(),
        queue,
        hub.clone(),
        sink,
        settings,
    ));

    read_pump(client.clone(), hub, stream).await;

    if let Err(e) = writer.await {
        tracing::error!(client_id = %client.id, error = %e, "Write pump task failed");
    }
}

async fn write_pump<S>(
    client: Arc<Client>,
    OutboundQueue(mut queue): OutboundQueue,
    hub: Hub,
    mut sink: S,
    settings: ClientSettings,
) where
    S: Sink<Frame, Error = TransportError> + Unpin + Send,
{
    let mut keepalive = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = client.cancel.cancelled() => break,

            next = queue.recv() => {
                let Some(message) = next else { break };
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(client_id = %client.id, error = %e, "Failed to encode message");
                        continue;
                    }
                };
                if let Err(e) = write_frame(&mut sink, Frame::Text(text), settings.write_timeout).await {
                    tracing::debug!(client_id = %client.id, error = %e, "Write failed, closing connection");
                    break;
                }
            }

            _ = keepalive.tick() => {
                if let Err(e) = write_frame(&mut sink, Frame::Ping(Vec::new()), settings.write_timeout).await {
                    tracing::debug!(client_id = %client.id, error = %e, "Keepalive ping failed, closing connection");
                    break;
                }
            }
        }
    }

    client.cancel.cancel();
    hub.unregister(client.clone()).await;

    let shutdown = async {
        sink.send(Frame::normal_close()).await?;
        sink.close().await
    };
    if let Ok(Err(e)) = timeout(settings.write_timeout, shutdown).await {
        tracing::trace!(client_id = %client.id, error = %e, "Close frame not delivered");
    }
}

async fn read_pump<R>(client: Arc<Client>, hub: Hub, mut stream: R)
where
    R: Stream<Item = Result<Frame, TransportError>> + Unpin + Send,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = client.cancel.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Frame::Text(text))) => client.handle_text(&text),
            Some(Ok(Frame::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => client.handle_text(text),
                Err(_) => tracing::debug!(client_id = %client.id, "Ignoring non-UTF-8 binary frame"),
            },
            Some(Ok(Frame::Ping(_) | Frame::Pong(_))) => {}
            Some(Ok(Frame::Close(code))) => {
                tracing::debug!(client_id = %client.id, ?code, "Client sent close frame");
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(client_id = %client.id, error = %e, "Read error");
                break;
            }
            None => break,
        }
    }

    client.cancel.cancel();
    hub.unregister(client).await;
}

async fn write_frame<S>(sink: &mut S, frame: Frame, limit: Duration) -> Result<(), TransportError>
where
    S: Sink<Frame, Error = TransportError> + Unpin,
{
    match timeout(limit, sink.send(frame)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::hub::testing::{settle, started};
    use futures::channel::mpsc as chan;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    type PeerRx = chan::UnboundedReceiver<Frame>;
    type PeerTx = chan::UnboundedSender<Result<Frame, TransportError>>;

    /// In-memory socket: what the server writes shows up on `PeerRx`,
    /// what the test pushes into `PeerTx` is read by the server.
    fn memory_socket() -> (
        impl Sink<Frame, Error = TransportError> + Unpin + Send + 'static,
        chan::UnboundedReceiver<Result<Frame, TransportError>>,
        PeerRx,
        PeerTx,
    ) {
        let (server_tx, peer_rx) = chan::unbounded::<Frame>();
        let (peer_tx, server_rx) = chan::unbounded::<Result<Frame, TransportError>>();
        (
            server_tx.sink_map_err(TransportError::io),
            server_rx,
            peer_rx,
            peer_tx,
        )
    }

    async fn next_text(peer: &mut PeerRx) -> Message {
        loop {
            match peer.next().await.expect("socket ended") {
                Frame::Text(text) => return Message::from_json(&text).unwrap(),
                Frame::Ping(_) => continue,
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }

    fn started_hub() -> (Hub, CancellationToken) {
        let (hub, shutdown, _loop) = started();
        (hub, shutdown)
    }

    /// A transport whose send buffer never frees up.
    struct StalledSink;

    impl Sink<Frame> for StalledSink {
        type Error = TransportError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _frame: Frame) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[test]
    fn send_drops_newest_when_queue_is_full() {
        let (client, OutboundQueue(mut rx)) = Client::new(TenantId::new(), UserId::new(), 2);

        assert!(client.send(Arc::new(Message::pong())));
        assert!(client.send(Arc::new(Message::ping())));
        assert!(!client.send(Arc::new(Message::pong())));
        assert!(!client.send(Arc::new(Message::pong())));

        assert_eq!(client.dropped_messages(), 2);
        assert_eq!(rx.try_recv().unwrap().kind(), &MessageType::Pong);
        assert_eq!(rx.try_recv().unwrap().kind(), &MessageType::Ping);

        // Space freed, later sends succeed again.
        assert!(client.send(Arc::new(Message::pong())));
        assert_eq!(client.dropped_messages(), 2);
    }

    #[test]
    fn close_is_idempotent_and_stops_sends() {
        let (client, _queue) = Client::new(TenantId::new(), UserId::new(), 4);

        client.close();
        client.close();

        assert!(client.is_closed());
        assert!(!client.send(Arc::new(Message::pong())));
        assert_eq!(client.dropped_messages(), 0);
    }

    #[test]
    fn inbound_ping_queues_one_pong() {
        let (client, OutboundQueue(mut rx)) = Client::new(TenantId::new(), UserId::new(), 4);

        client.handle_text(r#"{"type":"ping"}"#);

        assert_eq!(rx.try_recv().unwrap().kind(), &MessageType::Pong);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unknown_and_malformed_frames_are_ignored() {
        let (client, OutboundQueue(mut rx)) = Client::new(TenantId::new(), UserId::new(), 4);

        client.handle_text(r#"{"type":"typing:start","payload":{"post":1}}"#);
        client.handle_text("not json");

        assert!(rx.try_recv().is_err());
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn ping_over_socket_gets_pong_reply() {
        let (hub, _shutdown) = started_hub();
        let (sink, stream, mut peer_rx, peer_tx) = memory_socket();
        let (client, queue) = Client::new(TenantId::new(), UserId::new(), 8);
        hub.register(client.clone()).await;

        let task = tokio::spawn(run(
            client.clone(),
            queue,
            hub.clone(),
            sink,
            stream,
            ClientSettings::default(),
        ));

        peer_tx
            .unbounded_send(Ok(Frame::Text(r#"{"type":"ping"}"#.to_string())))
            .unwrap();

        let reply = next_text(&mut peer_rx).await;
        assert_eq!(reply.kind(), &MessageType::Pong);

        client.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn peer_close_ends_both_pumps_and_sends_normal_close() {
        let (hub, _shutdown) = started_hub();
        let (sink, stream, mut peer_rx, peer_tx) = memory_socket();
        let (client, queue) = Client::new(TenantId::new(), UserId::new(), 8);
        hub.register(client.clone()).await;

        let task = tokio::spawn(run(
            client.clone(),
            queue,
            hub.clone(),
            sink,
            stream,
            ClientSettings::default(),
        ));

        peer_tx.unbounded_send(Ok(Frame::Close(Some(1000)))).unwrap();
        task.await.unwrap();

        assert!(client.is_closed());
        assert_eq!(peer_rx.next().await, Some(Frame::normal_close()));
    }

    #[tokio::test(start_paused = true)]
    async fn write_pump_sends_keepalive_after_one_interval() {
        let (hub, _shutdown) = started_hub();
        let (sink, stream, mut peer_rx, _peer_tx) = memory_socket();
        let (client, queue) = Client::new(TenantId::new(), UserId::new(), 8);
        let settings = ClientSettings {
            ping_interval: Duration::from_secs(30),
            ..ClientSettings::default()
        };

        let task = tokio::spawn(run(client.clone(), queue, hub, sink, stream, settings));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(peer_rx.try_next().is_err(), "no ping before the first interval");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(peer_rx.next().await, Some(Frame::Ping(Vec::new())));

        client.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn read_error_cancels_write_pump() {
        let (hub, _shutdown) = started_hub();
        let (sink, stream, _peer_rx, peer_tx) = memory_socket();
        let (client, queue) = Client::new(TenantId::new(), UserId::new(), 8);

        let task = tokio::spawn(run(
            client.clone(),
            queue,
            hub,
            sink,
            stream,
            ClientSettings::default(),
        ));

        peer_tx
            .unbounded_send(Err(TransportError::io("connection reset")))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("pumps did not stop")
            .unwrap();
        assert!(client.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_write_times_out_and_unregisters() {
        let (hub, _shutdown) = started_hub();
        let tenant_id = TenantId::new();
        let (client, queue) = Client::new(tenant_id, UserId::new(), 8);
        hub.register(client.clone()).await;
        settle(&hub).await;
        assert_eq!(hub.tenant_client_count(tenant_id).await, 1);

        let (_peer_tx, stream) = chan::unbounded::<Result<Frame, TransportError>>();
        let settings = ClientSettings {
            write_timeout: Duration::from_secs(10),
            ..ClientSettings::default()
        };
        client.send(Arc::new(Message::pong()));

        let task = tokio::spawn(run(
            client.clone(),
            queue,
            hub.clone(),
            StalledSink,
            stream,
            settings,
        ));

        tokio::time::timeout(Duration::from_secs(60), task)
            .await
            .expect("pumps did not stop after the write timeout")
            .unwrap();
        assert!(client.is_closed());

        settle(&hub).await;
        assert_eq!(hub.tenant_client_count(tenant_id).await, 0);
    }
}
