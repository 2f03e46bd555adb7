//! The TCP transport: one reader task draining frames into the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) or an event channel, and a
//! mutex-guarded writer half shared by every caller that wants to send a
//! request (spec §4.2 — "only one writer may hold the transport write-half
//! at a time").

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use comfoconnect_proto::{GatewayEnvelope, GatewayOperation, OperationType};
use prost::Message;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::dispatcher::Dispatcher;
use crate::error::TransportError;
use crate::frame::{self, DEFAULT_MAX_FRAME_LEN};

/// Something the reader task observed that no pending request was waiting
/// for: an unsolicited notification, or the transport going away.
#[derive(Debug)]
pub enum InboundEvent {
    /// A `CnNodeNotification`, `CnRpdoNotification`, `GatewayNotification`
    /// or `CloseSessionNotification` (or any envelope whose reference is 0
    /// or unmatched).
    Notification(GatewayEnvelope),
    /// The reader task hit EOF or an I/O error; the transport is dead.
    Lost(TransportError),
}

/// A live TCP connection to a bridge.
pub struct Transport {
    write_half: Arc<AsyncMutex<OwnedWriteHalf>>,
    local_uuid: [u8; 16],
    bridge_uuid: [u8; 16],
    dispatcher: Arc<Dispatcher>,
    reader_task: JoinHandle<()>,
    last_inbound: Arc<StdMutex<Instant>>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
}

impl Transport {
    /// Connect to `addr` and spawn the background reader task.
    ///
    /// `local_uuid`/`bridge_uuid` are stamped as `src`/`dst` on every
    /// outbound envelope this transport sends.
    pub async fn connect(
        addr: SocketAddr,
        local_uuid: [u8; 16],
        bridge_uuid: [u8; 16],
        dispatcher: Arc<Dispatcher>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<InboundEvent>), TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::Connect)?;
        stream.set_nodelay(true).map_err(TransportError::Connect)?;

        let (read_half, write_half) = stream.into_split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let last_inbound = Arc::new(StdMutex::new(Instant::now()));

        let reader_dispatcher = Arc::clone(&dispatcher);
        let reader_last_inbound = Arc::clone(&last_inbound);
        let reader_events_tx = events_tx.clone();
        let reader_task = tokio::spawn(reader_loop(
            read_half,
            reader_dispatcher,
            reader_events_tx,
            reader_last_inbound,
        ));

        let transport = Self {
            write_half: Arc::new(AsyncMutex::new(write_half)),
            local_uuid,
            bridge_uuid,
            dispatcher,
            reader_task,
            last_inbound,
            events_tx,
        };

        Ok((transport, events_rx))
    }

    /// How long has elapsed since the reader last observed any inbound
    /// frame (spec §4.2: a stall is declared after 3x the keepalive
    /// interval with no inbound traffic).
    fn since_last_inbound(&self) -> Duration {
        self.last_inbound.lock().expect("last-inbound mutex poisoned").elapsed()
    }

    /// Encode and send an envelope carrying `payload` for `operation_type`
    /// tagged with `reference` (0 for fire-and-forget messages like
    /// `KeepAlive`).
    pub async fn send(
        &self,
        operation_type: OperationType,
        reference: u32,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let envelope = GatewayEnvelope {
            src: self.local_uuid.to_vec(),
            dst: self.bridge_uuid.to_vec(),
            operation: Some(GatewayOperation {
                r#type: operation_type as i32,
                reference,
            }),
            payload,
        };

        let encoded = frame::encode_envelope(&envelope);
        let mut write_half = self.write_half.lock().await;
        frame::write_frame(&mut *write_half, &encoded).await
    }

    /// Send a bare `KeepAlive` with no reference and no payload.
    pub async fn send_keepalive(&self) -> Result<(), TransportError> {
        self.send(OperationType::KeepAlive, 0, Vec::new()).await
    }

    /// Send `payload` as `operation_type` and await the matching reply,
    /// correlated by a freshly allocated reference id.
    ///
    /// This is the one request/reply primitive every higher layer (session
    /// setup, RMI calls, PDO subscribe/unsubscribe) builds on.
    pub async fn request(
        &self,
        operation_type: OperationType,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<GatewayEnvelope, crate::error::RequestError> {
        use crate::error::RequestError;

        let (reference, rx) = self.dispatcher.register(timeout);

        if self.send(operation_type, reference, payload).await.is_err() {
            self.dispatcher.cancel(reference);
            return Err(RequestError::TransportLost);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(RequestError::Timeout),
            Err(_) => {
                self.dispatcher.cancel(reference);
                Err(RequestError::Timeout)
            }
        }
    }

    /// Flush any buffered bytes and shut the write half down cleanly.
    pub async fn close(&self) {
        let mut write_half = self.write_half.lock().await;
        let _ = write_half.shutdown().await;
        self.dispatcher.fail_all();
        self.reader_task.abort();
    }
}

async fn reader_loop(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    dispatcher: Arc<Dispatcher>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
    last_inbound: Arc<StdMutex<Instant>>,
) {
    loop {
        let frame_bytes = match frame::read_frame(&mut read_half, DEFAULT_MAX_FRAME_LEN).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                dispatcher.fail_all();
                let _ = events_tx.send(InboundEvent::Lost(TransportError::UnexpectedEof));
                return;
            }
            Err(e) => {
                log::warn!("reader task terminating: {e}");
                dispatcher.fail_all();
                let _ = events_tx.send(InboundEvent::Lost(e));
                return;
            }
        };

        *last_inbound.lock().expect("last-inbound mutex poisoned") = Instant::now();

        let envelope = match GatewayEnvelope::decode(frame_bytes.as_slice()) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("dropping a frame with a malformed envelope: {e}");
                continue;
            }
        };

        let reference = envelope.operation.as_ref().map(|op| op.reference).unwrap_or(0);

        if reference != 0 && dispatcher.resolve(reference, envelope.clone()) {
            continue;
        }

        let _ = events_tx.send(InboundEvent::Notification(envelope));
    }
}

/// Spawn a periodic task that sends `KeepAlive` frames, sweeps timed-out
/// requests out of `dispatcher`, and watches for a stalled connection,
/// every `interval`.
///
/// Per spec §3/§8 scenario 4, a connection with no inbound traffic for 3x
/// `interval` is declared stalled: the watchdog reports
/// [`TransportError::StalledConnection`] to the session's event channel
/// and stops driving keepalives, leaving teardown to the session machine
/// (which reacts to `InboundEvent::Lost` the same way it reacts to a
/// reader-task exit).
pub fn spawn_keepalive_task(
    transport: Arc<Transport>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if transport.since_last_inbound() >= interval * 3 {
                log::warn!("no inbound traffic for 3x the keepalive interval; declaring stalled");
                let _ = transport
                    .events_tx
                    .send(InboundEvent::Lost(TransportError::StalledConnection));
                transport.reader_task.abort();
                return;
            }

            transport.dispatcher.sweep_timeouts();
            if let Err(e) = transport.send_keepalive().await {
                log::warn!("keepalive send failed: {e}");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_an_envelope_a_peer_can_decode() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            socket
        });

        let dispatcher = Arc::new(Dispatcher::new());
        let (transport, _events_rx) =
            Transport::connect(addr, [1; 16], [2; 16], dispatcher).await.unwrap();

        transport
            .send(OperationType::VersionRequest, 7, Vec::new())
            .await
            .unwrap();

        let mut peer_socket = accept.await.unwrap();
        let frame_bytes = frame::read_frame(&mut peer_socket, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .expect("frame present");
        let envelope = frame::decode_envelope(&frame_bytes).unwrap();

        assert_eq!(envelope.src, vec![1; 16]);
        assert_eq!(envelope.dst, vec![2; 16]);
        assert_eq!(envelope.operation.unwrap().reference, 7);
    }

    #[tokio::test]
    async fn resolves_a_pending_request_from_an_inbound_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let dispatcher = Arc::new(Dispatcher::new());
        let (reference, rx) = dispatcher.register(Duration::from_secs(5));

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let reply = GatewayEnvelope {
                src: vec![2; 16],
                dst: vec![1; 16],
                operation: Some(GatewayOperation {
                    r#type: OperationType::VersionConfirm as i32,
                    reference,
                }),
                payload: Vec::new(),
            };
            let encoded = frame::encode_envelope(&reply);
            frame::write_frame(&mut socket, &encoded).await.unwrap();
        });

        let (_transport, _events_rx) =
            Transport::connect(addr, [1; 16], [2; 16], dispatcher).await.unwrap();

        server.await.unwrap();
        let envelope = rx.await.unwrap();
        assert_eq!(envelope.operation.unwrap().r#type, OperationType::VersionConfirm as i32);
    }

    #[tokio::test]
    async fn keepalive_task_sends_frames_on_the_configured_cadence() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            socket
        });

        let dispatcher = Arc::new(Dispatcher::new());
        let (transport, _events_rx) =
            Transport::connect(addr, [1; 16], [2; 16], dispatcher).await.unwrap();
        let transport = Arc::new(transport);
        let mut peer_socket = accept.await.unwrap();

        let _keepalive = spawn_keepalive_task(Arc::clone(&transport), Duration::from_millis(20));

        for _ in 0..2 {
            let frame_bytes = frame::read_frame(&mut peer_socket, DEFAULT_MAX_FRAME_LEN)
                .await
                .unwrap()
                .expect("frame present");
            let envelope = frame::decode_envelope(&frame_bytes).unwrap();
            assert_eq!(envelope.operation.unwrap().r#type, OperationType::KeepAlive as i32);
        }
    }

    #[tokio::test]
    async fn silent_peer_is_declared_stalled_after_three_intervals() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // Hold the peer open but never send anything back, so the
            // watchdog's 3x-interval stall check is what fires, not EOF.
            socket
        });

        let dispatcher = Arc::new(Dispatcher::new());
        let (transport, mut events_rx) =
            Transport::connect(addr, [1; 16], [2; 16], dispatcher).await.unwrap();
        let transport = Arc::new(transport);
        let _peer_socket = accept.await.unwrap();

        let _keepalive = spawn_keepalive_task(Arc::clone(&transport), Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .expect("watchdog should report a stall within the timeout")
            .expect("event channel should not close first");

        assert!(matches!(event, InboundEvent::Lost(TransportError::StalledConnection)));
    }
}
