//! The session state machine (spec §4.4): owns the connection lifecycle
//! from `Disconnected` through `Connecting`/`Starting` to `Active`, handles
//! registration, keepalives, and reconnect-with-backoff.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use comfoconnect_proto::{
    CloseSessionRequest, CnRpdoNotification, OperationType, RegisterAppRequest,
    StartSessionRequest,
};
use prost::Message;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::dispatcher::Dispatcher;
use crate::error::{Error, SessionError};
use crate::pdo::PdoRegistry;
use crate::transport::{spawn_keepalive_task, InboundEvent, Transport};

/// Lifecycle states of a [`Session`] (spec §4.4's state table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SessionState {
    /// No TCP connection; the default state and the state reconnect
    /// failures and graceful closes settle back into.
    Disconnected,
    /// TCP connect in flight.
    Connecting,
    /// TCP is up; registration/`StartSessionRequest` handshake in flight.
    Starting,
    /// Handshake completed; requests and PDO traffic flow normally.
    Active,
    /// A graceful `disconnect()` was requested; `CloseSessionRequest` is
    /// in flight or was sent and we're waiting for the transport to drop.
    Closing,
}

/// Connection and policy parameters for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bridge TCP address.
    pub addr: SocketAddr,
    /// This app's stable 16-byte identifier (spec §6: must be stable
    /// across runs for registration to persist on the bridge).
    pub local_uuid: [u8; 16],
    /// The bridge's 16-byte identifier, normally learned via discovery.
    pub bridge_uuid: [u8; 16],
    /// Device name sent with `RegisterAppRequest`.
    pub device_name: String,
    /// PIN sent with `RegisterAppRequest`.
    pub pin: u32,
    /// Per-request timeout (default 5s per spec §4.3).
    pub request_timeout: Duration,
    /// Keepalive interval `K` (default 5s per spec §4.2).
    pub keepalive_interval: Duration,
    /// Whether an unsolicited disconnect triggers reconnect-with-backoff.
    pub auto_reconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 56747)),
            local_uuid: [0; 16],
            bridge_uuid: [0; 16],
            device_name: "comfoconnect-rs".to_owned(),
            pin: 0,
            request_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(5),
            auto_reconnect: true,
        }
    }
}

/// Owns the connection lifecycle to one bridge.
pub struct Session {
    config: SessionConfig,
    state: StdMutex<SessionState>,
    transport: AsyncMutex<Option<Arc<Transport>>>,
    dispatcher: Arc<Dispatcher>,
    pdo: Arc<PdoRegistry>,
    keepalive_task: AsyncMutex<Option<JoinHandle<()>>>,
    driver_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Construct a disconnected session. Call [`Session::connect`] to bring
    /// it up.
    pub fn new(config: SessionConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: StdMutex::new(SessionState::Disconnected),
            transport: AsyncMutex::new(None),
            dispatcher: Arc::new(Dispatcher::new()),
            pdo: Arc::new(PdoRegistry::new()),
            keepalive_task: AsyncMutex::new(None),
            driver_task: AsyncMutex::new(None),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session state mutex poisoned")
    }

    fn set_state(&self, state: SessionState) {
        log::info!("session state -> {state:?}");
        *self.state.lock().expect("session state mutex poisoned") = state;
    }

    /// The shared PDO subscription registry.
    pub fn pdo(&self) -> &Arc<PdoRegistry> {
        &self.pdo
    }

    /// The shared request dispatcher, for components (RMI, PDO requests)
    /// that need to correlate their own requests against this session's
    /// active transport.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The currently active transport, if any.
    pub async fn transport(&self) -> Option<Arc<Transport>> {
        self.transport.lock().await.clone()
    }

    /// Bring the session up: connect, register + start session, and spawn
    /// the background driver that keeps it alive per the reconnect policy.
    pub async fn connect(self: &Arc<Self>) -> Result<(), Error> {
        self.set_state(SessionState::Connecting);

        let transport = Arc::new(
            Transport::connect(
                self.config.addr,
                self.config.local_uuid,
                self.config.bridge_uuid,
                Arc::clone(&self.dispatcher),
            )
            .await
            .map(|(transport, events_rx)| {
                let this = Arc::clone(self);
                tokio::spawn(this.drive(events_rx));
                transport
            })?,
        );

        self.set_state(SessionState::Starting);
        self.handshake(&transport).await?;

        *self.transport.lock().await = Some(Arc::clone(&transport));
        self.set_state(SessionState::Active);

        let keepalive = spawn_keepalive_task(transport, self.config.keepalive_interval);
        *self.keepalive_task.lock().await = Some(keepalive);

        Ok(())
    }

    async fn handshake(&self, transport: &Transport) -> Result<(), Error> {
        let register_payload = RegisterAppRequest {
            uuid: self.config.local_uuid.to_vec(),
            device_name: self.config.device_name.clone(),
            pin: self.config.pin,
        }
        .encode_to_vec();

        // Both Confirm(ok) and Confirm(already-registered) are success to
        // the caller (spec §4.4); a transport-level failure here is fatal,
        // a rejected-PIN style status is not distinguishable from "already
        // registered" at this layer, so we proceed to StartSessionRequest
        // regardless and let its own status speak.
        if let Err(e) = transport
            .request(
                OperationType::RegisterAppRequest,
                register_payload,
                self.config.request_timeout,
            )
            .await
        {
            log::debug!("register_app during handshake did not complete: {e}");
        }

        let start_payload = StartSessionRequest { take_over: false }.encode_to_vec();
        let reply = transport
            .request(
                OperationType::StartSessionRequest,
                start_payload,
                self.config.request_timeout,
            )
            .await?;

        let confirm = comfoconnect_proto::StartSessionConfirm::decode(reply.payload.as_slice())
            .map_err(crate::error::TransportError::MalformedEnvelope)?;

        let status_code = confirm.status.map(|s| s.code).unwrap_or(0);
        if status_code != 0 {
            self.set_state(SessionState::Disconnected);
            return Err(SessionError::NotRegistered.into());
        }

        Ok(())
    }

    /// Request a graceful shutdown: send `CloseSessionRequest`, then tear
    /// the transport down.
    pub async fn disconnect(&self) {
        self.set_state(SessionState::Closing);

        if let Some(transport) = self.transport.lock().await.take() {
            let _ = transport
                .send(OperationType::CloseSessionRequest, 0, CloseSessionRequest {}.encode_to_vec())
                .await;
            transport.close().await;
        }

        if let Some(task) = self.keepalive_task.lock().await.take() {
            task.abort();
        }

        self.set_state(SessionState::Disconnected);
    }

    /// Register an app with the bridge (`cmd_register_app`, spec §4.4).
    /// Both `Confirm(ok)` and `Confirm(already-registered)` are treated as
    /// success by the caller.
    pub async fn register_app(&self, uuid: [u8; 16], device_name: String, pin: u32) -> Result<(), Error> {
        let transport = self.active_transport().await?;

        let request = RegisterAppRequest {
            uuid: uuid.to_vec(),
            device_name,
            pin,
        }
        .encode_to_vec();

        transport
            .request(OperationType::RegisterAppRequest, request, self.config.request_timeout)
            .await?;

        Ok(())
    }

    /// Remove a registered app by exact UUID match (`cmd_deregister_app`,
    /// spec §4.4).
    pub async fn deregister_app(&self, uuid: [u8; 16]) -> Result<(), Error> {
        let transport = self.active_transport().await?;

        let request = comfoconnect_proto::DeregisterAppRequest { uuid: uuid.to_vec() }.encode_to_vec();

        transport
            .request(OperationType::DeregisterAppRequest, request, self.config.request_timeout)
            .await?;

        Ok(())
    }

    /// List every app currently registered with the bridge.
    pub async fn list_registered_apps(&self) -> Result<Vec<comfoconnect_proto::RegisteredApp>, Error> {
        let transport = self.active_transport().await?;

        let reply = transport
            .request(
                OperationType::ListRegisteredAppsRequest,
                comfoconnect_proto::ListRegisteredAppsRequest {}.encode_to_vec(),
                self.config.request_timeout,
            )
            .await?;

        let confirm = comfoconnect_proto::ListRegisteredAppsConfirm::decode(reply.payload.as_slice())
            .map_err(crate::error::TransportError::MalformedEnvelope)?;

        Ok(confirm.apps)
    }

    async fn active_transport(&self) -> Result<Arc<Transport>, Error> {
        self.transport
            .lock()
            .await
            .clone()
            .ok_or_else(|| crate::error::RequestError::NotConnected.into())
    }

    async fn drive(self: Arc<Self>, mut events_rx: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = events_rx.recv().await {
            match event {
                InboundEvent::Notification(envelope) => self.handle_notification(envelope),
                InboundEvent::Lost(e) => {
                    log::warn!("transport lost: {e}");
                    self.dispatcher.fail_all();
                    *self.transport.lock().await = None;
                    self.set_state(SessionState::Disconnected);

                    if self.config.auto_reconnect && self.state() != SessionState::Closing {
                        self.reconnect_with_backoff().await;
                    }
                    return;
                }
            }
        }
    }

    fn handle_notification(&self, envelope: comfoconnect_proto::GatewayEnvelope) {
        let Some(operation) = envelope.operation.as_ref() else {
            return;
        };

        match OperationType::try_from(operation.r#type).ok() {
            Some(OperationType::CnRpdoNotification) => {
                match CnRpdoNotification::decode(envelope.payload.as_slice()) {
                    Ok(notification) => {
                        if let Err(e) = self.pdo.dispatch(notification.pdid, &notification.data) {
                            log::debug!("dropping pdo notification: {e}");
                        }
                    }
                    Err(e) => log::warn!("malformed CnRpdoNotification: {e}"),
                }
            }
            Some(OperationType::CloseSessionNotification) => {
                log::info!("bridge closed the session");
                self.set_state(SessionState::Disconnected);
            }
            Some(OperationType::GatewayNotification) => {
                log::debug!("gateway notification received");
            }
            Some(OperationType::CnNodeNotification) => {
                log::trace!("node notification received");
            }
            other => log::trace!("unhandled notification operation: {other:?}"),
        }
    }

    async fn reconnect_with_backoff(self: Arc<Self>) {
        let mut delay = Duration::from_secs(1);
        let max_delay = Duration::from_secs(30);

        loop {
            log::info!("reconnecting in {delay:?}");
            tokio::time::sleep(delay).await;

            match self.connect().await {
                Ok(()) => {
                    self.resubscribe_all().await;
                    return;
                }
                Err(e) => {
                    log::warn!("reconnect attempt failed: {e}");
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    /// Re-issue `CnRpdoRequest` for every PDID currently tracked in the PDO
    /// registry, so subscriptions survive a reconnect (spec §4.4 and
    /// scenario 6 in §8).
    async fn resubscribe_all(&self) {
        let Some(transport) = self.transport().await else {
            return;
        };

        for (pdid, type_tag) in self.pdo.subscribed() {
            let request = comfoconnect_proto::CnRpdoRequest {
                pdid,
                r#type: type_tag as i32,
                zone: 1,
                timeout: 0xFFFF_FFFF,
            }
            .encode_to_vec();

            if let Err(e) = transport
                .request(OperationType::CnRpdoRequest, request, self.config.request_timeout)
                .await
            {
                log::warn!("failed to resubscribe pdid {pdid} after reconnect: {e}");
            }
        }
    }
}
