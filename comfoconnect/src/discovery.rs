//! UDP broadcast discovery (spec §4.7): one `SearchGatewayRequest`
//! broadcast, a bounded collection window, replies deduplicated by bridge
//! UUID.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use comfoconnect_proto::{SearchGatewayRequest, SearchGatewayResponse};
use prost::Message;
use tokio::net::UdpSocket;

use crate::error::TransportError;

/// The well-known ComfoConnect discovery/TCP port (spec §6).
pub const DEFAULT_PORT: u16 = 56747;

/// One bridge discovered on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DiscoveredBridge {
    /// The IP address the reply was received from, as reported in the
    /// payload (not necessarily the UDP packet's source address).
    pub ip_address: String,
    /// The bridge's 16-byte identifier.
    pub uuid: Vec<u8>,
    /// The bridge's reported firmware/protocol version string.
    pub version: String,
}

/// Broadcast a discovery request and collect unique replies (by UUID) for
/// `timeout`.
///
/// Discovery replies are bare `SearchGatewayResponse` protobuf messages,
/// not wrapped in the outer [`comfoconnect_proto::GatewayEnvelope`] or
/// length-prefixed: UDP already delivers one datagram per message, so
/// there is nothing for an outer frame to delimit (spec §4.7).
pub async fn discover(
    timeout: Duration,
    broadcast_addr: Ipv4Addr,
    port: u16,
) -> Result<Vec<DiscoveredBridge>, TransportError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .map_err(TransportError::Connect)?;
    socket.set_broadcast(true).map_err(TransportError::Connect)?;

    let request = SearchGatewayRequest {}.encode_to_vec();
    socket
        .send_to(&request, SocketAddr::from((broadcast_addr, port)))
        .await
        .map_err(TransportError::Io)?;

    let mut found = Vec::new();
    let mut seen_uuids = std::collections::HashSet::new();
    let mut buf = [0u8; 1500];

    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _from))) => match SearchGatewayResponse::decode(&buf[..len]) {
                Ok(response) => {
                    if seen_uuids.insert(response.uuid.clone()) {
                        found.push(DiscoveredBridge {
                            ip_address: response.ip_address,
                            uuid: response.uuid,
                            version: response.version,
                        });
                    }
                }
                Err(e) => log::debug!("dropping malformed discovery reply: {e}"),
            },
            Ok(Err(e)) => return Err(TransportError::Io(e)),
            Err(_elapsed) => break,
        }
    }

    Ok(found)
}
