//! ComfoConnect error types.
//!
//! Errors are grouped by blast radius, not by layer: a [`TransportError`]
//! or [`SessionError`] always brings the connection down, while
//! [`RequestError`], [`RmiError`] and [`DecodeError`] are scoped to a
//! single in-flight operation and never tear down the session.

use comfoconnect_wire::WireError;

/// Top level ComfoConnect error.
#[derive(Debug)]
pub enum Error {
    /// The TCP transport failed; the connection is no longer usable.
    Transport(TransportError),
    /// The protocol session itself failed or was refused.
    Session(SessionError),
    /// A single request failed without affecting the rest of the session.
    Request(RequestError),
    /// An RMI call was rejected by the bridge.
    Rmi(RmiError),
    /// A value failed to decode.
    Decode(DecodeError),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            Error::Session(e) => Some(e),
            Error::Request(e) => Some(e),
            Error::Rmi(e) => Some(e),
            Error::Decode(e) => Some(e),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport: {e}"),
            Error::Session(e) => write!(f, "session: {e}"),
            Error::Request(e) => write!(f, "request: {e}"),
            Error::Rmi(e) => write!(f, "rmi: {e}"),
            Error::Decode(e) => write!(f, "decode: {e}"),
        }
    }
}

/// Errors fatal to the TCP transport.
#[derive(Debug)]
pub enum TransportError {
    /// Failed to establish the TCP connection.
    Connect(std::io::Error),
    /// An I/O error occurred while reading or writing a frame.
    Io(std::io::Error),
    /// The peer closed the connection mid-frame.
    UnexpectedEof,
    /// A frame's declared length exceeded the configured ceiling.
    FrameTooLarge {
        /// Declared length in bytes.
        declared: u32,
        /// Configured ceiling in bytes.
        max: u32,
    },
    /// The envelope could not be decoded as a protobuf message.
    MalformedEnvelope(prost::DecodeError),
    /// No inbound traffic was observed for 3x the keepalive interval.
    StalledConnection,
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Connect(e) | TransportError::Io(e) => Some(e),
            TransportError::MalformedEnvelope(e) => Some(e),
            _ => None,
        }
    }
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "failed to connect: {e}"),
            TransportError::Io(e) => write!(f, "i/o error: {e}"),
            TransportError::UnexpectedEof => f.write_str("connection closed mid-frame"),
            TransportError::FrameTooLarge { declared, max } => write!(
                f,
                "frame length {declared} exceeds configured ceiling of {max} bytes"
            ),
            TransportError::MalformedEnvelope(e) => write!(f, "malformed envelope: {e}"),
            TransportError::StalledConnection => {
                f.write_str("no inbound traffic within 3x the keepalive interval")
            }
        }
    }
}

/// Errors fatal to the protocol session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// `StartSessionConfirm` reported the app is not registered.
    NotRegistered,
    /// The bridge closed the session (`CloseSessionNotification`).
    SessionClosedByBridge,
    /// The bridge's reported protocol version is incompatible.
    ProtocolVersionMismatch,
    /// A reference id collided with a still-outstanding request after a
    /// 32-bit wraparound. Treated as a protocol fault (see spec Open
    /// Question (a)): the connection is dropped rather than guessed at.
    ReferenceIdCollision,
}

impl std::error::Error for SessionError {}

impl core::fmt::Display for SessionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionError::NotRegistered => f.write_str("app is not registered with the bridge"),
            SessionError::SessionClosedByBridge => f.write_str("bridge closed the session"),
            SessionError::ProtocolVersionMismatch => {
                f.write_str("bridge protocol version is incompatible")
            }
            SessionError::ReferenceIdCollision => {
                f.write_str("reference id wrapped onto a still-outstanding request")
            }
        }
    }
}

/// Errors scoped to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// The request did not complete within its deadline.
    Timeout,
    /// The caller cancelled the request before it completed.
    Cancelled,
    /// The reply's operation tag did not match what was expected.
    UnexpectedReply,
    /// The session was not active when the request was issued.
    NotConnected,
    /// The transport was lost while this request was outstanding.
    TransportLost,
}

impl std::error::Error for RequestError {}

impl core::fmt::Display for RequestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RequestError::Timeout => f.write_str("request timed out"),
            RequestError::Cancelled => f.write_str("request was cancelled"),
            RequestError::UnexpectedReply => f.write_str("unexpected reply operation tag"),
            RequestError::NotConnected => f.write_str("session is not active"),
            RequestError::TransportLost => f.write_str("transport was lost"),
        }
    }
}

/// RMI error codes as returned by the bridge (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmiError {
    /// 11: unknown command.
    UnknownCommand,
    /// 12: unknown unit.
    UnknownUnit,
    /// 13: unknown subunit.
    UnknownSubunit,
    /// 14: unknown property.
    UnknownProperty,
    /// 15: the type cannot have a range.
    TypeCannotHaveRange,
    /// 30: value out of range.
    ValueOutOfRange,
    /// 32: property is not gettable or settable.
    PropertyNotGettableOrSettable,
    /// 40: internal error.
    InternalError,
    /// 41: internal error, possibly caused by a malformed command.
    InternalErrorMaybeWrongCommand,
    /// An error code not in the above table.
    Unknown(u32),
}

impl RmiError {
    /// Map a raw RMI error code to an [`RmiError`].
    pub fn from_code(code: u32) -> Self {
        match code {
            11 => Self::UnknownCommand,
            12 => Self::UnknownUnit,
            13 => Self::UnknownSubunit,
            14 => Self::UnknownProperty,
            15 => Self::TypeCannotHaveRange,
            30 => Self::ValueOutOfRange,
            32 => Self::PropertyNotGettableOrSettable,
            40 => Self::InternalError,
            41 => Self::InternalErrorMaybeWrongCommand,
            other => Self::Unknown(other),
        }
    }

    /// The raw RMI error code this variant represents.
    pub fn code(&self) -> u32 {
        match self {
            Self::UnknownCommand => 11,
            Self::UnknownUnit => 12,
            Self::UnknownSubunit => 13,
            Self::UnknownProperty => 14,
            Self::TypeCannotHaveRange => 15,
            Self::ValueOutOfRange => 30,
            Self::PropertyNotGettableOrSettable => 32,
            Self::InternalError => 40,
            Self::InternalErrorMaybeWrongCommand => 41,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::error::Error for RmiError {}

impl core::fmt::Display for RmiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command ({})", self.code()),
            Self::UnknownUnit => write!(f, "unknown unit ({})", self.code()),
            Self::UnknownSubunit => write!(f, "unknown subunit ({})", self.code()),
            Self::UnknownProperty => write!(f, "unknown property ({})", self.code()),
            Self::TypeCannotHaveRange => write!(f, "type cannot have a range ({})", self.code()),
            Self::ValueOutOfRange => write!(f, "value out of range ({})", self.code()),
            Self::PropertyNotGettableOrSettable => {
                write!(f, "property not gettable or settable ({})", self.code())
            }
            Self::InternalError => write!(f, "internal error ({})", self.code()),
            Self::InternalErrorMaybeWrongCommand => {
                write!(f, "internal error, possibly a malformed command ({})", self.code())
            }
            Self::Unknown(code) => write!(f, "unknown RMI error code {code}"),
        }
    }
}

/// Decode errors. Always logged and dropped; never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A `CnRpdoNotification` named a PDID with no active subscription.
    UnknownPdid(u32),
    /// A value's type tag or wire encoding could not be decoded.
    Wire(WireError),
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Wire(e) => Some(e),
            DecodeError::UnknownPdid(_) => None,
        }
    }
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::UnknownPdid(pdid) => write!(f, "notification for unsubscribed pdid {pdid}"),
            DecodeError::Wire(e) => write!(f, "{e}"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Self {
        Self::Request(e)
    }
}

impl From<RmiError> for Error {
    fn from(e: RmiError) -> Self {
        Self::Rmi(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<WireError> for DecodeError {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}
