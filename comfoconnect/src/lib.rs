//! Client library for the Zehnder/Brink ComfoConnect LAN-C ventilation
//! bridge protocol.
//!
//! The [`bridge::Bridge`] façade is the entry point most applications want:
//! it owns a [`session::Session`] and exposes the high-level verbs
//! (`set_speed`, `subscribe`, ...). Lower-level primitives — the frame
//! codec, the request dispatcher, the RMI byte builder, the PDO registry —
//! are public for callers that need to drive the protocol directly.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod pdo;
pub mod rmi;
pub mod sensors;
pub mod session;
pub mod transport;

pub use bridge::{
    Bridge, BypassMode, ComfoCoolMode, Speed, TemperatureProfile, VentilationMode,
};
pub use error::Error;
pub use session::{SessionConfig, SessionState};

pub use comfoconnect_wire::{TypeTag, Value};
