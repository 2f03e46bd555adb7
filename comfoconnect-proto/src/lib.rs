//! Generated protobuf message types for the ComfoConnect LAN-C envelope.
//!
//! This crate is nothing but `prost`-generated code plus the `include!`
//! that pulls it in from `OUT_DIR`; see `build.rs`. It exists as its own
//! crate so the generated code (which does not follow this workspace's
//! naming/doc conventions) never leaks into `comfoconnect`'s public API
//! surface or its rustdoc.

#![allow(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/comfoconnect.protocol.rs"));
