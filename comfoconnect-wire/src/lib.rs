//! Traits and types used to pack/unpack ComfoConnect RMI and PDO values
//! from the wire.
//!
//! The ComfoConnect LAN-C protocol carries two byte-oriented sub-dialects
//! inside its protobuf envelope: RMI (property get/set) and PDO (streamed
//! sensor samples). Both encode scalar values little-endian, tagged by an
//! elementary type the caller already knows (from the property or PDID
//! being addressed). This crate is the leaf codec for those scalars; it
//! knows nothing about envelopes, sessions, or sockets.

#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]

mod error;
mod impls;
mod value;

pub use error::WireError;
pub use value::{Time, TypeTag, Value, Version};

/// A type which can be decoded from the beginning of a little-endian byte
/// buffer, per ComfoConnect's RMI/PDO value encoding rules.
pub trait WireRead: Sized {
    /// Unpack this type from the beginning of the given buffer.
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError>;
}

/// A type which can be encoded onto the wire.
pub trait WireWrite {
    /// Append the packed representation of this value onto `buf`.
    fn pack_to_vec(&self, buf: &mut Vec<u8>);

    /// Packed length in bytes of this value.
    fn packed_len(&self) -> usize;

    /// Pack this value into a freshly allocated `Vec<u8>`.
    fn to_packed_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.packed_len());
        self.pack_to_vec(&mut buf);
        buf
    }
}

/// A type with a fixed, compile-time-known packed size.
pub trait WireSized: WireWrite {
    /// Packed size in bytes.
    const PACKED_LEN: usize;
}
