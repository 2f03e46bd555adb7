//! Builtin implementations for the elementary RMI/PDO scalar types.

use crate::{WireError, WireRead, WireSized, WireWrite};

macro_rules! impl_primitive_wire_field {
    ($ty:ty, $size:expr) => {
        impl WireWrite for $ty {
            fn pack_to_vec(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }

            fn packed_len(&self) -> usize {
                $size
            }
        }

        impl WireRead for $ty {
            fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
                let raw = buf.get(0..$size).ok_or(WireError::Truncated {
                    needed: $size,
                    available: buf.len(),
                })?;

                // SAFETY: slice above is exactly $size bytes.
                Ok(Self::from_le_bytes(raw.try_into().unwrap()))
            }
        }

        impl WireSized for $ty {
            const PACKED_LEN: usize = $size;
        }
    };
}

impl_primitive_wire_field!(u8, 1);
impl_primitive_wire_field!(u16, 2);
impl_primitive_wire_field!(u32, 4);
impl_primitive_wire_field!(i8, 1);
impl_primitive_wire_field!(i16, 2);
impl_primitive_wire_field!(i64, 8);

impl WireWrite for bool {
    fn pack_to_vec(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }

    fn packed_len(&self) -> usize {
        1
    }
}

impl WireRead for bool {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let byte = *buf.first().ok_or(WireError::Truncated {
            needed: 1,
            available: 0,
        })?;

        Ok(byte != 0)
    }
}

impl WireSized for bool {
    const PACKED_LEN: usize = 1;
}

/// RMI/PDO strings are zero-terminated UTF-8; the trailing NUL is stripped
/// on decode and appended on encode.
impl WireWrite for str {
    fn pack_to_vec(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.as_bytes());
        buf.push(0);
    }

    fn packed_len(&self) -> usize {
        self.len() + 1
    }
}

impl WireWrite for String {
    fn pack_to_vec(&self, buf: &mut Vec<u8>) {
        self.as_str().pack_to_vec(buf)
    }

    fn packed_len(&self) -> usize {
        self.as_str().packed_len()
    }
}

impl WireRead for String {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());

        core::str::from_utf8(&buf[..end])
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidString)
    }
}
