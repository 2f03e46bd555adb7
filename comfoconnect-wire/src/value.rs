//! The decoded value model shared between the RMI and PDO sub-dialects.

use crate::{WireError, WireRead, WireWrite};

/// The elementary type of an RMI property or PDO sample.
///
/// Numeric values follow the bridge's PDO type enumeration (as seen in
/// `CnRpdoRequest.type`); the same enumeration is reused for RMI's `type`
/// byte since both sub-dialects draw from one elementary type system.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum TypeTag {
    /// Single byte, 0 or 1.
    Bool = 1,
    /// Unsigned 8-bit integer.
    U8 = 2,
    /// Unsigned 16-bit integer.
    U16 = 3,
    /// Unsigned 32-bit integer.
    U32 = 4,
    /// Signed 8-bit integer.
    I8 = 5,
    /// Signed 16-bit integer.
    I16 = 6,
    /// Signed 64-bit integer.
    I64 = 7,
    /// Zero-terminated UTF-8 string.
    String = 8,
    /// Seconds since the ComfoConnect epoch (2000-01-01T00:00:00Z).
    Time = 9,
    /// Nibble-packed major/minor/patch/build version word.
    Version = 10,
}

impl TypeTag {
    /// Recover a type tag from its wire byte.
    pub fn from_u8(byte: u8) -> Result<Self, WireError> {
        Ok(match byte {
            1 => Self::Bool,
            2 => Self::U8,
            3 => Self::U16,
            4 => Self::U32,
            5 => Self::I8,
            6 => Self::I16,
            7 => Self::I64,
            8 => Self::String,
            9 => Self::Time,
            10 => Self::Version,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

/// Seconds elapsed since the ComfoConnect epoch, 2000-01-01T00:00:00Z.
///
/// The protocol never specifies a timezone; callers that need a calendar
/// date are expected to add [`Time::EPOCH_UNIX_OFFSET`] to recover a Unix
/// timestamp and convert from there.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Time(pub u32);

impl Time {
    /// Seconds between the Unix epoch (1970-01-01) and the ComfoConnect
    /// epoch (2000-01-01), i.e. the value to add to a `Time` to get a Unix
    /// timestamp.
    pub const EPOCH_UNIX_OFFSET: u32 = 946_684_800;

    /// Convert to a Unix timestamp (seconds since 1970-01-01T00:00:00Z).
    pub fn to_unix_timestamp(self) -> u32 {
        self.0.wrapping_add(Self::EPOCH_UNIX_OFFSET)
    }
}

impl WireRead for Time {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        u32::unpack_from_slice(buf).map(Time)
    }
}

impl WireWrite for Time {
    fn pack_to_vec(&self, buf: &mut Vec<u8>) {
        self.0.pack_to_vec(buf)
    }

    fn packed_len(&self) -> usize {
        4
    }
}

/// A firmware/protocol version, nibble-packed into a 32-bit little-endian
/// word as `major:4 | minor:4 | patch:4 | build:20` (most to least
/// significant).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Version {
    /// Major version nibble (0-15).
    pub major: u8,
    /// Minor version nibble (0-15).
    pub minor: u8,
    /// Patch version nibble (0-15).
    pub patch: u8,
    /// Build number, the low 20 bits of the word.
    pub build: u32,
}

impl WireRead for Version {
    fn unpack_from_slice(buf: &[u8]) -> Result<Self, WireError> {
        let word = u32::unpack_from_slice(buf)?;

        Ok(Self {
            major: ((word >> 28) & 0xF) as u8,
            minor: ((word >> 24) & 0xF) as u8,
            patch: ((word >> 20) & 0xF) as u8,
            build: word & 0x000F_FFFF,
        })
    }
}

impl WireWrite for Version {
    fn pack_to_vec(&self, buf: &mut Vec<u8>) {
        let word = (u32::from(self.major & 0xF) << 28)
            | (u32::from(self.minor & 0xF) << 24)
            | (u32::from(self.patch & 0xF) << 20)
            | (self.build & 0x000F_FFFF);

        word.pack_to_vec(buf)
    }

    fn packed_len(&self) -> usize {
        4
    }
}

/// A decoded RMI/PDO value, tagged by its elementary type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    /// A `bool` value.
    Bool(bool),
    /// A `u8` value.
    U8(u8),
    /// A `u16` value.
    U16(u16),
    /// A `u32` value.
    U32(u32),
    /// An `i8` value.
    I8(i8),
    /// An `i16` value.
    I16(i16),
    /// An `i64` value.
    I64(i64),
    /// A UTF-8 string value.
    String(String),
    /// A seconds-since-epoch timestamp.
    Time(Time),
    /// A nibble-packed version word.
    Version(Version),
}

impl Value {
    /// The [`TypeTag`] of this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::U8(_) => TypeTag::U8,
            Value::U16(_) => TypeTag::U16,
            Value::U32(_) => TypeTag::U32,
            Value::I8(_) => TypeTag::I8,
            Value::I16(_) => TypeTag::I16,
            Value::I64(_) => TypeTag::I64,
            Value::String(_) => TypeTag::String,
            Value::Time(_) => TypeTag::Time,
            Value::Version(_) => TypeTag::Version,
        }
    }

    /// Decode a value of the given type from `buf`.
    ///
    /// An unknown type tag or a truncated buffer is a decode error; it must
    /// never be treated as fatal to the session (see the ComfoConnect
    /// decode error taxonomy: `UnknownPDID`/`UnknownType`/`TruncatedValue`
    /// are logged and dropped, not propagated as transport faults).
    pub fn decode(tag: TypeTag, buf: &[u8]) -> Result<Self, WireError> {
        Ok(match tag {
            TypeTag::Bool => Value::Bool(bool::unpack_from_slice(buf)?),
            TypeTag::U8 => Value::U8(u8::unpack_from_slice(buf)?),
            TypeTag::U16 => Value::U16(u16::unpack_from_slice(buf)?),
            TypeTag::U32 => Value::U32(u32::unpack_from_slice(buf)?),
            TypeTag::I8 => Value::I8(i8::unpack_from_slice(buf)?),
            TypeTag::I16 => Value::I16(i16::unpack_from_slice(buf)?),
            TypeTag::I64 => Value::I64(i64::unpack_from_slice(buf)?),
            TypeTag::String => Value::String(String::unpack_from_slice(buf)?),
            TypeTag::Time => Value::Time(Time::unpack_from_slice(buf)?),
            TypeTag::Version => Value::Version(Version::unpack_from_slice(buf)?),
        })
    }

    /// Encode this value onto the wire.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Value::Bool(v) => v.to_packed_vec(),
            Value::U8(v) => v.to_packed_vec(),
            Value::U16(v) => v.to_packed_vec(),
            Value::U32(v) => v.to_packed_vec(),
            Value::I8(v) => v.to_packed_vec(),
            Value::I16(v) => v.to_packed_vec(),
            Value::I64(v) => v.to_packed_vec(),
            Value::String(v) => v.to_packed_vec(),
            Value::Time(v) => v.to_packed_vec(),
            Value::Version(v) => v.to_packed_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_elementary_type() {
        let samples = vec![
            Value::Bool(true),
            Value::U8(0xab),
            Value::U16(0xabcd),
            Value::U32(0xdead_beef),
            Value::I8(-42),
            Value::I16(-1234),
            Value::I64(-9_000_000_000),
            Value::String("ComfoAirQ".to_owned()),
            Value::Time(Time(1_234_567)),
            Value::Version(Version {
                major: 1,
                minor: 2,
                patch: 3,
                build: 42,
            }),
        ];

        for sample in samples {
            let encoded = sample.encode();
            let decoded = Value::decode(sample.type_tag(), &encoded).expect("decode");

            assert_eq!(sample, decoded);
        }
    }

    #[test]
    fn decodes_outdoor_temperature_sample_from_scenario() {
        // Scenario 3 of the spec: PDID 276, INT16, raw bytes `3c 00` little
        // endian -> 0x003c = 60, interpreted by callers as 6.0 degC (the
        // 0.1 degC scale lives in the sensor catalog, not in this crate).
        let decoded = Value::decode(TypeTag::I16, &[0x3c, 0x00]).unwrap();

        assert_eq!(decoded, Value::I16(60));
    }

    #[test]
    fn string_strips_trailing_nul() {
        let mut raw = b"ComfoAirQ".to_vec();
        raw.push(0);

        let decoded = Value::decode(TypeTag::String, &raw).unwrap();

        assert_eq!(decoded, Value::String("ComfoAirQ".to_owned()));
    }

    #[test]
    fn unknown_type_tag_is_a_decode_error_not_a_panic() {
        assert!(TypeTag::from_u8(200).is_err());
    }

    #[test]
    fn version_nibble_packing_round_trips() {
        let version = Version {
            major: 4,
            minor: 2,
            patch: 1,
            build: 999,
        };

        let encoded = version.to_packed_vec();
        let decoded = Version::unpack_from_slice(&encoded).unwrap();

        assert_eq!(version, decoded);
    }
}
