//! Static sensor/PDID catalog (SPEC_FULL §3).
//!
//! This is data, not logic: a lookup table from PDID to the elementary
//! type, display name and unit a caller would want when printing a PDO
//! sample. PDIDs outside the table remain fully usable through
//! [`crate::pdo::PdoRegistry`] directly — the catalog only makes
//! `show-sensors` output legible, it is never a gate (spec §9 Open
//! Question (c)).

use comfoconnect_wire::TypeTag;

/// One row of the static sensor catalog.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SensorInfo {
    /// The PDID this entry describes.
    pub pdid: u32,
    /// The elementary type a notification for this PDID decodes as.
    pub type_tag: TypeTag,
    /// Human-readable name.
    pub name: &'static str,
    /// Display unit, if the value has one.
    pub unit: Option<&'static str>,
    /// Whether this PDID belongs to the ventilation unit (vs. the bridge
    /// itself, e.g. its own RF signal strength).
    pub ventilation_unit: bool,
}

/// The well-known sensors this crate ships a catalog entry for.
pub const SENSORS: &[SensorInfo] = &[
    SensorInfo {
        pdid: 276,
        type_tag: TypeTag::I16,
        name: "outdoor air temperature",
        unit: Some("\u{b0}C x10"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 289,
        type_tag: TypeTag::I16,
        name: "extract air temperature",
        unit: Some("\u{b0}C x10"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 290,
        type_tag: TypeTag::I16,
        name: "exhaust air temperature",
        unit: Some("\u{b0}C x10"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 291,
        type_tag: TypeTag::I16,
        name: "supply air temperature",
        unit: Some("\u{b0}C x10"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 117,
        type_tag: TypeTag::U8,
        name: "fan speed setting",
        unit: None,
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 118,
        type_tag: TypeTag::U8,
        name: "supply fan duty",
        unit: Some("%"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 119,
        type_tag: TypeTag::U8,
        name: "exhaust fan duty",
        unit: Some("%"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 128,
        type_tag: TypeTag::U8,
        name: "supply fan speed",
        unit: Some("rpm x10"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 129,
        type_tag: TypeTag::U8,
        name: "exhaust fan speed",
        unit: Some("rpm x10"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 218,
        type_tag: TypeTag::U8,
        name: "bypass state",
        unit: None,
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 219,
        type_tag: TypeTag::Bool,
        name: "away mode active",
        unit: None,
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 225,
        type_tag: TypeTag::U8,
        name: "comfocool mode",
        unit: None,
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 561,
        type_tag: TypeTag::U32,
        name: "days remaining until filter change",
        unit: Some("days"),
        ventilation_unit: true,
    },
    SensorInfo {
        pdid: 65,
        type_tag: TypeTag::U32,
        name: "avoided heating energy, year to date",
        unit: Some("Wh"),
        ventilation_unit: true,
    },
];

/// Look up a catalog entry by PDID.
pub fn lookup(pdid: u32) -> Option<&'static SensorInfo> {
    SENSORS.iter().find(|entry| entry.pdid == pdid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_the_outdoor_temperature_sensor_from_the_scenario() {
        let entry = lookup(276).expect("pdid 276 is catalogued");

        assert_eq!(entry.type_tag, TypeTag::I16);
        assert_eq!(entry.name, "outdoor air temperature");
    }

    #[test]
    fn unknown_pdid_is_not_catalogued_but_not_an_error() {
        assert!(lookup(999_999).is_none());
    }

    #[test]
    fn catalog_has_no_duplicate_pdids() {
        let mut seen = std::collections::HashSet::new();
        for entry in SENSORS {
            assert!(seen.insert(entry.pdid), "duplicate pdid {}", entry.pdid);
        }
    }
}
