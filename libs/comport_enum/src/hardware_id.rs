//! Parsers for the hardware identifier strings that serial-capable devices carry on the usb and
//! ftdi bus enumerators.
//!
//! USB example:     USB\VID_303A&PID_4001&MI_00\6&182C0AC9&0&0000
//! FTDIBUS example: FTDIBUS\VID_0403+PID_6001+B001ADZMA\0000

use regex::Regex;
use std::sync::LazyLock;

static USB_HARDWARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)VID_([0-9a-f]{4})(&PID_([0-9a-f]{4}))?(&MI_(\d{2}))?(\\(.*))?")
        .unwrap_or_else(|error| panic!("invalid usb hardware id pattern: {error}"))
});

static FTDI_HARDWARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)VID_([0-9a-f]{4})\+PID_([0-9a-f]{4})(\+(\w+))?")
        .unwrap_or_else(|error| panic!("invalid ftdi hardware id pattern: {error}"))
});

static USB_INTERFACE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^USB\\VID_[0-9a-f]{4}&PID_[0-9a-f]{4}&MI_(\d{2})\\.*$")
        .unwrap_or_else(|error| panic!("invalid usb interface number pattern: {error}"))
});

static FTDI_INTERFACE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^FTDIBUS\\VID_[0-9a-f]{4}\+PID_[0-9a-f]{4}\+\w+\\(\d+)$")
        .unwrap_or_else(|error| panic!("invalid ftdi interface number pattern: {error}"))
});

static ALPHANUMERIC_SERIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+$").unwrap_or_else(|error| panic!("invalid serial number pattern: {error}"))
});

/// The identifiers recovered from a hardware id string; every field is optional because both
/// grammars allow trailing components to be absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HardwareIdMatch {
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub interface_number: Option<u8>,
    pub serial_number: Option<String>,
}

/// Parses a hardware id string under whichever grammar its bus prefix selects.
pub fn parse_hardware_id(hardware_id: &str) -> Option<HardwareIdMatch> {
    if hardware_id.starts_with("FTDIBUS") {
        let captures = FTDI_HARDWARE_ID.captures(hardware_id)?;
        Some(HardwareIdMatch {
            vid: captures.get(1).and_then(|g| u16::from_str_radix(g.as_str(), 16).ok()),
            pid: captures.get(2).and_then(|g| u16::from_str_radix(g.as_str(), 16).ok()),
            interface_number: None,
            serial_number: captures.get(4).map(|g| g.as_str().to_string()),
        })
    } else {
        let captures = USB_HARDWARE_ID.captures(hardware_id)?;
        Some(HardwareIdMatch {
            vid: captures.get(1).and_then(|g| u16::from_str_radix(g.as_str(), 16).ok()),
            pid: captures.get(3).and_then(|g| u16::from_str_radix(g.as_str(), 16).ok()),
            interface_number: captures.get(5).and_then(|g| g.as_str().parse().ok()),
            serial_number: captures.get(7).map(|g| g.as_str().to_string()),
        })
    }
}

/// Extracts the composite interface number (the MI suffix, or the ftdi port index) from a full
/// hardware id string.
pub fn parse_interface_number(hardware_id: &str) -> Option<u8> {
    if let Some(captures) = USB_INTERFACE_NUMBER.captures(hardware_id) {
        return captures.get(1).and_then(|g| g.as_str().parse().ok());
    }
    if let Some(captures) = FTDI_INTERFACE_NUMBER.captures(hardware_id) {
        return captures.get(1).and_then(|g| g.as_str().parse().ok());
    }
    None
}

/// A usb serial number must be purely alphanumeric; anything else is an ephemeral windows
/// device id (as seen on composite devices).
pub fn is_plausible_serial(serial_number: &str) -> bool {
    ALPHANUMERIC_SERIAL.is_match(serial_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_full_usb_hardware_id() {
        let parsed = parse_hardware_id(r"USB\VID_303A&PID_4001&MI_00\6&182C0AC9&0&0000");
        assert_eq!(
            parsed,
            Some(HardwareIdMatch {
                vid: Some(0x303a),
                pid: Some(0x4001),
                interface_number: Some(0),
                serial_number: Some("6&182C0AC9&0&0000".to_string()),
            })
        );
    }

    #[test]
    fn parses_usb_hardware_id_without_serial_suffix() {
        let parsed = parse_hardware_id(r"USB\VID_2341&PID_0043");
        assert_eq!(
            parsed,
            Some(HardwareIdMatch {
                vid: Some(0x2341),
                pid: Some(0x0043),
                interface_number: None,
                serial_number: None,
            })
        );
    }

    #[test]
    fn parses_usb_hardware_id_with_vid_only() {
        let parsed = parse_hardware_id(r"USB\VID_1A86");
        assert_eq!(
            parsed,
            Some(HardwareIdMatch {
                vid: Some(0x1a86),
                pid: None,
                interface_number: None,
                serial_number: None,
            })
        );
    }

    #[test]
    fn parses_ftdi_hardware_id() {
        let parsed = parse_hardware_id(r"FTDIBUS\VID_0403+PID_6001+B001ADZMA\0000");
        assert_eq!(
            parsed,
            Some(HardwareIdMatch {
                vid: Some(0x0403),
                pid: Some(0x6001),
                interface_number: None,
                serial_number: Some("B001ADZMA".to_string()),
            })
        );
    }

    #[test]
    fn hardware_id_matching_is_case_insensitive() {
        let parsed = parse_hardware_id(r"usb\vid_303a&pid_4001");
        assert_eq!(
            parsed,
            Some(HardwareIdMatch {
                vid: Some(0x303a),
                pid: Some(0x4001),
                interface_number: None,
                serial_number: None,
            })
        );
    }

    #[test]
    fn unparseable_hardware_id_yields_no_match() {
        assert_eq!(parse_hardware_id(r"ACPI\PNP0501\1"), None);
        assert_eq!(parse_hardware_id(r"FTDIBUS\NOT_A_VID"), None);
    }

    #[test]
    fn interface_number_requires_full_mi_form() {
        assert_eq!(
            parse_interface_number(r"USB\VID_303A&PID_4001&MI_02\6&182C0AC9&0&0002"),
            Some(2)
        );
        // no MI component
        assert_eq!(parse_interface_number(r"USB\VID_303A&PID_4001\0001"), None);
        // the composite suffix alone (without the instance path) must not match
        assert_eq!(parse_interface_number(r"USB\VID_303A&PID_4001&MI_02"), None);
    }

    #[test]
    fn ftdi_interface_number_comes_from_trailing_port_index() {
        assert_eq!(
            parse_interface_number(r"FTDIBUS\VID_0403+PID_6001+B001ADZMA\0000"),
            Some(0)
        );
    }

    #[test]
    fn serial_number_plausibility() {
        assert!(is_plausible_serial("A5069RR4"));
        assert!(is_plausible_serial("0123456789ab"));
        assert!(!is_plausible_serial("6&182C0AC9&0&0000"));
        assert!(!is_plausible_serial(""));
    }

    proptest! {
        #[test]
        fn any_vid_pid_pair_round_trips_through_the_usb_grammar(vid in 0u16..=0xffff, pid in 0u16..=0xffff) {
            let hardware_id = format!(r"USB\VID_{:04X}&PID_{:04X}", vid, pid);
            let parsed = parse_hardware_id(&hardware_id).unwrap();
            prop_assert_eq!(parsed.vid, Some(vid));
            prop_assert_eq!(parsed.pid, Some(pid));
        }

        #[test]
        fn alphanumeric_serials_are_always_plausible(serial in "[A-Za-z0-9_]{1,32}") {
            prop_assert!(is_plausible_serial(&serial));
        }

        #[test]
        fn serials_with_separator_characters_never_pass(serial in "[A-Za-z0-9]{0,8}[&\\-#][A-Za-z0-9&]{0,8}") {
            prop_assert!(!is_plausible_serial(&serial));
        }
    }
}
