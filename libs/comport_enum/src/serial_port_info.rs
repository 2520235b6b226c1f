use std::fmt;

/// Everything we know about one serial port: the port name plus whatever usb metadata could be
/// recovered for it.  Fields that could not be determined stay `None`; no placeholder values are
/// stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SerialPortInfo {
    /// The port name (e.g. "COM7").
    pub port_name: String,
    /// A display identifier: the usb summary for usb-backed ports, or the raw hardware id.
    pub hwid: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    /// The interface description of the port's usb interface (composite devices expose several).
    pub interface: Option<String>,
    pub description: Option<String>,
    /// A platform-neutral usb location string (e.g. "1-3.1:x.0").
    pub location: Option<String>,
}

impl SerialPortInfo {
    pub fn new(port_name: impl Into<String>, hwid: impl Into<String>) -> Self {
        SerialPortInfo {
            port_name: port_name.into(),
            hwid: hwid.into(),
            ..SerialPortInfo::default()
        }
    }

    /// A usb summary string in the same shape that serial port listings use on other platforms:
    /// "USB VID:PID=vvvv:pppp[ SER=...][ LOC=...]" with the ids in uppercase hex.
    pub fn usb_info(&self) -> String {
        let serial_rendering = match &self.serial_number {
            Some(serial_number) => format!(" SER={}", serial_number),
            None => String::new(),
        };
        let location_rendering = match &self.location {
            Some(location) => format!(" LOC={}", location),
            None => String::new(),
        };
        format!(
            "USB VID:PID={:04X}:{:04X}{}{}",
            self.vid.unwrap_or(0),
            self.pid.unwrap_or(0),
            serial_rendering,
            location_rendering,
        )
    }

    /// The best human-readable description available: product and interface for composite
    /// devices, the product alone otherwise, or whatever description was already present.
    pub fn usb_description(&self) -> Option<String> {
        match (&self.product, &self.interface) {
            (Some(product), Some(interface)) => Some(format!("{} - {}", product, interface)),
            (Some(product), None) => Some(product.clone()),
            _ => self.description.clone(),
        }
    }

    /// Rewrites the description and display identifier from the recovered usb metadata.
    pub fn apply_usb_info(&mut self) {
        self.description = self.usb_description();
        self.hwid = self.usb_info();
    }
}

impl fmt::Display for SerialPortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}]",
            self.port_name,
            self.description.as_deref().unwrap_or("n/a"),
            self.hwid,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_info_renders_uppercase_ids_with_optional_fields() {
        let mut info = SerialPortInfo::new("COM7", r"USB\VID_0403&PID_6001\A5069RR4");
        info.vid = Some(0x0403);
        info.pid = Some(0x6001);
        assert_eq!(info.usb_info(), "USB VID:PID=0403:6001");

        info.serial_number = Some("A5069RR4".to_string());
        info.location = Some("1-3.1:x.0".to_string());
        assert_eq!(info.usb_info(), "USB VID:PID=0403:6001 SER=A5069RR4 LOC=1-3.1:x.0");
    }

    #[test]
    fn unknown_ids_render_as_zero() {
        let info = SerialPortInfo::new("COM1", "");
        assert_eq!(info.usb_info(), "USB VID:PID=0000:0000");
    }

    #[test]
    fn description_prefers_product_and_interface() {
        let mut info = SerialPortInfo::new("COM7", "");
        info.description = Some("USB Serial Port (COM7)".to_string());
        assert_eq!(info.usb_description().as_deref(), Some("USB Serial Port (COM7)"));

        info.product = Some("USB JTAG/serial debug unit".to_string());
        assert_eq!(info.usb_description().as_deref(), Some("USB JTAG/serial debug unit"));

        info.interface = Some("JTAG/serial debug unit interface 0".to_string());
        assert_eq!(
            info.usb_description().as_deref(),
            Some("USB JTAG/serial debug unit - JTAG/serial debug unit interface 0")
        );
    }

    #[test]
    fn apply_usb_info_rewrites_description_and_hwid() {
        let mut info = SerialPortInfo::new("COM7", r"FTDIBUS\VID_0403+PID_6001+A5069RR4A\0000");
        info.vid = Some(0x0403);
        info.pid = Some(0x6001);
        info.serial_number = Some("A5069RR4".to_string());
        info.product = Some("FT232R USB UART".to_string());
        info.apply_usb_info();
        assert_eq!(info.description.as_deref(), Some("FT232R USB UART"));
        assert_eq!(info.hwid, "USB VID:PID=0403:6001 SER=A5069RR4");
    }

    #[test]
    fn display_includes_port_description_and_hwid() {
        let mut info = SerialPortInfo::new("COM7", r"ACPI\PNP0501\1");
        assert_eq!(info.to_string(), "COM7: n/a [ACPI\\PNP0501\\1]");
        info.description = Some("Communications Port".to_string());
        assert_eq!(
            info.to_string(),
            "COM7: Communications Port [ACPI\\PNP0501\\1]"
        );
    }
}
