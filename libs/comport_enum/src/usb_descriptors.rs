//! Wire-format codec for the usb descriptors returned by hub node-connection requests, plus the
//! request helpers which issue those requests over an open hub control channel.
//!
//! All multi-byte descriptor fields are little-endian, per the usb specification.

// descriptor type codes
pub const USB_DEVICE_DESCRIPTOR_TYPE: u8 = 1;
pub const USB_CONFIGURATION_DESCRIPTOR_TYPE: u8 = 2;
pub const USB_STRING_DESCRIPTOR_TYPE: u8 = 3;
pub const USB_INTERFACE_DESCRIPTOR_TYPE: u8 = 4;

pub const USB_REQUEST_GET_DESCRIPTOR: u8 = 0x06;

pub const DEVICE_DESCRIPTOR_LENGTH: usize = 18;
pub const CONFIGURATION_DESCRIPTOR_LENGTH: usize = 9;
pub const INTERFACE_DESCRIPTOR_LENGTH: usize = 9;
pub const COMMON_DESCRIPTOR_LENGTH: usize = 2;

// a string descriptor holds at most 255 utf-16 code units after its two header bytes
pub const MAXIMUM_STRING_DESCRIPTOR_LENGTH: u16 = 512;

/// The 8-byte usb setup packet carried inside a node-connection descriptor request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetupPacket {
    pub bm_request: u8,
    pub b_request: u8,
    pub w_value: u16,
    pub w_index: u16,
    pub w_length: u16,
}

impl SetupPacket {
    pub fn get_descriptor(descriptor_type: u8, descriptor_index: u8, w_length: u16) -> Self {
        SetupPacket {
            bm_request: 0x80, // device-to-host
            b_request: USB_REQUEST_GET_DESCRIPTOR,
            w_value: ((descriptor_type as u16) << 8) | (descriptor_index as u16),
            w_index: 0,
            w_length,
        }
    }

    pub fn encode(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.bm_request;
        bytes[1] = self.b_request;
        bytes[2..4].copy_from_slice(&self.w_value.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.w_index.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.w_length.to_le_bytes());
        bytes
    }
}

/// An open control channel to a usb hub, able to issue node-connection requests on behalf of the
/// devices attached to its downstream ports.
///
/// Implementations release the underlying hub handle when the channel is dropped.
pub trait HubControlChannel {
    /// Issues a get-descriptor request to the device on the given downstream port; returns the
    /// descriptor payload (without the request header) on success.
    fn get_descriptor(&self, hub_port: u32, setup: SetupPacket) -> Option<Vec<u8>>;

    /// Queries the connection state of the given downstream port; returns the raw
    /// connection-information buffer on success.
    fn get_connection_info(&self, hub_port: u32) -> Option<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeviceDescriptor {
    pub bcd_usb: u16,
    pub b_device_class: u8,
    pub b_device_sub_class: u8,
    pub b_device_protocol: u8,
    pub b_max_packet_size_0: u8,
    pub id_vendor: u16,
    pub id_product: u16,
    pub bcd_device: u16,
    pub i_manufacturer: u8,
    pub i_product: u8,
    pub i_serial_number: u8,
    pub b_num_configurations: u8,
}

impl DeviceDescriptor {
    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < DEVICE_DESCRIPTOR_LENGTH {
            return None;
        }
        if (buffer[0] as usize) < DEVICE_DESCRIPTOR_LENGTH {
            return None;
        }
        if buffer[1] != USB_DEVICE_DESCRIPTOR_TYPE {
            return None;
        }
        Some(DeviceDescriptor {
            bcd_usb: u16::from_le_bytes([buffer[2], buffer[3]]),
            b_device_class: buffer[4],
            b_device_sub_class: buffer[5],
            b_device_protocol: buffer[6],
            b_max_packet_size_0: buffer[7],
            id_vendor: u16::from_le_bytes([buffer[8], buffer[9]]),
            id_product: u16::from_le_bytes([buffer[10], buffer[11]]),
            bcd_device: u16::from_le_bytes([buffer[12], buffer[13]]),
            i_manufacturer: buffer[14],
            i_product: buffer[15],
            i_serial_number: buffer[16],
            b_num_configurations: buffer[17],
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigurationDescriptor {
    pub w_total_length: u16,
    pub b_num_interfaces: u8,
    pub b_configuration_value: u8,
    pub i_configuration: u8,
    pub bm_attributes: u8,
    pub max_power: u8,
}

impl ConfigurationDescriptor {
    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < CONFIGURATION_DESCRIPTOR_LENGTH {
            return None;
        }
        if (buffer[0] as usize) < CONFIGURATION_DESCRIPTOR_LENGTH {
            return None;
        }
        if buffer[1] != USB_CONFIGURATION_DESCRIPTOR_TYPE {
            return None;
        }
        Some(ConfigurationDescriptor {
            w_total_length: u16::from_le_bytes([buffer[2], buffer[3]]),
            b_num_interfaces: buffer[4],
            b_configuration_value: buffer[5],
            i_configuration: buffer[6],
            bm_attributes: buffer[7],
            max_power: buffer[8],
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterfaceDescriptor {
    pub b_interface_number: u8,
    pub b_alternate_setting: u8,
    pub b_num_endpoints: u8,
    pub b_interface_class: u8,
    pub b_interface_sub_class: u8,
    pub b_interface_protocol: u8,
    pub i_interface: u8,
}

impl InterfaceDescriptor {
    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < INTERFACE_DESCRIPTOR_LENGTH {
            return None;
        }
        if buffer[0] as usize != INTERFACE_DESCRIPTOR_LENGTH {
            return None;
        }
        if buffer[1] != USB_INTERFACE_DESCRIPTOR_TYPE {
            return None;
        }
        Some(InterfaceDescriptor {
            b_interface_number: buffer[2],
            b_alternate_setting: buffer[3],
            b_num_endpoints: buffer[4],
            b_interface_class: buffer[5],
            b_interface_sub_class: buffer[6],
            b_interface_protocol: buffer[7],
            i_interface: buffer[8],
        })
    }
}

/// Decodes a string descriptor payload into its text, dropping the 2-byte header.
pub fn decode_string_descriptor(buffer: &[u8]) -> Option<String> {
    if buffer.len() < COMMON_DESCRIPTOR_LENGTH {
        return None;
    }
    let b_length = buffer[0] as usize;
    if b_length < COMMON_DESCRIPTOR_LENGTH || b_length > buffer.len() || b_length % 2 != 0 {
        return None;
    }
    if buffer[1] != USB_STRING_DESCRIPTOR_TYPE {
        return None;
    }
    let utf16_chars: Vec<u16> = buffer[COMMON_DESCRIPTOR_LENGTH..b_length]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Some(String::from_utf16_lossy(&utf16_chars))
}

// the usb node-connection descriptor request starts with a 12-byte header: the (1-based)
// downstream port number followed by the setup packet
pub const DESCRIPTOR_REQUEST_HEADER_LENGTH: usize = 12;

pub fn encode_descriptor_request(hub_port: u32, setup: SetupPacket) -> Vec<u8> {
    let mut buffer = vec![0u8; DESCRIPTOR_REQUEST_HEADER_LENGTH + setup.w_length as usize];
    buffer[0..4].copy_from_slice(&hub_port.to_le_bytes());
    buffer[4..12].copy_from_slice(&setup.encode());
    buffer
}

// the packed connection-information buffer: port number, device descriptor, then the
// per-connection state fields
pub const CONNECTION_INFORMATION_LENGTH: usize = 35;

pub fn encode_connection_request(hub_port: u32) -> [u8; CONNECTION_INFORMATION_LENGTH] {
    let mut buffer = [0u8; CONNECTION_INFORMATION_LENGTH];
    buffer[0..4].copy_from_slice(&hub_port.to_le_bytes());
    buffer
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UsbConnectionInfo {
    pub device_descriptor: DeviceDescriptor,
    pub current_configuration_value: u8,
    pub speed: u8,
    pub device_is_hub: bool,
    pub device_address: u16,
    pub number_of_open_pipes: u32,
    pub connection_status: u32,
}

impl UsbConnectionInfo {
    pub fn decode(buffer: &[u8]) -> Option<Self> {
        if buffer.len() < CONNECTION_INFORMATION_LENGTH {
            return None;
        }
        let device_descriptor = DeviceDescriptor::decode(&buffer[4..4 + DEVICE_DESCRIPTOR_LENGTH])?;
        Some(UsbConnectionInfo {
            device_descriptor,
            current_configuration_value: buffer[22],
            speed: buffer[23],
            device_is_hub: buffer[24] != 0,
            device_address: u16::from_le_bytes([buffer[25], buffer[26]]),
            number_of_open_pipes: u32::from_le_bytes([buffer[27], buffer[28], buffer[29], buffer[30]]),
            connection_status: u32::from_le_bytes([buffer[31], buffer[32], buffer[33], buffer[34]]),
        })
    }
}

/// Requests the device descriptor of the device on the given downstream port.
pub fn request_device_descriptor<C: HubControlChannel>(
    channel: &C,
    hub_port: u32,
) -> Option<DeviceDescriptor> {
    let setup = SetupPacket::get_descriptor(
        USB_DEVICE_DESCRIPTOR_TYPE,
        0,
        DEVICE_DESCRIPTOR_LENGTH as u16,
    );
    let payload = channel.get_descriptor(hub_port, setup)?;
    DeviceDescriptor::decode(&payload)
}

/// Requests the 9-byte configuration descriptor header at the given (0-based) configuration index.
pub fn request_configuration_descriptor<C: HubControlChannel>(
    channel: &C,
    hub_port: u32,
    configuration_index: u8,
) -> Option<ConfigurationDescriptor> {
    let setup = SetupPacket::get_descriptor(
        USB_CONFIGURATION_DESCRIPTOR_TYPE,
        configuration_index,
        CONFIGURATION_DESCRIPTOR_LENGTH as u16,
    );
    let payload = channel.get_descriptor(hub_port, setup)?;
    ConfigurationDescriptor::decode(&payload)
}

/// Requests a string descriptor and decodes its text; index zero means "no string".
pub fn request_string_descriptor<C: HubControlChannel>(
    channel: &C,
    hub_port: u32,
    string_index: u8,
) -> Option<String> {
    if string_index == 0 {
        return None;
    }
    let setup = SetupPacket::get_descriptor(
        USB_STRING_DESCRIPTOR_TYPE,
        string_index,
        MAXIMUM_STRING_DESCRIPTOR_LENGTH,
    );
    let payload = channel.get_descriptor(hub_port, setup)?;
    decode_string_descriptor(&payload)
}

/// Requests the full configuration descriptor (header plus trailing interface, endpoint and
/// class-specific descriptors) and collects every alternate setting of the target interface.
///
/// The trailer is walked via the 2-byte common descriptor headers; the walk stops at the first
/// malformed header (zero-length, overflowing the reported total length, or an interface
/// descriptor of unexpected size).
pub fn request_interface_descriptors<C: HubControlChannel>(
    channel: &C,
    hub_port: u32,
    configuration: &ConfigurationDescriptor,
    target_interface_number: u8,
) -> Vec<InterfaceDescriptor> {
    let total_length = configuration.w_total_length as usize;
    let setup = SetupPacket::get_descriptor(
        USB_CONFIGURATION_DESCRIPTOR_TYPE,
        configuration.b_configuration_value.saturating_sub(1),
        configuration.w_total_length,
    );
    let payload = match channel.get_descriptor(hub_port, setup) {
        Some(value) => value,
        None => return Vec::new(),
    };
    let block = &payload[..payload.len().min(total_length)];

    let mut descriptors = Vec::new();
    let mut offset = 0;
    while offset + COMMON_DESCRIPTOR_LENGTH < total_length {
        if offset + COMMON_DESCRIPTOR_LENGTH > block.len() {
            break;
        }
        let b_length = block[offset] as usize;
        let b_descriptor_type = block[offset + 1];
        if b_length == 0 || offset + b_length > total_length || offset + b_length > block.len() {
            break;
        }
        if b_descriptor_type == USB_INTERFACE_DESCRIPTOR_TYPE {
            if b_length != INTERFACE_DESCRIPTOR_LENGTH {
                break;
            }
            if let Some(descriptor) =
                InterfaceDescriptor::decode(&block[offset..offset + INTERFACE_DESCRIPTOR_LENGTH])
            {
                if descriptor.b_interface_number == target_interface_number {
                    descriptors.push(descriptor);
                }
            }
        }
        offset += b_length;
    }
    descriptors
}

/// Resolves the interface string of the target interface: collects its alternate settings, picks
/// the requested alternate setting (or the first setting when unknown) and requests the string
/// descriptor it names.
///
/// An unknown interface number targets interface zero, the only interface of a single-interface
/// device.
pub fn request_interface_string<C: HubControlChannel>(
    channel: &C,
    hub_port: u32,
    configuration: &ConfigurationDescriptor,
    interface_number: Option<u8>,
    alternate_setting: Option<u8>,
) -> Option<String> {
    let target_interface_number = interface_number.unwrap_or(0);
    let descriptors =
        request_interface_descriptors(channel, hub_port, configuration, target_interface_number);
    if let Some(setting) = alternate_setting {
        for descriptor in &descriptors {
            if descriptor.b_alternate_setting == setting {
                return request_string_descriptor(channel, hub_port, descriptor.i_interface);
            }
        }
    }
    // there is usually a single alternate setting; use the first one when the target setting is
    // unknown or absent
    descriptors
        .first()
        .and_then(|descriptor| request_string_descriptor(channel, hub_port, descriptor.i_interface))
}
