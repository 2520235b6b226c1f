use crate::errors::EnumerateError;
use crate::uuid::Uuid;

// DEVPROP type codes (see devpropdef.h); these also describe the registry value types we map into
// the same decoded representation
pub const DEVPROP_TYPE_UINT32: u32 = 0x0000_0007;
pub const DEVPROP_TYPE_STRING: u32 = 0x0000_0012;
pub const DEVPROP_TYPEMOD_LIST: u32 = 0x0000_2000;
pub const DEVPROP_TYPE_STRING_LIST: u32 = DEVPROP_TYPE_STRING | DEVPROP_TYPEMOD_LIST;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DevicePropertyKey {
    pub fmtid: Uuid,
    pub pid: u32,
}

impl DevicePropertyKey {
    #[cfg(target_os = "windows")]
    pub fn to_devpropkey(&self) -> windows_sys::Win32::Devices::Properties::DEVPROPKEY {
        windows_sys::Win32::Devices::Properties::DEVPROPKEY {
            fmtid: windows_sys::core::GUID {
                data1: self.fmtid.data1,
                data2: self.fmtid.data2,
                data3: self.fmtid.data3,
                data4: self.fmtid.data4,
            },
            pid: self.pid,
        }
    }
}

#[cfg(target_os = "windows")]
impl From<windows_sys::Win32::Devices::Properties::DEVPROPKEY> for DevicePropertyKey {
    fn from(item: windows_sys::Win32::Devices::Properties::DEVPROPKEY) -> Self {
        DevicePropertyKey {
            fmtid: Uuid {
                data1: item.fmtid.data1,
                data2: item.fmtid.data2,
                data3: item.fmtid.data3,
                data4: item.fmtid.data4,
            },
            pid: item.pid,
        }
    }
}

// DEVPKEY_Device_Address: the downstream port number on the parent usb hub
pub const DEVPKEY_DEVICE_ADDRESS: DevicePropertyKey = DevicePropertyKey {
    fmtid: Uuid::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    pid: 30,
};
// DEVPKEY_Device_BusReportedDeviceDesc: the device description reported by the bus driver
pub const DEVPKEY_DEVICE_BUS_REPORTED_DEVICE_DESC: DevicePropertyKey = DevicePropertyKey {
    fmtid: Uuid::from_u128(0x540b947e_8b40_45bc_a8a2_6a0b894cbda2),
    pid: 4,
};
pub const DEVPKEY_DEVICE_FRIENDLY_NAME: DevicePropertyKey = DevicePropertyKey {
    fmtid: Uuid::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    pid: 14,
};
pub const DEVPKEY_DEVICE_LOCATION_PATHS: DevicePropertyKey = DevicePropertyKey {
    fmtid: Uuid::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    pid: 37,
};

#[derive(Clone, Debug, PartialEq)]
pub enum DevicePropertyValue {
    String(String),
    StringList(Vec<String>),
    UInt32(u32),
}

impl DevicePropertyValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DevicePropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            DevicePropertyValue::StringList(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            DevicePropertyValue::UInt32(value) => Some(*value),
            _ => None,
        }
    }
}

/// Decodes a raw property buffer (as returned by the property stores of SetupAPI, CfgMgr32 and the
/// registry) into a typed value, using the DEVPROP type code reported alongside the buffer.
pub fn decode_property_buffer(
    property_buffer: &[u8],
    property_type: u32,
) -> Result<DevicePropertyValue, EnumerateError> {
    match property_type {
        DEVPROP_TYPE_UINT32 => {
            if property_buffer.len() != std::mem::size_of::<u32>() {
                return Err(EnumerateError::InvalidPropertyData);
            }
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(property_buffer);
            Ok(DevicePropertyValue::UInt32(u32::from_le_bytes(bytes)))
        }
        DEVPROP_TYPE_STRING => {
            let utf16_chars = match utf16_chars_from_bytes(property_buffer) {
                Some(value) => value,
                None => return Err(EnumerateError::InvalidPropertyData),
            };
            // the string must be non-empty and terminated by a null char
            match utf16_chars.split_last() {
                Some((0, contents)) => Ok(DevicePropertyValue::String(String::from_utf16(contents)?)),
                _ => Err(EnumerateError::StringTerminationDecodingError),
            }
        }
        DEVPROP_TYPE_STRING_LIST => {
            let mut utf16_chars = match utf16_chars_from_bytes(property_buffer) {
                Some(value) => value,
                None => return Err(EnumerateError::InvalidPropertyData),
            };
            // a string list is a sequence of null-terminated strings followed by a final
            // (list-terminating) null char
            match utf16_chars.pop() {
                Some(0) => {}
                _ => return Err(EnumerateError::StringTerminationDecodingError),
            }
            let mut values = Vec::new();
            for utf16_string in utf16_chars.split(|&utf16_char| utf16_char == 0) {
                if utf16_string.is_empty() {
                    continue;
                }
                values.push(String::from_utf16(utf16_string)?);
            }
            Ok(DevicePropertyValue::StringList(values))
        }
        _ => Err(EnumerateError::UnsupportedPropertyType(property_type)),
    }
}

fn utf16_chars_from_bytes(buffer: &[u8]) -> Option<Vec<u16>> {
    if buffer.len() % 2 != 0 {
        return None;
    }
    Some(
        buffer
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16_bytes(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn decodes_uint32_property() {
        let decoded = decode_property_buffer(&21u32.to_le_bytes(), DEVPROP_TYPE_UINT32);
        assert!(matches!(decoded, Ok(DevicePropertyValue::UInt32(21))));
    }

    #[test]
    fn uint32_property_of_wrong_size_is_invalid() {
        let decoded = decode_property_buffer(&[1, 0], DEVPROP_TYPE_UINT32);
        assert!(matches!(decoded, Err(EnumerateError::InvalidPropertyData)));
    }

    #[test]
    fn decodes_null_terminated_string_property() {
        let decoded = decode_property_buffer(&utf16_bytes("COM7\0"), DEVPROP_TYPE_STRING);
        assert_eq!(
            decoded.ok(),
            Some(DevicePropertyValue::String("COM7".to_string()))
        );
    }

    #[test]
    fn unterminated_string_property_is_rejected() {
        let decoded = decode_property_buffer(&utf16_bytes("COM7"), DEVPROP_TYPE_STRING);
        assert!(matches!(
            decoded,
            Err(EnumerateError::StringTerminationDecodingError)
        ));
    }

    #[test]
    fn decodes_string_list_property() {
        let decoded = decode_property_buffer(
            &utf16_bytes("PCIROOT(0)#PCI(1400)\0ACPI(_SB_)\0\0"),
            DEVPROP_TYPE_STRING_LIST,
        );
        assert_eq!(
            decoded.ok(),
            Some(DevicePropertyValue::StringList(vec![
                "PCIROOT(0)#PCI(1400)".to_string(),
                "ACPI(_SB_)".to_string(),
            ]))
        );
    }

    #[test]
    fn unknown_property_type_is_reported_as_unsupported() {
        let decoded = decode_property_buffer(&[0u8; 16], 0x0000_0010);
        assert!(matches!(
            decoded,
            Err(EnumerateError::UnsupportedPropertyType(0x0000_0010))
        ));
    }
}
