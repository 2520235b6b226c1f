//! Enumeration of the serial (COM) ports present on a windows machine, with usb metadata
//! (VID/PID, serial number, strings, bus location) recovered for usb-backed ports.
//!
//! The descriptor codec, the hardware-id and location-path parsers and the device-tree policies
//! are portable and fully testable off-windows; only the SetupAPI/CfgMgr32/DeviceIoControl
//! plumbing is windows-gated.

pub mod defer_block;

mod device_property;
pub use device_property::{
    decode_property_buffer, DevicePropertyKey, DevicePropertyValue, DEVPKEY_DEVICE_ADDRESS,
    DEVPKEY_DEVICE_BUS_REPORTED_DEVICE_DESC, DEVPKEY_DEVICE_FRIENDLY_NAME,
    DEVPKEY_DEVICE_LOCATION_PATHS, DEVPROP_TYPE_STRING, DEVPROP_TYPE_STRING_LIST,
    DEVPROP_TYPE_UINT32,
};

mod device_tree;
pub use device_tree::{
    find_ancestor_matching, recover_serial_number, AncestorMatch, DevInst, DeviceTree,
    MAX_USB_DEVICE_TREE_TRAVERSAL_DEPTH,
};

mod enums;
pub use enums::EnumerateOption;

mod errors;
pub use errors::EnumerateError;

mod hardware_id;
pub use hardware_id::{
    is_plausible_serial, parse_hardware_id, parse_interface_number, HardwareIdMatch,
};

mod hub_query;
pub use hub_query::{
    build_hub_device_path, resolve_usb_identity, UsbHostAccess, GUID_DEVINTERFACE_USB_HUB,
};

mod location_paths;
pub use location_paths::{build_location_string, parse_usbmi_interface, render_location_from_paths};

mod serial_port_info;
pub use serial_port_info::SerialPortInfo;

mod usb_descriptors;
pub use usb_descriptors::{
    decode_string_descriptor, encode_connection_request, encode_descriptor_request,
    request_configuration_descriptor, request_device_descriptor, request_interface_descriptors,
    request_interface_string, request_string_descriptor, ConfigurationDescriptor,
    DeviceDescriptor, HubControlChannel, InterfaceDescriptor, SetupPacket, UsbConnectionInfo,
};

mod usb_fallback;
pub use usb_fallback::apply_usb_info_from_hardware_id;

mod uuid;
pub use uuid::Uuid;

#[cfg(target_os = "windows")]
mod win32_utils;

#[cfg(target_os = "windows")]
mod port_enumerator;
#[cfg(target_os = "windows")]
pub use port_enumerator::{SerialPortEnumerator, SerialPortIter};

#[cfg(test)]
mod test_support;
