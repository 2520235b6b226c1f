//! The windows implementation: serial port discovery over SetupAPI, device tree access over
//! CfgMgr32 and hub control channels over DeviceIoControl.

use crate::defer;
use crate::device_property::{
    decode_property_buffer, DevicePropertyKey, DevicePropertyValue,
    DEVPKEY_DEVICE_BUS_REPORTED_DEVICE_DESC, DEVPROP_TYPE_STRING, DEVPROP_TYPE_STRING_LIST,
    DEVPROP_TYPE_UINT32,
};
use crate::device_tree::{DevInst, DeviceTree};
use crate::enums::EnumerateOption;
use crate::errors::EnumerateError;
use crate::hub_query::{resolve_usb_identity, UsbHostAccess};
use crate::serial_port_info::SerialPortInfo;
use crate::usb_fallback::apply_usb_info_from_hardware_id;
use crate::usb_descriptors::{
    encode_connection_request, encode_descriptor_request, HubControlChannel, SetupPacket,
    DESCRIPTOR_REQUEST_HEADER_LENGTH,
};
use crate::win32_utils;
use std::ffi::c_void;
use tracing::debug;
use windows::Win32::Devices::DeviceAndDriverInstallation::{DIGCF_DEVICEINTERFACE, DIGCF_PRESENT};
use windows::Win32::Foundation::{
    ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_DATA, ERROR_NOT_FOUND, ERROR_NO_MORE_ITEMS,
};
use windows_sys::{
    core::GUID,
    Win32::Devices::DeviceAndDriverInstallation::{
        CM_Get_DevNode_PropertyW, CM_Get_Device_IDW, CM_Get_Device_ID_Size, CM_Get_Parent,
        SetupDiClassGuidsFromNameW, SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo,
        SetupDiGetClassDevsW, SetupDiGetDeviceInstanceIdW, SetupDiGetDevicePropertyW,
        SetupDiGetDeviceRegistryPropertyW, SetupDiOpenDevRegKey, CR_BUFFER_SMALL, CR_SUCCESS,
        DICS_FLAG_GLOBAL, DIREG_DEV, HDEVINFO, SPDRP_FRIENDLYNAME, SPDRP_HARDWAREID, SPDRP_MFG,
        SP_DEVINFO_DATA,
    },
    Win32::Devices::Usb::{
        GUID_DEVINTERFACE_USB_HUB, IOCTL_USB_GET_DESCRIPTOR_FROM_NODE_CONNECTION,
        IOCTL_USB_GET_NODE_CONNECTION_INFORMATION_EX,
    },
    Win32::Foundation::{CloseHandle, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE},
    Win32::Storage::FileSystem::{CreateFileW, FILE_SHARE_WRITE, OPEN_EXISTING},
    Win32::System::Registry::{
        RegCloseKey, RegQueryValueExW, HKEY, KEY_READ, REG_DWORD, REG_MULTI_SZ, REG_SZ,
    },
    Win32::System::IO::DeviceIoControl,
};

// so far only one guid has been seen per class name, so a small fixed capacity is plenty
const CLASS_GUID_LIST_CAPACITY: usize = 8;

pub struct SerialPortEnumerator {}
//
impl SerialPortEnumerator {
    pub fn enumerate_present_ports() -> Result<Vec<SerialPortInfo>, EnumerateError> {
        SerialPortEnumerator::enumerate_present_ports_with_options(Vec::new())
    }
    //
    pub fn enumerate_present_ports_with_options(
        options: Vec<EnumerateOption>,
    ) -> Result<Vec<SerialPortInfo>, EnumerateError> {
        let mut result = Vec::<SerialPortInfo>::new();
        for port in SerialPortEnumerator::iter_present_ports(options)? {
            // a fatal error discards any partially-collected results
            result.push(port?);
        }
        Ok(result)
    }
    //
    /// Returns a lazy iterator over the present serial ports.  A fatal error is yielded once, in
    /// sequence, and fuses the iterator.
    pub fn iter_present_ports(
        options: Vec<EnumerateOption>,
    ) -> Result<SerialPortIter, EnumerateError> {
        let mut use_usb_iocontrol = true;
        for option in options {
            match option {
                EnumerateOption::WithoutUsbIoControl => {
                    use_usb_iocontrol = false;
                }
            }
        }

        // serial ports register under the "Ports" setup class; modems carry their own class
        let mut class_guids = resolve_class_guids_by_name("Ports")?;
        class_guids.extend(resolve_class_guids_by_name("Modem")?);

        let hub_nodes = if use_usb_iocontrol {
            Some(collect_hub_nodes()?)
        } else {
            None
        };

        Ok(SerialPortIter {
            class_guids,
            class_index: 0,
            current_set: None,
            device_index: 0,
            hub_nodes,
            failed: false,
        })
    }
}

pub struct SerialPortIter {
    class_guids: Vec<GUID>,
    class_index: usize,
    current_set: Option<DeviceInfoSet>,
    device_index: u32,
    // present when the hub DeviceIoControl path is enabled
    hub_nodes: Option<Vec<DevInst>>,
    failed: bool,
}

impl SerialPortIter {
    fn fail(&mut self, error: EnumerateError) -> EnumerateError {
        self.failed = true;
        self.current_set = None;
        error
    }
}

impl Iterator for SerialPortIter {
    type Item = Result<SerialPortInfo, EnumerateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if self.current_set.is_none() {
                if self.class_index >= self.class_guids.len() {
                    return None;
                }
                let class_guid = self.class_guids[self.class_index];
                // NOTE: DIGCF_PRESENT alone; adding DIGCF_DEVICEINTERFACE would miss CDC ports
                let device_info_set = unsafe {
                    SetupDiGetClassDevsW(
                        &class_guid,
                        std::ptr::null(),
                        std::ptr::null_mut(),
                        DIGCF_PRESENT.0,
                    )
                };
                if device_info_set as isize == INVALID_HANDLE_VALUE as isize {
                    let win32_error = win32_utils::get_last_error_as_win32_error();
                    return Some(Err(self.fail(EnumerateError::Win32Error(win32_error.0))));
                }
                self.current_set = Some(DeviceInfoSet(device_info_set));
                self.device_index = 0;
            }
            let device_info_set = match &self.current_set {
                Some(set) => set.0,
                None => continue,
            };

            let mut devinfo_data = empty_devinfo_data();
            let enum_device_info_result =
                unsafe { SetupDiEnumDeviceInfo(device_info_set, self.device_index, &mut devinfo_data) };
            if enum_device_info_result == 0 {
                let win32_error = win32_utils::get_last_error_as_win32_error();
                if win32_error == ERROR_NO_MORE_ITEMS {
                    // destroys the exhausted device info set and moves to the next class guid
                    self.current_set = None;
                    self.class_index += 1;
                    continue;
                }
                return Some(Err(self.fail(EnumerateError::Win32Error(win32_error.0))));
            }
            self.device_index += 1;

            let port_name = read_port_name(device_info_set, &mut devinfo_data);
            // the "Ports" class unfortunately also includes parallel ports
            if port_name.starts_with("LPT") {
                continue;
            }

            let hardware_id = match read_hardware_id(device_info_set, &mut devinfo_data) {
                Ok(value) => value,
                Err(error) => return Some(Err(self.fail(error))),
            };

            let mut info = SerialPortInfo::new(port_name, hardware_id.clone());

            let resolved = match &self.hub_nodes {
                Some(hub_nodes) => {
                    match resolve_usb_identity(
                        &CfgMgrDeviceTree,
                        &Win32UsbHost,
                        devinfo_data.DevInst,
                        &hardware_id,
                        hub_nodes,
                        &mut info,
                    ) {
                        Ok(value) => value,
                        Err(error) => return Some(Err(self.fail(error))),
                    }
                }
                None => false,
            };
            if !resolved {
                debug!(port_name = %info.port_name, "recovering usb metadata from driver properties");
                if let Err(error) =
                    apply_registry_usb_info(device_info_set, &mut devinfo_data, &hardware_id, &mut info)
                {
                    return Some(Err(self.fail(error)));
                }
            }

            return Some(Ok(info));
        }
    }
}

// owns a SetupAPI device info set; destroying it on drop keeps the iterator leak-free on every
// exit path
struct DeviceInfoSet(HDEVINFO);
//
impl Drop for DeviceInfoSet {
    fn drop(&mut self) {
        let destroy_result = unsafe { SetupDiDestroyDeviceInfoList(self.0) };
        debug_assert!(destroy_result != 0, "could not clean up the device info set");
    }
}

fn empty_devinfo_data() -> SP_DEVINFO_DATA {
    SP_DEVINFO_DATA {
        cbSize: std::mem::size_of::<SP_DEVINFO_DATA>() as u32,
        ClassGuid: GUID::from_u128(0),
        DevInst: 0,
        Reserved: 0,
    }
}

fn resolve_class_guids_by_name(class_name: &str) -> Result<Vec<GUID>, EnumerateError> {
    let class_name_as_utf16_chars = win32_utils::to_utf16_with_nul(class_name);

    let mut class_guid_list = [GUID::from_u128(0); CLASS_GUID_LIST_CAPACITY];
    let mut required_count: u32 = 0;
    let class_guids_from_name_result = unsafe {
        SetupDiClassGuidsFromNameW(
            class_name_as_utf16_chars.as_ptr(),
            class_guid_list.as_mut_ptr(),
            CLASS_GUID_LIST_CAPACITY as u32,
            &mut required_count,
        )
    };
    if class_guids_from_name_result == 0 {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        if win32_error == ERROR_INSUFFICIENT_BUFFER {
            return Err(EnumerateError::ClassGuidListOverflow);
        }
        return Err(EnumerateError::Win32Error(win32_error.0));
    }

    // a class name with no registered guids yields an empty list (and, later, no devices)
    Ok(class_guid_list[..(required_count as usize).min(CLASS_GUID_LIST_CAPACITY)].to_vec())
}

// collects the device nodes of all present usb hubs; any usb device is the child of one of these
fn collect_hub_nodes() -> Result<Vec<DevInst>, EnumerateError> {
    let device_info_set = unsafe {
        SetupDiGetClassDevsW(
            &GUID_DEVINTERFACE_USB_HUB,
            std::ptr::null(),
            std::ptr::null_mut(),
            (DIGCF_PRESENT | DIGCF_DEVICEINTERFACE).0,
        )
    };
    if device_info_set as isize == INVALID_HANDLE_VALUE as isize {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        return Err(EnumerateError::Win32Error(win32_error.0));
    }

    let mut hub_nodes = Vec::<DevInst>::new();
    {
        defer! {
            let destroy_device_info_set_result = unsafe { SetupDiDestroyDeviceInfoList(device_info_set) };
            debug_assert!(destroy_device_info_set_result != 0, "could not clean up the usb hub device info set");
        }

        for device_index in 0..u32::MAX {
            let mut devinfo_data = empty_devinfo_data();
            let enum_device_info_result =
                unsafe { SetupDiEnumDeviceInfo(device_info_set, device_index, &mut devinfo_data) };
            if enum_device_info_result == 0 {
                let win32_error = win32_utils::get_last_error_as_win32_error();
                if win32_error == ERROR_NO_MORE_ITEMS {
                    break;
                }
                return Err(EnumerateError::Win32Error(win32_error.0));
            }
            hub_nodes.push(devinfo_data.DevInst);
        }
    }

    Ok(hub_nodes)
}

// reads the "PortName" value out of the device's hardware registry key; a port without one
// yields an empty name
fn read_port_name(device_info_set: HDEVINFO, devinfo_data: &mut SP_DEVINFO_DATA) -> String {
    let device_registry_key = unsafe {
        SetupDiOpenDevRegKey(
            device_info_set,
            devinfo_data,
            DICS_FLAG_GLOBAL,
            0,
            DIREG_DEV,
            KEY_READ,
        )
    };
    if device_registry_key as isize == INVALID_HANDLE_VALUE as isize {
        return String::new();
    }

    let mut port_name = String::new();
    {
        defer! {
            let close_key_result = unsafe { RegCloseKey(device_registry_key) };
            debug_assert!(close_key_result == 0, "could not close the device registry key");
        }

        if let Some(value) = read_registry_string_value(device_registry_key, "PortName") {
            port_name = value;
        }
    }
    port_name
}

fn read_registry_string_value(registry_key: HKEY, value_name: &str) -> Option<String> {
    let value_name_as_utf16_chars = win32_utils::to_utf16_with_nul(value_name);

    let mut value_size: u32 = 0;
    let query_value_result = unsafe {
        RegQueryValueExW(
            registry_key,
            value_name_as_utf16_chars.as_ptr(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut value_size,
        )
    };
    if query_value_result != 0 || value_size == 0 || value_size % 2 != 0 {
        return None;
    }

    let mut value_buffer = vec![0u8; value_size as usize];
    let mut fetched_size = value_size;
    let query_value_result = unsafe {
        RegQueryValueExW(
            registry_key,
            value_name_as_utf16_chars.as_ptr(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            value_buffer.as_mut_ptr(),
            &mut fetched_size,
        )
    };
    if query_value_result != 0 || fetched_size != value_size {
        return None;
    }

    let value_as_utf16_chars: Vec<u16> = value_buffer
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Some(win32_utils::utf16_until_nul(&value_as_utf16_chars))
}

// prefers the device instance identifier (which carries the serial number suffix); falls back to
// the generic hardware id registry property
fn read_hardware_id(
    device_info_set: HDEVINFO,
    devinfo_data: &mut SP_DEVINFO_DATA,
) -> Result<String, EnumerateError> {
    if let Ok(instance_id) = get_device_instance_id(device_info_set, devinfo_data) {
        return Ok(instance_id);
    }

    match get_device_registry_property_value(device_info_set, devinfo_data, SPDRP_HARDWAREID)? {
        Some(DevicePropertyValue::String(value)) => Ok(value),
        Some(DevicePropertyValue::StringList(values)) => {
            Ok(values.into_iter().next().unwrap_or_default())
        }
        // a buffer-size race (or an id-less device) is tolerated; the port is still listed
        _ => Ok(String::new()),
    }
}

fn get_device_instance_id(
    device_info_set: HDEVINFO,
    devinfo_data: &mut SP_DEVINFO_DATA,
) -> Result<String, EnumerateError> {
    // get the size of the device instance id
    // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdigetdeviceinstanceidw
    let mut required_size: u32 = 0;
    let get_device_instance_id_result = unsafe {
        SetupDiGetDeviceInstanceIdW(
            device_info_set,
            devinfo_data,
            std::ptr::null_mut(),
            0,
            &mut required_size,
        )
    };
    if get_device_instance_id_result == 0 {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        if win32_error != ERROR_INSUFFICIENT_BUFFER {
            return Err(EnumerateError::Win32Error(win32_error.0));
        }
    }
    if required_size == 0 {
        return Err(EnumerateError::Win32Error(ERROR_INVALID_DATA.0));
    }

    // retrieve the device instance id
    let mut instance_id_as_utf16_chars = vec![0u16; required_size as usize];
    let get_device_instance_id_result = unsafe {
        SetupDiGetDeviceInstanceIdW(
            device_info_set,
            devinfo_data,
            instance_id_as_utf16_chars.as_mut_ptr(),
            required_size,
            std::ptr::null_mut(),
        )
    };
    if get_device_instance_id_result == 0 {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        return Err(EnumerateError::Win32Error(win32_error.0));
    }

    // the last utf-16 char must be the string's null terminator
    match instance_id_as_utf16_chars.split_last() {
        Some((0, contents)) => Ok(String::from_utf16(contents)?),
        _ => Err(EnumerateError::StringTerminationDecodingError),
    }
}

fn check_property_required_size_result(
    get_property_result: i32,
    required_size: u32,
) -> Result<(), EnumerateError> {
    if get_property_result == 0 {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        match win32_error {
            ERROR_INSUFFICIENT_BUFFER => {
                // this is the expected condition; we'll size our buffer to match required_size
            }
            _ => {
                return Err(EnumerateError::Win32Error(win32_error.0));
            }
        }
    } else {
        // we don't expect the operation to succeed with a null buffer (unless the property is
        // zero-length)
        debug_assert!(
            false,
            "property query succeeded, even though we passed it no buffer"
        );
        if required_size > 0 {
            return Err(EnumerateError::Win32Error(ERROR_INVALID_DATA.0));
        }
    }

    Ok(())
}

// reads a registry-backed device property (SPDRP_XXX); `Ok(None)` means the property size
// changed between the two query phases
fn get_device_registry_property_value(
    device_info_set: HDEVINFO,
    devinfo_data: &mut SP_DEVINFO_DATA,
    property: u32,
) -> Result<Option<DevicePropertyValue>, EnumerateError> {
    // get the type and size of the property
    // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdigetdeviceregistrypropertyw
    let mut property_registry_data_type: u32 = 0;
    let mut required_size: u32 = 0;
    let get_registry_property_result = unsafe {
        SetupDiGetDeviceRegistryPropertyW(
            device_info_set,
            devinfo_data,
            property,
            &mut property_registry_data_type,
            std::ptr::null_mut(),
            0,
            &mut required_size,
        )
    };
    check_property_required_size_result(get_registry_property_result, required_size)?;

    // retrieve the property value
    let mut property_buffer = vec![0u8; required_size as usize];
    let get_registry_property_result = unsafe {
        SetupDiGetDeviceRegistryPropertyW(
            device_info_set,
            devinfo_data,
            property,
            &mut property_registry_data_type,
            property_buffer.as_mut_ptr(),
            required_size,
            std::ptr::null_mut(),
        )
    };
    if get_registry_property_result == 0 {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        if win32_error == ERROR_INSUFFICIENT_BUFFER {
            // the property grew between the two phases; treat it as unavailable
            return Ok(None);
        }
        return Err(EnumerateError::Win32Error(win32_error.0));
    }

    // map the registry value type onto the equivalent devprop type
    let property_type = match property_registry_data_type {
        REG_DWORD => DEVPROP_TYPE_UINT32,
        REG_SZ => DEVPROP_TYPE_STRING,
        REG_MULTI_SZ => DEVPROP_TYPE_STRING_LIST,
        other => return Err(EnumerateError::UnsupportedPropertyType(other)),
    };
    decode_property_buffer(&property_buffer, property_type).map(Some)
}

// reads a devpropkey-addressed device instance property; `Ok(None)` means the device does not
// have the property
fn get_device_instance_property_value(
    device_info_set: HDEVINFO,
    devinfo_data: &mut SP_DEVINFO_DATA,
    property_key: DevicePropertyKey,
) -> Result<Option<DevicePropertyValue>, EnumerateError> {
    let property_key_as_devpropkey = property_key.to_devpropkey();

    // get the type and size of the property
    // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdigetdevicepropertyw
    let mut property_type: u32 = 0;
    let mut required_size: u32 = 0;
    let get_device_property_result = unsafe {
        SetupDiGetDevicePropertyW(
            device_info_set,
            devinfo_data,
            &property_key_as_devpropkey,
            &mut property_type,
            std::ptr::null_mut(),
            0,
            &mut required_size,
            0,
        )
    };
    if get_device_property_result == 0
        && win32_utils::get_last_error_as_win32_error() == ERROR_NOT_FOUND
    {
        return Ok(None);
    }
    check_property_required_size_result(get_device_property_result, required_size)?;

    // retrieve the property value
    let mut property_buffer = vec![0u8; required_size as usize];
    let get_device_property_result = unsafe {
        SetupDiGetDevicePropertyW(
            device_info_set,
            devinfo_data,
            &property_key_as_devpropkey,
            &mut property_type,
            property_buffer.as_mut_ptr(),
            required_size,
            std::ptr::null_mut(),
            0,
        )
    };
    if get_device_property_result == 0 {
        let win32_error = win32_utils::get_last_error_as_win32_error();
        if win32_error == ERROR_INSUFFICIENT_BUFFER {
            return Ok(None);
        }
        return Err(EnumerateError::Win32Error(win32_error.0));
    }

    decode_property_buffer(&property_buffer, property_type).map(Some)
}

// builds a more readable display identifier for usb-backed ports (matching the shape used on
// other platforms); other bus types keep the raw hardware id
fn apply_registry_usb_info(
    device_info_set: HDEVINFO,
    devinfo_data: &mut SP_DEVINFO_DATA,
    hardware_id: &str,
    info: &mut SerialPortInfo,
) -> Result<(), EnumerateError> {
    apply_usb_info_from_hardware_id(&CfgMgrDeviceTree, devinfo_data.DevInst, hardware_id, info)?;

    if let Some(value) = tolerate_win32_failure(get_device_registry_property_value(
        device_info_set,
        devinfo_data,
        SPDRP_MFG,
    ))? {
        info.manufacturer = value.as_string().map(str::to_string);
    }
    if let Some(value) = tolerate_win32_failure(get_device_registry_property_value(
        device_info_set,
        devinfo_data,
        SPDRP_FRIENDLYNAME,
    ))? {
        info.description = value.as_string().map(str::to_string);
    }
    if let Some(value) = tolerate_win32_failure(get_device_instance_property_value(
        device_info_set,
        devinfo_data,
        DEVPKEY_DEVICE_BUS_REPORTED_DEVICE_DESC,
    ))? {
        info.interface = value.as_string().map(str::to_string);
    }

    Ok(())
}

// the descriptive properties are optional; a device that fails to report one is still listed
fn tolerate_win32_failure(
    result: Result<Option<DevicePropertyValue>, EnumerateError>,
) -> Result<Option<DevicePropertyValue>, EnumerateError> {
    match result {
        Err(EnumerateError::Win32Error(_)) => Ok(None),
        other => other,
    }
}

/// Device tree access over the CfgMgr32 parent/property functions.
pub(crate) struct CfgMgrDeviceTree;
//
impl DeviceTree for CfgMgrDeviceTree {
    fn parent(&self, node: DevInst) -> Option<DevInst> {
        let mut parent_node: u32 = 0;
        let get_parent_result = unsafe { CM_Get_Parent(&mut parent_node, node, 0) };
        if get_parent_result != CR_SUCCESS {
            return None;
        }
        Some(parent_node)
    }

    fn instance_id(&self, node: DevInst) -> Option<String> {
        let mut required_length: u32 = 0;
        let get_id_size_result = unsafe { CM_Get_Device_ID_Size(&mut required_length, node, 0) };
        if get_id_size_result != CR_SUCCESS {
            return None;
        }
        // the reported length excludes the null terminator
        let mut instance_id_as_utf16_chars = vec![0u16; (required_length as usize) + 1];
        let get_id_result = unsafe {
            CM_Get_Device_IDW(
                node,
                instance_id_as_utf16_chars.as_mut_ptr(),
                instance_id_as_utf16_chars.len() as u32,
                0,
            )
        };
        if get_id_result != CR_SUCCESS {
            return None;
        }
        Some(win32_utils::utf16_until_nul(&instance_id_as_utf16_chars))
    }

    fn node_property(
        &self,
        node: DevInst,
        key: DevicePropertyKey,
    ) -> Result<Option<DevicePropertyValue>, EnumerateError> {
        let property_key_as_devpropkey = key.to_devpropkey();

        // get the type and size of the property
        // see: https://learn.microsoft.com/en-us/windows/win32/api/cfgmgr32/nf-cfgmgr32-cm_get_devnode_propertyw
        let mut property_type: u32 = 0;
        let mut required_size: u32 = 0;
        let get_property_result = unsafe {
            CM_Get_DevNode_PropertyW(
                node,
                &property_key_as_devpropkey,
                &mut property_type,
                std::ptr::null_mut(),
                &mut required_size,
                0,
            )
        };
        if get_property_result != CR_SUCCESS && get_property_result != CR_BUFFER_SMALL {
            return Ok(None);
        }
        if required_size == 0 {
            return Ok(None);
        }

        // retrieve the property value
        let mut property_buffer = vec![0u8; required_size as usize];
        let mut fetched_size = required_size;
        let get_property_result = unsafe {
            CM_Get_DevNode_PropertyW(
                node,
                &property_key_as_devpropkey,
                &mut property_type,
                property_buffer.as_mut_ptr(),
                &mut fetched_size,
                0,
            )
        };
        if get_property_result != CR_SUCCESS || fetched_size != required_size {
            return Ok(None);
        }

        match decode_property_buffer(&property_buffer, property_type) {
            Ok(value) => Ok(Some(value)),
            // a truly unknown property type is a programming-model gap, not a per-device condition
            Err(error @ EnumerateError::UnsupportedPropertyType(_)) => Err(error),
            Err(_) => Ok(None),
        }
    }
}

/// Usb host access over CreateFileW-opened hub device interfaces.
pub(crate) struct Win32UsbHost;
//
impl UsbHostAccess for Win32UsbHost {
    type Channel = HubDeviceChannel;

    fn open_hub(&self, hub_device_path: &str) -> Option<HubDeviceChannel> {
        let hub_device_path_as_utf16_chars = win32_utils::to_utf16_with_nul(hub_device_path);
        let hub_handle = unsafe {
            CreateFileW(
                hub_device_path_as_utf16_chars.as_ptr(),
                GENERIC_WRITE,
                FILE_SHARE_WRITE,
                std::ptr::null_mut(),
                OPEN_EXISTING,
                0,
                std::ptr::null_mut(),
            )
        };
        if hub_handle as isize == INVALID_HANDLE_VALUE as isize {
            return None;
        }
        Some(HubDeviceChannel { hub_handle })
    }
}

pub(crate) struct HubDeviceChannel {
    hub_handle: HANDLE,
}
//
impl HubControlChannel for HubDeviceChannel {
    fn get_descriptor(&self, hub_port: u32, setup: SetupPacket) -> Option<Vec<u8>> {
        let mut request_buffer = encode_descriptor_request(hub_port, setup);
        let mut bytes_returned: u32 = 0;
        let io_control_result = unsafe {
            DeviceIoControl(
                self.hub_handle,
                IOCTL_USB_GET_DESCRIPTOR_FROM_NODE_CONNECTION,
                request_buffer.as_ptr() as *const c_void,
                request_buffer.len() as u32,
                request_buffer.as_mut_ptr() as *mut c_void,
                request_buffer.len() as u32,
                &mut bytes_returned,
                std::ptr::null_mut(),
            )
        };
        if io_control_result == 0 {
            return None;
        }
        // the descriptor payload follows the request header in the output buffer
        let payload_end = (bytes_returned as usize).min(request_buffer.len());
        if payload_end <= DESCRIPTOR_REQUEST_HEADER_LENGTH {
            return None;
        }
        Some(request_buffer[DESCRIPTOR_REQUEST_HEADER_LENGTH..payload_end].to_vec())
    }

    fn get_connection_info(&self, hub_port: u32) -> Option<Vec<u8>> {
        let mut request_buffer = encode_connection_request(hub_port);
        let mut bytes_returned: u32 = 0;
        let io_control_result = unsafe {
            DeviceIoControl(
                self.hub_handle,
                IOCTL_USB_GET_NODE_CONNECTION_INFORMATION_EX,
                request_buffer.as_ptr() as *const c_void,
                request_buffer.len() as u32,
                request_buffer.as_mut_ptr() as *mut c_void,
                request_buffer.len() as u32,
                &mut bytes_returned,
                std::ptr::null_mut(),
            )
        };
        if io_control_result == 0 {
            return None;
        }
        Some(request_buffer.to_vec())
    }
}
//
impl Drop for HubDeviceChannel {
    fn drop(&mut self) {
        let close_handle_result = unsafe { CloseHandle(self.hub_handle) };
        debug_assert!(close_handle_result != 0, "could not close the usb hub handle");
    }
}
