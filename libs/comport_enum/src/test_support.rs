//! Shared in-memory doubles for the device tree and the usb host, plus raw descriptor builders.

use crate::device_property::{DevicePropertyKey, DevicePropertyValue};
use crate::device_tree::{DevInst, DeviceTree};
use crate::errors::EnumerateError;
use crate::hub_query::UsbHostAccess;
use crate::usb_descriptors::{
    ConfigurationDescriptor, HubControlChannel, SetupPacket, CONFIGURATION_DESCRIPTOR_LENGTH,
    CONNECTION_INFORMATION_LENGTH, DEVICE_DESCRIPTOR_LENGTH, INTERFACE_DESCRIPTOR_LENGTH,
    MAXIMUM_STRING_DESCRIPTOR_LENGTH, USB_CONFIGURATION_DESCRIPTOR_TYPE,
    USB_DEVICE_DESCRIPTOR_TYPE, USB_INTERFACE_DESCRIPTOR_TYPE, USB_STRING_DESCRIPTOR_TYPE,
};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
pub(crate) struct MockDeviceTree {
    parents: HashMap<DevInst, DevInst>,
    instance_ids: HashMap<DevInst, String>,
    properties: HashMap<(DevInst, DevicePropertyKey), DevicePropertyValue>,
}

impl MockDeviceTree {
    pub(crate) fn new() -> Self {
        MockDeviceTree::default()
    }

    pub(crate) fn add_parent_link(&mut self, child: DevInst, parent: DevInst) {
        self.parents.insert(child, parent);
    }

    pub(crate) fn add_instance_id(&mut self, node: DevInst, instance_id: &str) {
        self.instance_ids.insert(node, instance_id.to_string());
    }

    pub(crate) fn add_property(
        &mut self,
        node: DevInst,
        key: DevicePropertyKey,
        value: DevicePropertyValue,
    ) {
        self.properties.insert((node, key), value);
    }

    pub(crate) fn remove_property(&mut self, node: DevInst, key: DevicePropertyKey) {
        self.properties.remove(&(node, key));
    }
}

impl DeviceTree for MockDeviceTree {
    fn parent(&self, node: DevInst) -> Option<DevInst> {
        self.parents.get(&node).copied()
    }

    fn instance_id(&self, node: DevInst) -> Option<String> {
        self.instance_ids.get(&node).cloned()
    }

    fn node_property(
        &self,
        node: DevInst,
        key: DevicePropertyKey,
    ) -> Result<Option<DevicePropertyValue>, EnumerateError> {
        Ok(self.properties.get(&(node, key)).cloned())
    }
}

/// The scripted responses of one mock hub, shared between the host, its open channels and the
/// test body (so that open/close balance stays observable after the channel is dropped).
#[derive(Default)]
pub(crate) struct MockHubState {
    // keyed by (hub port, setup wValue, setup wLength)
    descriptors: HashMap<(u32, u16, u16), Vec<u8>>,
    connection_info: HashMap<u32, Vec<u8>>,
    open_count: Cell<usize>,
    close_count: Cell<usize>,
}

impl MockHubState {
    pub(crate) fn new() -> Self {
        MockHubState::default()
    }

    pub(crate) fn add_device_descriptor(&mut self, hub_port: u32, bytes: Vec<u8>) {
        let w_value = (USB_DEVICE_DESCRIPTOR_TYPE as u16) << 8;
        self.descriptors
            .insert((hub_port, w_value, DEVICE_DESCRIPTOR_LENGTH as u16), bytes);
    }

    pub(crate) fn add_string(&mut self, hub_port: u32, string_index: u8, text: &str) {
        let w_value = ((USB_STRING_DESCRIPTOR_TYPE as u16) << 8) | (string_index as u16);
        self.descriptors.insert(
            (hub_port, w_value, MAXIMUM_STRING_DESCRIPTOR_LENGTH),
            string_descriptor_bytes(text),
        );
    }

    pub(crate) fn add_connection_info(&mut self, hub_port: u32, bytes: Vec<u8>) {
        self.connection_info.insert(hub_port, bytes);
    }

    /// Registers both the 9-byte configuration header request and the full-descriptor request
    /// for one configuration, and returns the decoded header.
    pub(crate) fn add_configuration(
        &mut self,
        hub_port: u32,
        num_interfaces: u8,
        configuration_value: u8,
        trailer: &[u8],
    ) -> ConfigurationDescriptor {
        let w_total_length = (CONFIGURATION_DESCRIPTOR_LENGTH + trailer.len()) as u16;
        let header = configuration_header_bytes(w_total_length, num_interfaces, configuration_value);
        let w_value = ((USB_CONFIGURATION_DESCRIPTOR_TYPE as u16) << 8)
            | (configuration_value.saturating_sub(1) as u16);
        self.descriptors.insert(
            (hub_port, w_value, CONFIGURATION_DESCRIPTOR_LENGTH as u16),
            header.clone(),
        );
        self.descriptors
            .insert((hub_port, w_value, w_total_length), [header.clone(), trailer.to_vec()].concat());
        ConfigurationDescriptor::decode(&header)
            .unwrap_or_else(|| panic!("mock configuration header must decode"))
    }
}

pub(crate) struct MockHubChannel {
    state: Rc<MockHubState>,
}

impl MockHubChannel {
    pub(crate) fn new(state: Rc<MockHubState>) -> Self {
        MockHubChannel { state }
    }
}

impl HubControlChannel for MockHubChannel {
    fn get_descriptor(&self, hub_port: u32, setup: SetupPacket) -> Option<Vec<u8>> {
        self.state
            .descriptors
            .get(&(hub_port, setup.w_value, setup.w_length))
            .cloned()
    }

    fn get_connection_info(&self, hub_port: u32) -> Option<Vec<u8>> {
        self.state.connection_info.get(&hub_port).cloned()
    }
}

impl Drop for MockHubChannel {
    fn drop(&mut self) {
        self.state.close_count.set(self.state.close_count.get() + 1);
    }
}

pub(crate) struct MockUsbHost {
    state: Rc<MockHubState>,
    pub(crate) refuse_open: bool,
}

impl MockUsbHost {
    pub(crate) fn new(state: Rc<MockHubState>) -> Self {
        MockUsbHost {
            state,
            refuse_open: false,
        }
    }

    pub(crate) fn open_count(&self) -> usize {
        self.state.open_count.get()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.close_count.get()
    }
}

impl UsbHostAccess for MockUsbHost {
    type Channel = MockHubChannel;

    fn open_hub(&self, hub_device_path: &str) -> Option<MockHubChannel> {
        debug_assert!(hub_device_path.starts_with(r"\\?\"));
        if self.refuse_open {
            return None;
        }
        self.state.open_count.set(self.state.open_count.get() + 1);
        Some(MockHubChannel::new(Rc::clone(&self.state)))
    }
}

pub(crate) fn device_descriptor_bytes(
    id_vendor: u16,
    id_product: u16,
    i_manufacturer: u8,
    i_product: u8,
    i_serial_number: u8,
    b_num_configurations: u8,
) -> Vec<u8> {
    let mut bytes = vec![0u8; DEVICE_DESCRIPTOR_LENGTH];
    bytes[0] = DEVICE_DESCRIPTOR_LENGTH as u8;
    bytes[1] = USB_DEVICE_DESCRIPTOR_TYPE;
    bytes[2..4].copy_from_slice(&0x0200u16.to_le_bytes()); // bcdUSB 2.0
    bytes[7] = 64; // bMaxPacketSize0
    bytes[8..10].copy_from_slice(&id_vendor.to_le_bytes());
    bytes[10..12].copy_from_slice(&id_product.to_le_bytes());
    bytes[14] = i_manufacturer;
    bytes[15] = i_product;
    bytes[16] = i_serial_number;
    bytes[17] = b_num_configurations;
    bytes
}

pub(crate) fn configuration_header_bytes(
    w_total_length: u16,
    b_num_interfaces: u8,
    b_configuration_value: u8,
) -> Vec<u8> {
    let mut bytes = vec![0u8; CONFIGURATION_DESCRIPTOR_LENGTH];
    bytes[0] = CONFIGURATION_DESCRIPTOR_LENGTH as u8;
    bytes[1] = USB_CONFIGURATION_DESCRIPTOR_TYPE;
    bytes[2..4].copy_from_slice(&w_total_length.to_le_bytes());
    bytes[4] = b_num_interfaces;
    bytes[5] = b_configuration_value;
    bytes[7] = 0x80; // bus powered
    bytes[8] = 50; // 100 mA
    bytes
}

pub(crate) fn interface_descriptor_bytes(
    b_interface_number: u8,
    b_alternate_setting: u8,
    i_interface: u8,
) -> Vec<u8> {
    let mut bytes = vec![0u8; INTERFACE_DESCRIPTOR_LENGTH];
    bytes[0] = INTERFACE_DESCRIPTOR_LENGTH as u8;
    bytes[1] = USB_INTERFACE_DESCRIPTOR_TYPE;
    bytes[2] = b_interface_number;
    bytes[3] = b_alternate_setting;
    bytes[8] = i_interface;
    bytes
}

pub(crate) fn string_descriptor_bytes(text: &str) -> Vec<u8> {
    let utf16_bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let mut bytes = Vec::with_capacity(2 + utf16_bytes.len());
    bytes.push((2 + utf16_bytes.len()) as u8);
    bytes.push(USB_STRING_DESCRIPTOR_TYPE);
    bytes.extend_from_slice(&utf16_bytes);
    bytes
}

pub(crate) fn connection_info_bytes(
    device_descriptor: &[u8],
    current_configuration_value: u8,
) -> Vec<u8> {
    let mut bytes = vec![0u8; CONNECTION_INFORMATION_LENGTH];
    bytes[4..4 + DEVICE_DESCRIPTOR_LENGTH].copy_from_slice(device_descriptor);
    bytes[22] = current_configuration_value;
    bytes[31..35].copy_from_slice(&1u32.to_le_bytes()); // DeviceConnected
    bytes
}

/// Builds a mock hub (on port 1) serving the given configuration and returns it together with
/// the decoded configuration header.
pub(crate) fn configuration_trailer_bytes(
    b_num_interfaces: u8,
    b_configuration_value: u8,
    trailer: &[u8],
) -> (MockHubState, ConfigurationDescriptor) {
    let mut state = MockHubState::new();
    let configuration = state.add_configuration(1, b_num_interfaces, b_configuration_value, trailer);
    (state, configuration)
}
