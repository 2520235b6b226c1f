//! Recovery of full usb metadata for a serial port by querying the usb hub the backing device is
//! attached to.
//!
//! A serial port node hangs (possibly through intermediate child nodes) off a usb device, which
//! is itself attached to a downstream port of a usb hub.  Opening the hub's device interface
//! allows node-connection requests to be issued for that port, which yield the device and string
//! descriptors the device itself reports.

use crate::device_property::{
    DEVPKEY_DEVICE_ADDRESS, DEVPKEY_DEVICE_BUS_REPORTED_DEVICE_DESC, DEVPKEY_DEVICE_FRIENDLY_NAME,
    DEVPKEY_DEVICE_LOCATION_PATHS,
};
use crate::device_tree::{
    find_ancestor_matching, DevInst, DeviceTree, MAX_USB_DEVICE_TREE_TRAVERSAL_DEPTH,
};
use crate::errors::EnumerateError;
use crate::hardware_id::parse_interface_number;
use crate::location_paths::{build_location_string, parse_usbmi_interface};
use crate::serial_port_info::SerialPortInfo;
use crate::usb_descriptors::{
    request_configuration_descriptor, request_device_descriptor, request_interface_string,
    request_string_descriptor, HubControlChannel, UsbConnectionInfo,
};
use crate::uuid::Uuid;
use tracing::debug;

pub const GUID_DEVINTERFACE_USB_HUB: Uuid = Uuid::from_u128(0xf18a0e88_c30c_11d0_8815_00a0c906bed8);

/// Access to the usb hubs of the local machine.
pub trait UsbHostAccess {
    type Channel: HubControlChannel;

    /// Opens a control channel to the hub behind the given device interface path; the channel
    /// releases the hub handle when dropped.
    fn open_hub(&self, hub_device_path: &str) -> Option<Self::Channel>;
}

/// Builds the device interface path of a usb hub from its device instance identifier.
pub fn build_hub_device_path(hub_instance_id: &str) -> String {
    format!(
        "\\\\?\\{}#{{{}}}",
        hub_instance_id.replace('\\', "#"),
        GUID_DEVINTERFACE_USB_HUB,
    )
}

/// Populates `info` with the usb metadata of the device backing a serial port, recovered by
/// querying the usb hub the device is attached to.
///
/// Returns `Ok(false)` when the port turns out not to be reachable this way (no hub ancestor,
/// the hub cannot be opened, the device answers no descriptor requests, ...); the caller then
/// falls back to registry-derived metadata.  Every opened hub channel is released before
/// returning, on success and failure alike.
pub fn resolve_usb_identity<T, H>(
    tree: &T,
    host: &H,
    device_node: DevInst,
    hardware_id: &str,
    known_hub_nodes: &[DevInst],
    info: &mut SerialPortInfo,
) -> Result<bool, EnumerateError>
where
    T: DeviceTree,
    H: UsbHostAccess,
{
    // walk up from the port node until a known hub appears; the node directly beneath the hub is
    // the usb device itself
    let matched = match find_ancestor_matching(
        tree,
        device_node,
        MAX_USB_DEVICE_TREE_TRAVERSAL_DEPTH,
        |node| known_hub_nodes.contains(&node),
    ) {
        Some(value) => value,
        None => {
            debug!(device_node, "no usb hub ancestor within the traversal bound");
            return Ok(false);
        }
    };
    let hub_node = matched.ancestor;
    let usb_device_node = matched.child_of_ancestor;

    // the downstream hub port the usb device is connected to
    let hub_port = match tree.node_property(usb_device_node, DEVPKEY_DEVICE_ADDRESS)? {
        Some(value) => match value.as_u32() {
            Some(port) => port,
            None => return Ok(false),
        },
        None => return Ok(false),
    };

    let hub_instance_id = match tree.instance_id(hub_node) {
        Some(value) => value,
        None => return Ok(false),
    };
    let channel = match host.open_hub(&build_hub_device_path(&hub_instance_id)) {
        Some(value) => value,
        None => {
            debug!(hub_node, "could not open a control channel to the usb hub");
            return Ok(false);
        }
    };
    // the channel is dropped (and the hub handle released) on every path below

    // connection info carries the device descriptor plus the active configuration; when that
    // query fails, fall back to requesting the bare device descriptor
    let connection_info = channel
        .get_connection_info(hub_port)
        .and_then(|buffer| UsbConnectionInfo::decode(&buffer));
    let device_descriptor = match &connection_info {
        Some(connection_info) => connection_info.device_descriptor,
        None => match request_device_descriptor(&channel, hub_port) {
            Some(value) => value,
            None => {
                debug!(hub_port, "device answers no descriptor requests");
                return Ok(false);
            }
        },
    };

    info.vid = Some(device_descriptor.id_vendor);
    info.pid = Some(device_descriptor.id_product);
    info.product = request_string_descriptor(&channel, hub_port, device_descriptor.i_product);
    info.manufacturer =
        request_string_descriptor(&channel, hub_port, device_descriptor.i_manufacturer);
    info.serial_number =
        request_string_descriptor(&channel, hub_port, device_descriptor.i_serial_number);

    let configuration_value: Option<u8> = match &connection_info {
        Some(connection_info) => Some(connection_info.current_configuration_value),
        // mostly there is only one configuration, and its value is 1
        None if device_descriptor.b_num_configurations == 1 => Some(1),
        None => None,
    };

    // the interface number comes from the location paths when the property exists, and from the
    // hardware id otherwise
    let mut interface_number: Option<u8> = match tree
        .node_property(device_node, DEVPKEY_DEVICE_LOCATION_PATHS)?
    {
        Some(value) => value.as_string_list().and_then(parse_usbmi_interface),
        None => parse_interface_number(hardware_id),
    };

    match configuration_value {
        Some(configuration_value_known) => {
            match request_configuration_descriptor(
                &channel,
                hub_port,
                configuration_value_known.saturating_sub(1),
            ) {
                Some(configuration) => {
                    if configuration.b_num_interfaces == 1 {
                        // single-interface devices carry no composite suffix
                        interface_number = None;
                        info.interface =
                            request_interface_string(&channel, hub_port, &configuration, None, None);
                    } else if interface_number.is_some() {
                        info.interface = request_interface_string(
                            &channel,
                            hub_port,
                            &configuration,
                            interface_number,
                            None,
                        );
                    } else {
                        debug!(hub_port, "interface number of a composite device is unknown");
                        info.interface = bus_reported_description(tree, device_node)?;
                    }
                }
                None => {
                    info.interface = bus_reported_description(tree, device_node)?;
                }
            }
        }
        None => {
            // may be the same or a similar string as the interface descriptor's
            info.interface = bus_reported_description(tree, device_node)?;
        }
    }

    // the friendly name doubles as the description of last resort
    info.description = tree
        .node_property(device_node, DEVPKEY_DEVICE_FRIENDLY_NAME)?
        .and_then(|value| value.as_string().map(str::to_string));

    info.location =
        build_location_string(tree, usb_device_node, configuration_value, interface_number)?;
    info.apply_usb_info();

    Ok(true)
}

fn bus_reported_description<T: DeviceTree>(
    tree: &T,
    node: DevInst,
) -> Result<Option<String>, EnumerateError> {
    Ok(tree
        .node_property(node, DEVPKEY_DEVICE_BUS_REPORTED_DEVICE_DESC)?
        .and_then(|value| value.as_string().map(str::to_string)))
}
