//! Synthesis of usb metadata from a hardware id string alone, for ports where the hub query
//! path is unavailable or not applicable.

use crate::device_tree::{recover_serial_number, DevInst, DeviceTree};
use crate::errors::EnumerateError;
use crate::hardware_id::{is_plausible_serial, parse_hardware_id};
use crate::location_paths::build_location_string;
use crate::serial_port_info::SerialPortInfo;

/// Populates `info` with the usb metadata its hardware id carries: VID/PID and serial number
/// from the id string (walking up to an ancestor node when a composite device carries an
/// ephemeral id instead of its serial), and the location from the location-paths property.
/// Ports on other buses keep their raw hardware id as the display identifier.
pub fn apply_usb_info_from_hardware_id<T: DeviceTree>(
    tree: &T,
    node: DevInst,
    hardware_id: &str,
    info: &mut SerialPortInfo,
) -> Result<(), EnumerateError> {
    if hardware_id.starts_with("USB") {
        let mut interface_number: Option<u8> = None;
        if let Some(parsed) = parse_hardware_id(hardware_id) {
            info.vid = parsed.vid;
            info.pid = parsed.pid;
            interface_number = parsed.interface_number;
            match parsed.serial_number {
                Some(serial_number) if is_plausible_serial(&serial_number) => {
                    info.serial_number = Some(serial_number);
                }
                _ => {
                    // composite devices carry an ephemeral windows id here; look for the true
                    // serial number on an ancestor with the same vid/pid
                    if let (Some(vid), Some(pid)) = (parsed.vid, parsed.pid) {
                        let recovered = recover_serial_number(tree, node, vid, pid);
                        if !recovered.is_empty() {
                            info.serial_number = Some(recovered);
                        }
                    }
                }
            }
        }
        info.location = build_location_string(tree, node, None, interface_number)?;
        info.hwid = info.usb_info();
    } else if hardware_id.starts_with("FTDIBUS") {
        if let Some(parsed) = parse_hardware_id(hardware_id) {
            info.vid = parsed.vid;
            info.pid = parsed.pid;
            info.serial_number = parsed.serial_number;
        }
        // the usb location is hidden by the ftdi bus driver
        info.hwid = info.usb_info();
    }

    Ok(())
}
