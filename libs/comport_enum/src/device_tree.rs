//! Ancestor traversal over the plug-and-play device tree.
//!
//! A serial port's device node hangs off the usb device that provides it, which in turn hangs
//! off a usb hub; walking parent links (bounded, since the tree above a port is shallow) is how
//! both the owning hub and the serial number of a composite device are located.

use crate::device_property::{DevicePropertyKey, DevicePropertyValue};
use crate::errors::EnumerateError;
use crate::hardware_id::{is_plausible_serial, parse_hardware_id};
use tracing::trace;

/// A device node handle in the plug-and-play tree (a CfgMgr32 DEVINST).
pub type DevInst = u32;

pub const MAX_USB_DEVICE_TREE_TRAVERSAL_DEPTH: u32 = 5;

/// Read access to the plug-and-play device tree.
pub trait DeviceTree {
    /// The parent of a device node, if it has one.
    fn parent(&self, node: DevInst) -> Option<DevInst>;

    /// The device instance identifier of a node (e.g. "USB\VID_0403&PID_6001\A5069RR4").
    fn instance_id(&self, node: DevInst) -> Option<String>;

    /// A property of a device node; absent properties yield `Ok(None)`.
    fn node_property(
        &self,
        node: DevInst,
        key: DevicePropertyKey,
    ) -> Result<Option<DevicePropertyValue>, EnumerateError>;
}

/// The result of a bounded ancestor search: the matching ancestor together with the node found
/// directly beneath it along the walked path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AncestorMatch {
    pub ancestor: DevInst,
    pub child_of_ancestor: DevInst,
}

/// Walks parent links from `leaf`, applying `predicate` to each ancestor in turn; gives up after
/// `max_depth` hops (at least one hop is always attempted).
pub fn find_ancestor_matching<T, P>(
    tree: &T,
    leaf: DevInst,
    max_depth: u32,
    mut predicate: P,
) -> Option<AncestorMatch>
where
    T: DeviceTree,
    P: FnMut(DevInst) -> bool,
{
    let mut child = leaf;
    for _ in 0..max_depth.max(1) {
        let parent = tree.parent(child)?;
        if predicate(parent) {
            return Some(AncestorMatch {
                ancestor: parent,
                child_of_ancestor: child,
            });
        }
        child = parent;
    }
    None
}

/// Recovers the usb serial number of a composite device by walking up the device tree.
///
/// The hardware id of a composite function node carries an ephemeral windows id where the serial
/// number would be; the true serial number lives on an ancestor node that shares the child's
/// VID/PID.  The walk carries the most recent serial-shaped component seen so far and falls back
/// to it (or to an empty string) when it cannot conclude:
///   - an ancestor without a parseable hardware id, or beyond the depth bound, ends the walk;
///   - an ancestor without VID/PID is skipped over, though its serial component is remembered;
///   - an ancestor with a *different* VID/PID belongs to another physical device, so the value
///     remembered before reaching it is the best answer;
///   - an ancestor with the same VID/PID and a purely alphanumeric serial component is the
///     serial number.
pub fn recover_serial_number<T: DeviceTree>(
    tree: &T,
    leaf: DevInst,
    child_vid: u16,
    child_pid: u16,
) -> String {
    let mut node = leaf;
    let mut best_seen: Option<String> = None;
    for _ in 0..=MAX_USB_DEVICE_TREE_TRAVERSAL_DEPTH {
        let parent = match tree.parent(node) {
            Some(value) => value,
            None => break,
        };
        let parent_instance_id = match tree.instance_id(parent) {
            Some(value) => value,
            None => break,
        };
        let parsed = match parse_hardware_id(&parent_instance_id) {
            Some(value) => value,
            None => break,
        };
        let (vid, pid) = match (parsed.vid, parsed.pid) {
            (Some(vid), Some(pid)) => (vid, pid),
            _ => {
                // an intermediate node without its own vid/pid; remember any serial-shaped
                // component and keep ascending
                if parsed.serial_number.is_some() {
                    best_seen = parsed.serial_number;
                }
                node = parent;
                continue;
            }
        };
        if vid != child_vid || pid != child_pid {
            trace!(parent, "ancestor belongs to a different physical device");
            break;
        }
        match parsed.serial_number {
            Some(serial_number) if is_plausible_serial(&serial_number) => return serial_number,
            Some(serial_number) => {
                // an ephemeral windows id; keep it as a last resort and continue upward
                best_seen = Some(serial_number);
                node = parent;
            }
            None => {
                node = parent;
            }
        }
    }
    best_seen.unwrap_or_default()
}
