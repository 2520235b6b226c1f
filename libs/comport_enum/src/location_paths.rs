//! Rendering of platform-neutral usb location strings (e.g. "1-3.1:x.0") from the
//! DEVPKEY_Device_LocationPaths property.

use crate::device_property::DEVPKEY_DEVICE_LOCATION_PATHS;
use crate::device_tree::{DevInst, DeviceTree};
use crate::errors::EnumerateError;
use regex::Regex;
use std::sync::LazyLock;

static LOCATION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)USBROOT\((\d+)\)|#USB\((\w+)\)")
        .unwrap_or_else(|error| panic!("invalid location token pattern: {error}"))
});

static USBMI_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*#USBMI\((\d+)\)$")
        .unwrap_or_else(|error| panic!("invalid usbmi suffix pattern: {error}"))
});

/// Renders a location string from raw location paths: the root hub index (displayed 1-based),
/// the chain of hub ports (first joined with '-', deeper hops with '.'), and a
/// ":configuration.interface" suffix for composite devices.  An unknown configuration is
/// rendered as the placeholder 'x'.
pub fn render_location_from_paths(
    location_paths: &[String],
    configuration_value: Option<u8>,
    interface_number: Option<u8>,
) -> Option<String> {
    let first_path = location_paths.first()?;
    let mut rendered_parts: Vec<String> = Vec::new();
    for captures in LOCATION_TOKEN.captures_iter(first_path) {
        if let Some(root_index) = captures.get(1) {
            // an unrenderable root index loses the token, not the whole path
            match root_index.as_str().parse::<u32>() {
                Ok(value) => rendered_parts.push((value as u64 + 1).to_string()),
                Err(_) => continue,
            }
        } else if let Some(hub_port) = captures.get(2) {
            if rendered_parts.len() > 1 {
                rendered_parts.push(".".to_string());
            } else {
                rendered_parts.push("-".to_string());
            }
            rendered_parts.push(hub_port.as_str().to_string());
        }
    }
    if let Some(interface_number) = interface_number {
        let configuration_rendering = match configuration_value {
            Some(value) => value.to_string(),
            None => "x".to_string(),
        };
        rendered_parts.push(format!(":{}.{}", configuration_rendering, interface_number));
    }
    if rendered_parts.is_empty() {
        return None;
    }
    Some(rendered_parts.concat())
}

/// Extracts the composite interface number from the "#USBMI(n)" suffix of a location path, if
/// any path carries one.
pub fn parse_usbmi_interface(location_paths: &[String]) -> Option<u8> {
    for location_path in location_paths {
        if let Some(captures) = USBMI_SUFFIX.captures(location_path) {
            return captures.get(1).and_then(|g| g.as_str().parse().ok());
        }
    }
    None
}

/// Reads the location-paths property of a device node and renders its location string; yields
/// no location when the property is absent or carries no recognizable token.
pub fn build_location_string<T: DeviceTree>(
    tree: &T,
    node: DevInst,
    configuration_value: Option<u8>,
    interface_number: Option<u8>,
) -> Result<Option<String>, EnumerateError> {
    let property_value = match tree.node_property(node, DEVPKEY_DEVICE_LOCATION_PATHS)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let location_paths = match property_value.as_string_list() {
        Some(paths) => paths,
        None => return Ok(None),
    };
    Ok(render_location_from_paths(
        location_paths,
        configuration_value,
        interface_number,
    ))
}
