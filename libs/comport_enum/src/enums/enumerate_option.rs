#[derive(Clone, PartialEq)]
pub enum EnumerateOption {
    // skip the usb hub DeviceIoControl path and populate usb metadata from driver-reported
    // properties and the hardware id only
    WithoutUsbIoControl,
}
