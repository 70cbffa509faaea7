//! Implements the "Device" USB Descriptor.
//!
//! This descriptor is described in USB32 section 9.6.1

use plain::Plain;

/// A USB Device Descriptor.
///
/// A given device has exactly one device descriptor; it is the first thing the host reads during
/// enumeration.
///
/// USB32 Table 9-11 describes the USB packet offsets of the fields described by this structure.
/// Multi-byte fields are little-endian on the wire; use the accessors to read them.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceDescriptor {
    /// bLength, always 18.
    pub length: u8,
    /// bDescriptorType. See [super::DescriptorKind]
    pub kind: u8,
    /// bcdUSB
    pub usb: u16,
    /// bDeviceClass
    pub class: u8,
    /// bDeviceSubClass
    pub sub_class: u8,
    /// bDeviceProtocol
    pub protocol: u8,
    /// bMaxPacketSize0
    pub packet_size: u8,
    /// idVendor
    pub vendor: u16,
    /// idProduct
    pub product: u16,
    /// bcdDevice
    pub release: u16,
    /// iManufacturer
    pub manufacturer_str: u8,
    /// iProduct
    pub product_str: u8,
    /// iSerialNumber
    pub serial_str: u8,
    /// bNumConfigurations
    pub configurations: u8,
}

unsafe impl Plain for DeviceDescriptor {}

impl DeviceDescriptor {
    pub const LENGTH: usize = 18;

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        plain::from_bytes::<Self>(bytes).ok().copied()
    }

    pub fn usb_version(&self) -> u16 {
        u16::from_le(self.usb)
    }

    pub fn vendor_id(&self) -> u16 {
        u16::from_le(self.vendor)
    }

    pub fn product_id(&self) -> u16 {
        u16::from_le(self.product)
    }

    /// Gets the USB Major Version
    pub fn major_usb_vers(&self) -> u8 {
        (self.usb_version() >> 8) as u8
    }

    /// Gets the USB Minor Version
    pub fn minor_usb_vers(&self) -> u8 {
        self.usb_version() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_version() {
        let bytes = [
            0x12, 0x01, 0x10, 0x02, 0x00, 0x00, 0x00, 0x40, 0x34, 0x12, 0x78, 0x56, 0x00, 0x01,
            0x01, 0x02, 0x03, 0x01,
        ];
        let device = DeviceDescriptor::from_bytes(&bytes).unwrap();
        assert_eq!(device.vendor_id(), 0x1234);
        assert_eq!(device.product_id(), 0x5678);
        assert_eq!((device.major_usb_vers(), device.minor_usb_vers()), (2, 0x10));
        assert!(DeviceDescriptor::from_bytes(&bytes[..DeviceDescriptor::LENGTH - 1]).is_none());
    }
}
