use super::DescriptorKind;

/// The 8-byte SETUP packet that opens every control transfer. (See USB2 9.3)
///
/// Fields hold host-order values; [Setup::from_bytes] and [Setup::to_bytes] convert from and to
/// the little-endian wire layout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Setup {
    pub kind: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ReqDirection {
    HostToDevice = 0,
    DeviceToHost = 1,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ReqType {
    /// Standard device requests, such as SET_ADDRESS and GET_DESCRIPTOR.
    Standard = 0,

    /// Class specific requests, such as the HID GET_DESCRIPTOR for report descriptors.
    Class = 1,

    /// Vendor specific requests.
    Vendor = 2,

    /// Reserved
    Reserved = 3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ReqRecipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
    // 4..=30 are reserved
    VendorSpecific = 31,
}

#[repr(u8)]
pub enum SetupReq {
    GetStatus = 0x00,
    ClearFeature = 0x01,
    SetFeature = 0x03,
    SetAddress = 0x05,
    GetDescriptor = 0x06,
    SetDescriptor = 0x07,
    GetConfiguration = 0x08,
    SetConfiguration = 0x09,
    GetInterface = 0x0A,
    SetInterface = 0x0B,
    SynchFrame = 0x0C,
}

pub const USB_SETUP_DIR_BIT: u8 = 1 << 7;
pub const USB_SETUP_REQ_TY_MASK: u8 = 0x60;
pub const USB_SETUP_REQ_TY_SHIFT: u8 = 5;
pub const USB_SETUP_RECIPIENT_MASK: u8 = 0x1F;

impl Setup {
    pub const SIZE: usize = 8;

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            kind: bytes[0],
            request: bytes[1],
            value: u16::from_le_bytes([bytes[2], bytes[3]]),
            index: u16::from_le_bytes([bytes[4], bytes[5]]),
            length: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [
            self.kind, self.request, value[0], value[1], index[0], index[1], length[0], length[1],
        ]
    }

    pub fn direction(&self) -> ReqDirection {
        if self.kind & USB_SETUP_DIR_BIT == 0 {
            ReqDirection::HostToDevice
        } else {
            ReqDirection::DeviceToHost
        }
    }

    pub fn req_ty(&self) -> ReqType {
        match (self.kind & USB_SETUP_REQ_TY_MASK) >> USB_SETUP_REQ_TY_SHIFT {
            0 => ReqType::Standard,
            1 => ReqType::Class,
            2 => ReqType::Vendor,
            _ => ReqType::Reserved,
        }
    }

    /// The recipient, or `None` for the reserved encodings.
    pub fn req_recipient(&self) -> Option<ReqRecipient> {
        Some(match self.kind & USB_SETUP_RECIPIENT_MASK {
            0 => ReqRecipient::Device,
            1 => ReqRecipient::Interface,
            2 => ReqRecipient::Endpoint,
            3 => ReqRecipient::Other,
            31 => ReqRecipient::VendorSpecific,
            _ => return None,
        })
    }

    /// Whether this asks for a descriptor: a standard GET_DESCRIPTOR, or the class form used to
    /// fetch class descriptors (e.g. HID report descriptors) from an interface.
    pub fn is_get_descriptor(&self) -> bool {
        if self.request != SetupReq::GetDescriptor as u8
            || self.direction() != ReqDirection::DeviceToHost
        {
            return false;
        }
        match (self.req_ty(), self.req_recipient()) {
            (ReqType::Standard, Some(ReqRecipient::Device | ReqRecipient::Interface)) => true,
            (ReqType::Class, Some(ReqRecipient::Interface)) => true,
            _ => false,
        }
    }

    /// The descriptor type code in the upper byte of `wValue`.
    pub fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// The descriptor index in the lower byte of `wValue`.
    pub fn descriptor_index(&self) -> u8 {
        self.value as u8
    }

    pub const fn get_descriptor(
        kind: DescriptorKind,
        index: u8,
        language: u16,
        length: u16,
    ) -> Self {
        Self {
            kind: 0b1000_0000,
            request: SetupReq::GetDescriptor as u8,
            value: ((kind.code() as u16) << 8) | (index as u16),
            index: language,
            length,
        }
    }

    pub const fn set_address(address: u16) -> Self {
        Self {
            kind: 0b0000_0000,
            request: SetupReq::SetAddress as u8,
            value: address,
            index: 0,
            length: 0,
        }
    }
}
