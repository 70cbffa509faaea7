//! The Universal Serial Bus (USB) wire types.
//!
//! Everything in this module describes bytes as they travel on the bus: descriptor kinds and
//! headers, the standard device and configuration descriptors, string descriptors and the SETUP
//! packet of a control transfer.
//!
//! See the crate-level documentation for the acronyms used to refer to specific documents.
use std::{fmt, str};

use thiserror::Error;

pub use self::config::ConfigDescriptor;
pub use self::device::DeviceDescriptor;
pub use self::header::DescriptorHeader;
pub use self::setup::{ReqDirection, ReqRecipient, ReqType, Setup, SetupReq};
pub use self::string::{
    language_id, language_list, parse_language_list, string_descriptor, StringTooLong,
};

/// Enumerates the descriptor kinds a device can report to the host. (See USB32 Sections 9.5 and
/// 9.6)
///
/// The upper byte of `wValue` in a GET_DESCRIPTOR request carries the code of one of these.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DescriptorKind {
    /// A Device Descriptor. See [DeviceDescriptor]
    Device,
    /// A Configuration Descriptor, followed by its interface and endpoint descriptors. See
    /// [ConfigDescriptor]
    Configuration,
    /// A String Descriptor. See (USB32 Section 9.6.9).
    String,
    /// An Interface Descriptor.
    Interface,
    /// An Endpoint Descriptor.
    Endpoint,
    /// A Device Qualifier. USB2-specific.
    DeviceQualifier,
    /// The "Other Speed Configuration" descriptor. USB2-specific. See (USB2 9.6.4)
    OtherSpeedConfiguration,
    InterfacePower,
    OnTheGo,
    Debug,
    /// Groups interfaces of one function. Defined by the Interface Association ECN.
    InterfaceAssociation,
    /// A Binary Device Object Store Descriptor, followed by its capabilities.
    BinaryObjectStore,
    DeviceCapability,
    /// A Super Speed Endpoint Companion Descriptor.
    SuperSpeedCompanion,
    SuperSpeedPlusIsochCompanion,
    /// A descriptor defined by a device class (HID, CDC, hub, ...). The code is always within
    /// [CLASS_SPECIFIC_CODES].
    ClassSpecific(u8),
}

/// Descriptor type codes reserved for class definitions.
pub const CLASS_SPECIFIC_CODES: std::ops::RangeInclusive<u8> = 0x20..=0x2F;

pub const HID: u8 = 0x21;
pub const HID_REPORT: u8 = 0x22;
pub const CS_INTERFACE: u8 = 0x24;
pub const CS_ENDPOINT: u8 = 0x25;
pub const HUB: u8 = 0x29;

impl DescriptorKind {
    /// Maps a `bDescriptorType` code to its kind, or `None` if the code is not recognized.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Device,
            2 => Self::Configuration,
            3 => Self::String,
            4 => Self::Interface,
            5 => Self::Endpoint,
            6 => Self::DeviceQualifier,
            7 => Self::OtherSpeedConfiguration,
            8 => Self::InterfacePower,
            9 => Self::OnTheGo,
            10 => Self::Debug,
            11 => Self::InterfaceAssociation,
            15 => Self::BinaryObjectStore,
            16 => Self::DeviceCapability,
            0x30 => Self::SuperSpeedCompanion,
            0x31 => Self::SuperSpeedPlusIsochCompanion,
            code if CLASS_SPECIFIC_CODES.contains(&code) => Self::ClassSpecific(code),
            _ => return None,
        })
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Device => 1,
            Self::Configuration => 2,
            Self::String => 3,
            Self::Interface => 4,
            Self::Endpoint => 5,
            Self::DeviceQualifier => 6,
            Self::OtherSpeedConfiguration => 7,
            Self::InterfacePower => 8,
            Self::OnTheGo => 9,
            Self::Debug => 10,
            Self::InterfaceAssociation => 11,
            Self::BinaryObjectStore => 15,
            Self::DeviceCapability => 16,
            Self::SuperSpeedCompanion => 0x30,
            Self::SuperSpeedPlusIsochCompanion => 0x31,
            Self::ClassSpecific(code) => code,
        }
    }

    pub fn is_class_specific(self) -> bool {
        matches!(self, Self::ClassSpecific(_))
    }

    /// Whether the descriptor heads a hierarchy whose full size is given by `wTotalLength`
    /// rather than by `bLength`.
    pub fn has_total_length(self) -> bool {
        matches!(
            self,
            Self::Configuration | Self::OtherSpeedConfiguration | Self::BinaryObjectStore
        )
    }

    /// Kinds a device reports at most once.
    pub fn is_unique(self) -> bool {
        matches!(
            self,
            Self::Device | Self::DeviceQualifier | Self::BinaryObjectStore
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Configuration => "configuration",
            Self::String => "string",
            Self::Interface => "interface",
            Self::Endpoint => "endpoint",
            Self::DeviceQualifier => "device-qualifier",
            Self::OtherSpeedConfiguration => "other-speed-configuration",
            Self::InterfacePower => "interface-power",
            Self::OnTheGo => "otg",
            Self::Debug => "debug",
            Self::InterfaceAssociation => "interface-association",
            Self::BinaryObjectStore => "bos",
            Self::DeviceCapability => "device-capability",
            Self::SuperSpeedCompanion => "superspeed-companion",
            Self::SuperSpeedPlusIsochCompanion => "superspeedplus-isoch-companion",
            Self::ClassSpecific(_) => "class-specific",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClassSpecific(code) => write!(f, "class-specific({:#04x})", code),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Error)]
#[error("unrecognized descriptor kind `{0}`")]
pub struct UnknownKind(pub String);

impl str::FromStr for DescriptorKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "device" => Self::Device,
            "configuration" | "config" => Self::Configuration,
            "string" => Self::String,
            "interface" => Self::Interface,
            "endpoint" => Self::Endpoint,
            "device-qualifier" => Self::DeviceQualifier,
            "other-speed-configuration" => Self::OtherSpeedConfiguration,
            "interface-power" => Self::InterfacePower,
            "otg" => Self::OnTheGo,
            "debug" => Self::Debug,
            "interface-association" => Self::InterfaceAssociation,
            "bos" => Self::BinaryObjectStore,
            "device-capability" => Self::DeviceCapability,
            "superspeed-companion" => Self::SuperSpeedCompanion,
            "superspeedplus-isoch-companion" => Self::SuperSpeedPlusIsochCompanion,
            "hid" => Self::ClassSpecific(HID),
            "hid-report" => Self::ClassSpecific(HID_REPORT),
            "cs-interface" => Self::ClassSpecific(CS_INTERFACE),
            "cs-endpoint" => Self::ClassSpecific(CS_ENDPOINT),
            "hub" => Self::ClassSpecific(HUB),
            other => {
                let code = match other.strip_prefix("0x") {
                    Some(hex) => u8::from_str_radix(hex, 16),
                    None => other.parse::<u8>(),
                };
                return code
                    .ok()
                    .and_then(Self::from_code)
                    .ok_or_else(|| UnknownKind(other.to_owned()));
            }
        })
    }
}

pub(crate) mod config;
pub(crate) mod device;
pub(crate) mod header;
pub(crate) mod setup;
pub(crate) mod string;
