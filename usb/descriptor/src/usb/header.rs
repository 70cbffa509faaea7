use plain::Plain;

use super::DescriptorKind;

/// The two bytes every standard descriptor starts with.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DescriptorHeader {
    /// bLength: size of this descriptor in bytes.
    pub length: u8,
    /// bDescriptorType. See [DescriptorKind]
    pub kind: u8,
}

unsafe impl Plain for DescriptorHeader {}

impl DescriptorHeader {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        plain::from_bytes::<Self>(bytes).ok().copied()
    }

    /// The number of bytes the host receives for a descriptor of `kind` starting with `prefix`.
    ///
    /// For configuration-like descriptors this is `wTotalLength`, which covers the whole
    /// hierarchy; for everything else it is `bLength`. Returns `None` if `prefix` is too short to
    /// hold the relevant field.
    pub fn declared_length(kind: DescriptorKind, prefix: &[u8]) -> Option<u16> {
        if kind.has_total_length() {
            // BOS shares the first four bytes of the configuration layout.
            let head = prefix.get(..4)?;
            Some(u16::from_le_bytes([head[2], head[3]]))
        } else {
            Self::from_bytes(prefix).map(|header| u16::from(header.length))
        }
    }

    /// Bytes to read from storage so that [DescriptorHeader::declared_length] can be answered.
    pub fn prefix_len(kind: DescriptorKind) -> usize {
        if kind.has_total_length() {
            4
        } else {
            std::mem::size_of::<Self>()
        }
    }
}
