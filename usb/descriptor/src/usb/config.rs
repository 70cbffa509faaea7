use plain::Plain;

/// The header of a configuration (or other-speed configuration) descriptor. The interface,
/// endpoint and class descriptors of the configuration follow it, `total_length` bytes in all.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigDescriptor {
    pub length: u8,
    pub kind: u8,
    pub total_length: u16,
    pub interfaces: u8,
    pub configuration_value: u8,
    pub configuration_str: u8,
    pub attributes: u8,
    pub max_power: u8,
}

unsafe impl Plain for ConfigDescriptor {}

impl ConfigDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        plain::from_bytes::<Self>(bytes).ok().copied()
    }

    pub fn total_length(&self) -> u16 {
        u16::from_le(self.total_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_length_is_little_endian() {
        let config = ConfigDescriptor::from_bytes(&[9, 2, 0x22, 0x01, 1, 1, 0, 0xA0, 50]).unwrap();
        assert_eq!(config.total_length(), 0x0122);
        assert_eq!(config.interfaces, 1);
        assert!(ConfigDescriptor::from_bytes(&[9, 2, 34]).is_none());
    }
}
