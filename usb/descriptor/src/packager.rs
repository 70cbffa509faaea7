use crate::error::NotFound;
use crate::memory::{DescriptorAddress, DescriptorHandle};
use crate::resolver::MemorySpaceResolver;

/// Length reported for a request nothing answers.
pub const NO_DESCRIPTOR: u16 = 0;

/// The answer to one GET_DESCRIPTOR request, as the control-transfer sequencer consumes it.
///
/// A stall and an empty descriptor are different things on the bus: the first rejects the request
/// with a STALL handshake, the second completes it with a zero-length data stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DescriptorResponse {
    Stall,
    Descriptor(DescriptorHandle),
}

/// Turns a lookup result into a response.
pub fn package(result: Result<DescriptorHandle, NotFound>) -> DescriptorResponse {
    match result {
        Ok(handle) => DescriptorResponse::Descriptor(handle),
        Err(NotFound) => DescriptorResponse::Stall,
    }
}

/// The flat `(length, address, space)` form of a response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawDescriptor {
    pub length: u16,
    pub address: Option<DescriptorAddress>,
    /// [crate::MemorySpace::code], present only when the space is selected at runtime.
    pub space: Option<u8>,
}

impl DescriptorResponse {
    pub fn is_stall(&self) -> bool {
        matches!(self, Self::Stall)
    }

    /// Byte count of the descriptor, [NO_DESCRIPTOR] for a stall.
    pub fn length(&self) -> u16 {
        match self {
            Self::Stall => NO_DESCRIPTOR,
            Self::Descriptor(handle) => handle.length,
        }
    }

    pub fn handle(&self) -> Option<&DescriptorHandle> {
        match self {
            Self::Stall => None,
            Self::Descriptor(handle) => Some(handle),
        }
    }

    pub fn into_parts(self) -> (u16, Option<DescriptorHandle>) {
        match self {
            Self::Stall => (NO_DESCRIPTOR, None),
            Self::Descriptor(handle) => (handle.length, Some(handle)),
        }
    }

    /// Flattens the response; the space code is left out when `resolver` pins a single space.
    ///
    /// In this form an empty descriptor is told apart from a stall only by `address` being set.
    pub fn into_raw(self, resolver: &MemorySpaceResolver) -> RawDescriptor {
        match self {
            Self::Stall => RawDescriptor {
                length: NO_DESCRIPTOR,
                address: None,
                space: None,
            },
            Self::Descriptor(handle) => RawDescriptor {
                length: handle.length,
                address: Some(handle.address),
                space: resolver.exposes_space().then(|| handle.space.code()),
            },
        }
    }
}

impl From<Result<DescriptorHandle, NotFound>> for DescriptorResponse {
    fn from(result: Result<DescriptorHandle, NotFound>) -> Self {
        package(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySpace;
    use crate::resolver::StorageMode;

    const EMPTY: DescriptorHandle = DescriptorHandle {
        space: MemorySpace::Persistent,
        address: DescriptorAddress::new(0x20),
        length: 0,
    };

    #[test]
    fn empty_descriptor_is_not_a_stall() {
        let empty = package(Ok(EMPTY));
        let stall = package(Err(NotFound));

        assert_eq!(empty.length(), stall.length());
        assert!(!empty.is_stall());
        assert!(stall.is_stall());
        assert_eq!(empty.into_parts(), (0, Some(EMPTY)));
        assert_eq!(stall.into_parts(), (NO_DESCRIPTOR, None));
    }

    #[test]
    fn raw_form_reports_space_only_when_selectable() {
        let response = DescriptorResponse::from(Ok(EMPTY));

        let pinned = MemorySpaceResolver::new(StorageMode::Fixed(MemorySpace::Persistent));
        assert_eq!(
            response.into_raw(&pinned),
            RawDescriptor {
                length: 0,
                address: Some(DescriptorAddress::new(0x20)),
                space: None,
            }
        );

        let selectable = MemorySpaceResolver::new(StorageMode::RuntimeSelectable);
        assert_eq!(response.into_raw(&selectable).space, Some(1));
        assert_eq!(
            DescriptorResponse::Stall.into_raw(&selectable),
            RawDescriptor {
                length: NO_DESCRIPTOR,
                address: None,
                space: None,
            }
        );
    }
}
