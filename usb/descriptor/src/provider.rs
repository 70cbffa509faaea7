use crate::error::{NotFound, StorageError};
use crate::locator::DescriptorKey;
use crate::memory::DescriptorHandle;
use crate::packager::{package, DescriptorResponse};
use crate::table::DescriptorTable;

/// The application side of GET_DESCRIPTOR.
///
/// The control-transfer sequencer is handed a provider when it is created and calls
/// [DescriptorProvider::get_descriptor] once per request, synchronously, from whatever context
/// runs the SETUP stage. Implementations must not block.
pub trait DescriptorProvider {
    /// Answers a request given its raw `wValue` (type in the upper byte, index in the lower) and
    /// `wIndex` (the LANGID for strings).
    fn get_descriptor(&self, value: u16, index: u16) -> DescriptorResponse;

    /// Copies descriptor bytes for the data stage. See [crate::memory::MemoryBackends::read].
    fn read(
        &self,
        handle: &DescriptorHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError>;
}

impl DescriptorProvider for DescriptorTable {
    fn get_descriptor(&self, value: u16, index: u16) -> DescriptorResponse {
        let result = match DescriptorKey::from_request(value, index) {
            Some(key) => self.resolve(&key),
            None => {
                log::trace!("unrecognized descriptor type {:#04x}", value >> 8);
                Err(NotFound)
            }
        };
        package(result)
    }

    fn read(
        &self,
        handle: &DescriptorHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        self.backends.read(handle, offset, buf)
    }
}

impl<P: DescriptorProvider + ?Sized> DescriptorProvider for &P {
    fn get_descriptor(&self, value: u16, index: u16) -> DescriptorResponse {
        (**self).get_descriptor(value, index)
    }

    fn read(
        &self,
        handle: &DescriptorHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        (**self).read(handle, offset, buf)
    }
}

impl<P: DescriptorProvider + ?Sized> DescriptorProvider for std::sync::Arc<P> {
    fn get_descriptor(&self, value: u16, index: u16) -> DescriptorResponse {
        (**self).get_descriptor(value, index)
    }

    fn read(
        &self,
        handle: &DescriptorHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        (**self).read(handle, offset, buf)
    }
}
