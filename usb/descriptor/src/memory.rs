//! Storage backends descriptors can live in.
//!
//! An address only means something together with the space it belongs to: offset 0x10 in program
//! memory and offset 0x10 in the EEPROM image are unrelated bytes. Every [DescriptorHandle]
//! therefore carries its [MemorySpace], and bytes are only ever fetched through
//! [MemoryBackends::read].

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::{fmt, io};

use serde::Deserialize;

use crate::error::StorageError;

/// Where a descriptor is stored.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemorySpace {
    /// Read-only program memory (flash), fixed when the firmware is built.
    #[serde(alias = "flash")]
    Program,
    /// Byte-addressable persistent storage such as EEPROM.
    #[serde(alias = "eeprom")]
    Persistent,
    /// RAM. Contents may be changed by the application at runtime.
    #[serde(alias = "ram")]
    Volatile,
}

impl MemorySpace {
    /// The code reported alongside the address when the space is selected at runtime.
    pub const fn code(self) -> u8 {
        match self {
            Self::Program => 0,
            Self::Persistent => 1,
            Self::Volatile => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Program),
            1 => Some(Self::Persistent),
            2 => Some(Self::Volatile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Persistent => "persistent",
            Self::Volatile => "volatile",
        }
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offset into one memory space. Opaque outside of the backend that owns it.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DescriptorAddress(usize);

impl DescriptorAddress {
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    pub const fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for DescriptorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// A resolved descriptor: where it lives and how many bytes the host gets.
///
/// The handle does not own the bytes. It stays valid as long as the table it came from, and the
/// bytes it names are stable as long as the application does not rewrite them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DescriptorHandle {
    pub space: MemorySpace,
    pub address: DescriptorAddress,
    pub length: u16,
}

/// Random access to one memory space.
pub trait DescriptorStorage: Send + Sync {
    fn space(&self) -> MemorySpace;

    /// Size of the image in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `buf` from `address`. Fails without touching `buf` if the range is out of bounds.
    fn read(&self, address: DescriptorAddress, buf: &mut [u8]) -> Result<(), StorageError>;
}

fn check_bounds(
    space: MemorySpace,
    address: DescriptorAddress,
    len: usize,
    size: usize,
) -> Result<(), StorageError> {
    match address.offset().checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(StorageError::OutOfBounds {
            space,
            address: address.offset(),
            len,
            size,
        }),
    }
}

/// A read-only image in program memory.
#[derive(Clone, Debug)]
pub struct ProgramMemory {
    image: Cow<'static, [u8]>,
}

impl ProgramMemory {
    pub const fn from_static(image: &'static [u8]) -> Self {
        Self {
            image: Cow::Borrowed(image),
        }
    }

    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image: Cow::Owned(image),
        }
    }
}

impl DescriptorStorage for ProgramMemory {
    fn space(&self) -> MemorySpace {
        MemorySpace::Program
    }

    fn len(&self) -> usize {
        self.image.len()
    }

    fn read(&self, address: DescriptorAddress, buf: &mut [u8]) -> Result<(), StorageError> {
        check_bounds(MemorySpace::Program, address, buf.len(), self.image.len())?;
        let start = address.offset();
        buf.copy_from_slice(&self.image[start..start + buf.len()]);
        Ok(())
    }
}

/// A RAM image shared between the descriptor table and the application.
///
/// Clones refer to the same bytes. [VolatileMemory::write] takes the write lock, so an update
/// never interleaves with a descriptor read.
#[derive(Clone, Debug, Default)]
pub struct VolatileMemory {
    image: Arc<RwLock<Vec<u8>>>,
}

impl VolatileMemory {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image: Arc::new(RwLock::new(image)),
        }
    }

    /// Overwrites bytes in place. The image never grows.
    pub fn write(&self, address: DescriptorAddress, bytes: &[u8]) -> Result<(), StorageError> {
        let mut image = self.image.write().map_err(|_| StorageError::Poisoned)?;
        check_bounds(MemorySpace::Volatile, address, bytes.len(), image.len())?;
        let start = address.offset();
        image[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl DescriptorStorage for VolatileMemory {
    fn space(&self) -> MemorySpace {
        MemorySpace::Volatile
    }

    fn len(&self) -> usize {
        // Writes never resize the image.
        self.image.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read(&self, address: DescriptorAddress, buf: &mut [u8]) -> Result<(), StorageError> {
        let image = self.image.read().map_err(|_| StorageError::Poisoned)?;
        check_bounds(MemorySpace::Volatile, address, buf.len(), image.len())?;
        let start = address.offset();
        buf.copy_from_slice(&image[start..start + buf.len()]);
        Ok(())
    }
}

/// Byte-addressable persistent storage backed by an image file.
///
/// The size is fixed when the image is opened, like the EEPROM it stands in for.
#[derive(Clone, Debug)]
pub struct PersistentMemory {
    file: Arc<File>,
    size: usize,
}

impl PersistentMemory {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len() as usize;
        Ok(Self {
            file: Arc::new(file),
            size,
        })
    }

    /// Creates (or truncates) the image at `path` with `contents`.
    pub fn create(path: impl AsRef<Path>, contents: &[u8]) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all_at(contents, 0)?;
        file.sync_data()?;
        Ok(Self {
            file: Arc::new(file),
            size: contents.len(),
        })
    }

    pub fn write(&self, address: DescriptorAddress, bytes: &[u8]) -> Result<(), StorageError> {
        check_bounds(MemorySpace::Persistent, address, bytes.len(), self.size)?;
        self.file.write_all_at(bytes, address.offset() as u64)?;
        Ok(())
    }
}

impl DescriptorStorage for PersistentMemory {
    fn space(&self) -> MemorySpace {
        MemorySpace::Persistent
    }

    fn len(&self) -> usize {
        self.size
    }

    fn read(&self, address: DescriptorAddress, buf: &mut [u8]) -> Result<(), StorageError> {
        check_bounds(MemorySpace::Persistent, address, buf.len(), self.size)?;
        self.file.read_exact_at(buf, address.offset() as u64)?;
        Ok(())
    }
}

/// The backends attached to a descriptor table, at most one per space.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackends {
    program: Option<ProgramMemory>,
    volatile: Option<VolatileMemory>,
    persistent: Option<PersistentMemory>,
}

impl MemoryBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, memory: ProgramMemory) -> Self {
        self.program = Some(memory);
        self
    }

    pub fn with_volatile(mut self, memory: VolatileMemory) -> Self {
        self.volatile = Some(memory);
        self
    }

    pub fn with_persistent(mut self, memory: PersistentMemory) -> Self {
        self.persistent = Some(memory);
        self
    }

    pub fn get(&self, space: MemorySpace) -> Option<&dyn DescriptorStorage> {
        match space {
            MemorySpace::Program => self.program.as_ref().map(|m| m as &dyn DescriptorStorage),
            MemorySpace::Volatile => self.volatile.as_ref().map(|m| m as &dyn DescriptorStorage),
            MemorySpace::Persistent => {
                self.persistent.as_ref().map(|m| m as &dyn DescriptorStorage)
            }
        }
    }

    pub fn volatile(&self) -> Option<&VolatileMemory> {
        self.volatile.as_ref()
    }

    pub fn persistent(&self) -> Option<&PersistentMemory> {
        self.persistent.as_ref()
    }

    pub fn read_at(
        &self,
        space: MemorySpace,
        address: DescriptorAddress,
        buf: &mut [u8],
    ) -> Result<(), StorageError> {
        self.get(space)
            .ok_or(StorageError::NoBackend(space))?
            .read(address, buf)
    }

    /// Copies bytes of the descriptor behind `handle`, starting `offset` bytes into it.
    ///
    /// Never reads past the descriptor's length; returns the number of bytes copied, which is 0
    /// once `offset` reaches the end.
    pub fn read(
        &self,
        handle: &DescriptorHandle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        let length = usize::from(handle.length);
        if offset >= length {
            return Ok(0);
        }
        let count = buf.len().min(length - offset);
        let address = DescriptorAddress::new(handle.address.offset() + offset);
        self.read_at(handle.space, address, &mut buf[..count])?;
        Ok(count)
    }
}
