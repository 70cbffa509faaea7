use crate::error::MalformedTable;
use crate::memory::MemorySpace;

/// How descriptors are distributed across memory spaces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageMode {
    /// Every descriptor lives in the given space. Callers never need to look at the space tag.
    Fixed(MemorySpace),
    /// Each descriptor names its own space, and callers must branch on it per request.
    RuntimeSelectable,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Fixed(MemorySpace::Program)
    }
}

/// Decides the memory space of each table entry while the table is built.
///
/// The decision is made once per entry, so answering a request never involves choosing a space.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MemorySpaceResolver {
    mode: StorageMode,
}

impl MemorySpaceResolver {
    pub const fn new(mode: StorageMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Whether request results need to report the space alongside the address.
    pub fn exposes_space(&self) -> bool {
        self.mode == StorageMode::RuntimeSelectable
    }

    /// The space of entry number `entry`, given the space it was tagged with, if any.
    pub fn tag(
        &self,
        entry: usize,
        requested: Option<MemorySpace>,
    ) -> Result<MemorySpace, MalformedTable> {
        match (self.mode, requested) {
            (StorageMode::Fixed(pinned), None) => Ok(pinned),
            (StorageMode::Fixed(pinned), Some(requested)) if requested == pinned => Ok(pinned),
            (StorageMode::Fixed(pinned), Some(requested)) => {
                Err(MalformedTable::ConflictingMemorySpace {
                    entry,
                    requested,
                    pinned,
                })
            }
            (StorageMode::RuntimeSelectable, Some(requested)) => Ok(requested),
            (StorageMode::RuntimeSelectable, None) => {
                Err(MalformedTable::MissingMemorySpace { entry })
            }
        }
    }
}
