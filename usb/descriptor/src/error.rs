use std::io;

use thiserror::Error;

use crate::memory::MemorySpace;
use crate::usb::DescriptorKind;

/// No table entry answers the request. The host probes for optional descriptors all the time,
/// so this is an ordinary outcome that the sequencer turns into a stall.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("no descriptor matches the request")]
pub struct NotFound;

/// Failure to access a memory backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no {0} memory attached")]
    NoBackend(MemorySpace),

    #[error("{space} access of {len} bytes at {address:#x} exceeds the {size}-byte image")]
    OutOfBounds {
        space: MemorySpace,
        address: usize,
        len: usize,
        size: usize,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("volatile memory lock poisoned")]
    Poisoned,
}

/// A defect in the descriptor table, detected while the table is built.
///
/// These are fatal: a table that fails validation must not be served, since a bad entry would
/// otherwise reach the host as corrupted bytes. `entry` is the position of the offending entry in
/// insertion order.
#[derive(Debug, Error)]
pub enum MalformedTable {
    #[error("entry {entry}: no memory space given and none is pinned")]
    MissingMemorySpace { entry: usize },

    #[error("entry {entry}: tagged {requested} but all descriptors are pinned to {pinned}")]
    ConflictingMemorySpace {
        entry: usize,
        requested: MemorySpace,
        pinned: MemorySpace,
    },

    #[error("entry {entry}: no {space} memory attached")]
    MissingBackend { entry: usize, space: MemorySpace },

    #[error("entry {entry}: {source}")]
    Storage {
        entry: usize,
        #[source]
        source: StorageError,
    },

    #[error("entry {entry}: descriptor ends at {end:#x}, past the {size}-byte {space} image")]
    OutOfBounds {
        entry: usize,
        space: MemorySpace,
        end: usize,
        size: usize,
    },

    #[error("entry {entry}: descriptor header is truncated")]
    TruncatedHeader { entry: usize },

    #[error("entry {entry}: header says type {found:#04x}, entry is {expected}")]
    KindMismatch {
        entry: usize,
        expected: DescriptorKind,
        found: u8,
    },

    #[error("entry {entry}: configured length {configured} but descriptor declares {declared}")]
    LengthMismatch {
        entry: usize,
        configured: u16,
        declared: u16,
    },

    #[error("entry {entry}: {kind} descriptor cannot be empty")]
    EmptyDescriptor { entry: usize, kind: DescriptorKind },

    #[error("entry {entry}: second {kind} descriptor")]
    Duplicate { entry: usize, kind: DescriptorKind },

    #[error("entry {entry}: second language list")]
    DuplicateLanguageList { entry: usize },

    #[error("entry {entry}: string {index} is translated twice into {language:#06x}")]
    DuplicateString {
        entry: usize,
        index: u8,
        language: u16,
    },

    #[error("entry {entry}: string descriptors need an index and language")]
    StringWithoutIndex { entry: usize },

    #[error("entry {entry}: language list is not a valid string descriptor 0")]
    BadLanguageList { entry: usize },

    #[error("table has strings but no language list")]
    MissingLanguageList,

    #[error("entry {entry}: language {language:#06x} is not in the language list")]
    UnlistedLanguage { entry: usize, language: u16 },
}
