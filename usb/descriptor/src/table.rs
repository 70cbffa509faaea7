use std::fmt;
use std::num::NonZeroU8;

use crate::error::{MalformedTable, StorageError};
use crate::memory::{
    DescriptorAddress, DescriptorHandle, DescriptorStorage, MemoryBackends, MemorySpace,
};
use crate::resolver::{MemorySpaceResolver, StorageMode};
use crate::usb::{parse_language_list, DescriptorHeader, DescriptorKind};

/// What a table entry answers to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntryKey {
    /// A non-string descriptor. Entries of the same kind are indexed in insertion order, so the
    /// second configuration pushed answers index 1.
    Kind(DescriptorKind),
    /// String descriptor 0, the list of supported LANGIDs.
    LanguageList,
    /// One translation of a string.
    String { index: NonZeroU8, language: u16 },
}

impl EntryKey {
    /// The key of string `index` in `language`; index 0 is the language list.
    pub fn string(index: u8, language: u16) -> Self {
        match NonZeroU8::new(index) {
            Some(index) => Self::String { index, language },
            None => Self::LanguageList,
        }
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Kind(kind) => *kind,
            Self::LanguageList | Self::String { .. } => DescriptorKind::String,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => write!(f, "{}", kind),
            Self::LanguageList => f.write_str("string 0 (languages)"),
            Self::String { index, language } => {
                write!(f, "string {} ({:#06x})", index, language)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Entry {
    pub(crate) key: EntryKey,
    pub(crate) handle: DescriptorHandle,
    /// The length was configured rather than read from a header.
    pub(crate) fixed_length: bool,
}

#[derive(Clone, Copy, Debug)]
struct PendingEntry {
    key: EntryKey,
    space: Option<MemorySpace>,
    address: DescriptorAddress,
    length: Option<u16>,
}

/// Collects table entries and validates them into a [DescriptorTable].
pub struct TableBuilder {
    resolver: MemorySpaceResolver,
    backends: MemoryBackends,
    pending: Vec<PendingEntry>,
}

impl TableBuilder {
    pub fn new(mode: StorageMode, backends: MemoryBackends) -> Self {
        Self {
            resolver: MemorySpaceResolver::new(mode),
            backends,
            pending: Vec::new(),
        }
    }

    /// Adds a descriptor whose length is taken from its own header.
    pub fn push(
        &mut self,
        key: EntryKey,
        space: Option<MemorySpace>,
        address: DescriptorAddress,
    ) -> &mut Self {
        self.pending.push(PendingEntry {
            key,
            space,
            address,
            length: None,
        });
        self
    }

    /// Adds a descriptor with an explicit length.
    ///
    /// For class-specific kinds the length is trusted as-is, which allows headerless data such
    /// as HID report descriptors and empty descriptors. For standard kinds it must agree with the
    /// descriptor's own header.
    pub fn push_sized(
        &mut self,
        key: EntryKey,
        space: Option<MemorySpace>,
        address: DescriptorAddress,
        length: u16,
    ) -> &mut Self {
        self.pending.push(PendingEntry {
            key,
            space,
            address,
            length: Some(length),
        });
        self
    }

    pub fn build(self) -> Result<DescriptorTable, MalformedTable> {
        let mut entries: Vec<Entry> = Vec::with_capacity(self.pending.len());
        let mut languages: Option<Vec<u16>> = None;

        for (i, pending) in self.pending.iter().enumerate() {
            let space = self.resolver.tag(i, pending.space)?;
            let storage = self
                .backends
                .get(space)
                .ok_or(MalformedTable::MissingBackend { entry: i, space })?;

            let length = entry_length(i, storage, pending)?;
            let end = pending.address.offset().saturating_add(usize::from(length));
            if end > storage.len() {
                return Err(MalformedTable::OutOfBounds {
                    entry: i,
                    space,
                    end,
                    size: storage.len(),
                });
            }

            let key = pending.key;
            let seen = entries.iter().any(|entry| entry.key == key);
            match key {
                EntryKey::Kind(DescriptorKind::String) => {
                    return Err(MalformedTable::StringWithoutIndex { entry: i });
                }
                EntryKey::Kind(kind) if kind.is_unique() && seen => {
                    return Err(MalformedTable::Duplicate { entry: i, kind });
                }
                EntryKey::LanguageList if seen => {
                    return Err(MalformedTable::DuplicateLanguageList { entry: i });
                }
                EntryKey::LanguageList => {
                    let mut bytes = vec![0; usize::from(length)];
                    storage
                        .read(pending.address, &mut bytes)
                        .map_err(|source| MalformedTable::Storage { entry: i, source })?;
                    languages = Some(
                        parse_language_list(&bytes)
                            .ok_or(MalformedTable::BadLanguageList { entry: i })?,
                    );
                }
                EntryKey::String { index, language } if seen => {
                    return Err(MalformedTable::DuplicateString {
                        entry: i,
                        index: index.get(),
                        language,
                    });
                }
                _ => {}
            }

            entries.push(Entry {
                key,
                handle: DescriptorHandle {
                    space,
                    address: pending.address,
                    length,
                },
                fixed_length: pending.length.is_some() && key.kind().is_class_specific(),
            });
        }

        for (i, entry) in entries.iter().enumerate() {
            if let EntryKey::String { language, .. } = entry.key {
                match &languages {
                    None => return Err(MalformedTable::MissingLanguageList),
                    Some(list) if !list.contains(&language) => {
                        return Err(MalformedTable::UnlistedLanguage { entry: i, language });
                    }
                    Some(_) => {}
                }
            }
        }

        log::info!(
            "descriptor table ready: {} entries, storage {:?}",
            entries.len(),
            self.resolver.mode()
        );

        Ok(DescriptorTable {
            resolver: self.resolver,
            backends: self.backends,
            entries,
        })
    }
}

/// Works out how many bytes entry `entry` serves, checking its header against its key.
fn entry_length(
    entry: usize,
    storage: &dyn DescriptorStorage,
    pending: &PendingEntry,
) -> Result<u16, MalformedTable> {
    let kind = pending.key.kind();
    match pending.length {
        Some(length) if kind.is_class_specific() => return Ok(length),
        Some(0) => return Err(MalformedTable::EmptyDescriptor { entry, kind }),
        _ => {}
    }

    let mut prefix = [0u8; 4];
    let prefix = &mut prefix[..DescriptorHeader::prefix_len(kind)];
    storage
        .read(pending.address, prefix)
        .map_err(|source| match source {
            StorageError::OutOfBounds { .. } => MalformedTable::TruncatedHeader { entry },
            source => MalformedTable::Storage { entry, source },
        })?;

    if prefix[1] != kind.code() {
        return Err(MalformedTable::KindMismatch {
            entry,
            expected: kind,
            found: prefix[1],
        });
    }

    let declared = DescriptorHeader::declared_length(kind, prefix)
        .filter(|&declared| usize::from(declared) >= prefix.len())
        .ok_or(MalformedTable::TruncatedHeader { entry })?;

    match pending.length {
        Some(configured) if configured != declared => Err(MalformedTable::LengthMismatch {
            entry,
            configured,
            declared,
        }),
        _ => Ok(declared),
    }
}

/// The validated, process-wide set of descriptors a device serves.
///
/// Built once before the controller starts answering requests and never modified afterwards;
/// only the bytes in volatile or persistent memory may change, under the application's control.
#[derive(Debug)]
pub struct DescriptorTable {
    pub(crate) resolver: MemorySpaceResolver,
    pub(crate) backends: MemoryBackends,
    pub(crate) entries: Vec<Entry>,
}

impl DescriptorTable {
    pub fn resolver(&self) -> &MemorySpaceResolver {
        &self.resolver
    }

    pub fn backends(&self) -> &MemoryBackends {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryKey, DescriptorHandle)> + '_ {
        self.entries.iter().map(|entry| (entry.key, entry.handle))
    }

    /// The handle of `entry` as its bytes stand now.
    ///
    /// Program memory cannot change after the table is built. In the other spaces the
    /// application may rewrite a descriptor, so its header is read again and the length it
    /// declares now is served. `None` if the header no longer describes a descriptor of the
    /// entry's kind that fits in its image.
    pub(crate) fn current_handle(&self, entry: &Entry) -> Option<DescriptorHandle> {
        let handle = entry.handle;
        if entry.fixed_length || handle.space == MemorySpace::Program {
            return Some(handle);
        }

        let storage = self.backends.get(handle.space)?;
        let kind = entry.key.kind();
        let mut prefix = [0u8; 4];
        let prefix = &mut prefix[..DescriptorHeader::prefix_len(kind)];
        if let Err(err) = storage.read(handle.address, prefix) {
            log::warn!("{}: failed to read header: {}", entry.key, err);
            return None;
        }

        let declared = DescriptorHeader::declared_length(kind, prefix)
            .filter(|_| prefix[1] == kind.code())
            .filter(|&declared| usize::from(declared) >= prefix.len())
            .filter(|&declared| {
                handle.address.offset().saturating_add(usize::from(declared)) <= storage.len()
            });
        match declared {
            Some(length) => Some(DescriptorHandle { length, ..handle }),
            None => {
                log::warn!(
                    "{}: {} memory at {} no longer holds a valid descriptor",
                    entry.key,
                    handle.space,
                    handle.address
                );
                None
            }
        }
    }

    /// Whether the language list, as it stands now, announces `language`.
    pub(crate) fn lists_language(&self, language: u16) -> bool {
        let Some(list) = self
            .entries
            .iter()
            .find(|entry| entry.key == EntryKey::LanguageList)
        else {
            return false;
        };
        if list.handle.space == MemorySpace::Program {
            // Checked against every string when the table was built.
            return true;
        }

        let Some(handle) = self.current_handle(list) else {
            return false;
        };
        let mut bytes = vec![0; usize::from(handle.length)];
        match self.backends.read(&handle, 0, &mut bytes) {
            Ok(read) if read == bytes.len() => parse_language_list(&bytes)
                .map_or(false, |languages| languages.contains(&language)),
            Ok(_) => false,
            Err(err) => {
                log::warn!("failed to read the language list: {}", err);
                false
            }
        }
    }
}
