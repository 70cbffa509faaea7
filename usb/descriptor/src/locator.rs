use crate::error::NotFound;
use crate::memory::DescriptorHandle;
use crate::table::{DescriptorTable, EntryKey};
use crate::usb::DescriptorKind;

/// What the host asked for in a GET_DESCRIPTOR request.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DescriptorKey {
    pub kind: DescriptorKind,
    /// Selects among descriptors of the same kind; the string number for strings.
    pub index: u8,
    /// Only meaningful for strings with a nonzero index.
    pub language: u16,
}

impl DescriptorKey {
    pub const fn new(kind: DescriptorKind, index: u8, language: u16) -> Self {
        Self {
            kind,
            index,
            language,
        }
    }

    /// Decodes `wValue` and `wIndex` of a GET_DESCRIPTOR request. Returns `None` when the
    /// descriptor type in the upper byte of `value` is not one this stack recognizes.
    pub fn from_request(value: u16, index: u16) -> Option<Self> {
        let kind = DescriptorKind::from_code((value >> 8) as u8)?;
        Some(Self::new(kind, value as u8, index))
    }
}

impl DescriptorTable {
    /// Finds the descriptor that answers `key`.
    ///
    /// Strings are matched on index and exact language; there is no fallback to another
    /// translation. String index 0 is the language list and ignores the language entirely. Every
    /// other kind takes the `index`-th entry of that kind.
    ///
    /// Descriptors outside program memory are checked as they stand at the time of the request,
    /// so a rewritten descriptor is served with its new length.
    pub fn resolve(&self, key: &DescriptorKey) -> Result<DescriptorHandle, NotFound> {
        let found = match key.kind {
            DescriptorKind::String => {
                let wanted = EntryKey::string(key.index, key.language);
                self.entries.iter().find(|entry| entry.key == wanted)
            }
            kind => self
                .entries
                .iter()
                .filter(|entry| entry.key == EntryKey::Kind(kind))
                .nth(usize::from(key.index)),
        };

        let handle = found.and_then(|entry| {
            if let EntryKey::String { language, .. } = entry.key {
                if !self.lists_language(language) {
                    return None;
                }
            }
            self.current_handle(entry)
        });

        match handle {
            Some(handle) => {
                log::trace!("{:?} -> {:?}", key, handle);
                Ok(handle)
            }
            None => {
                log::trace!("{:?} -> not found", key);
                Err(NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{DescriptorAddress, MemoryBackends, MemorySpace, ProgramMemory};
    use crate::resolver::StorageMode;
    use crate::table::TableBuilder;
    use crate::usb::{language_id, language_list, string_descriptor, CS_INTERFACE};

    struct Layout {
        image: Vec<u8>,
        builder: Vec<(EntryKey, usize, Option<u16>)>,
    }

    impl Layout {
        fn new() -> Self {
            Self {
                image: Vec::new(),
                builder: Vec::new(),
            }
        }

        fn add(&mut self, key: EntryKey, bytes: &[u8]) -> &mut Self {
            self.builder.push((key, self.image.len(), None));
            self.image.extend_from_slice(bytes);
            self
        }

        fn add_sized(&mut self, key: EntryKey, bytes: &[u8]) -> &mut Self {
            self.builder
                .push((key, self.image.len(), Some(bytes.len() as u16)));
            self.image.extend_from_slice(bytes);
            self
        }

        fn build(&self) -> DescriptorTable {
            let backends =
                MemoryBackends::new().with_program(ProgramMemory::new(self.image.clone()));
            let mut builder =
                TableBuilder::new(StorageMode::Fixed(MemorySpace::Program), backends);
            for &(key, offset, length) in &self.builder {
                let address = DescriptorAddress::new(offset);
                match length {
                    Some(length) => builder.push_sized(key, None, address, length),
                    None => builder.push(key, None, address),
                };
            }
            builder.build().unwrap()
        }
    }

    fn config(total: u16) -> Vec<u8> {
        let mut bytes = vec![9, 2, total as u8, (total >> 8) as u8, 1, 1, 0, 0x80, 50];
        bytes.resize(usize::from(total), 0);
        bytes
    }

    fn translated_table() -> DescriptorTable {
        Layout::new()
            .add(
                EntryKey::LanguageList,
                &language_list(&[language_id::ENGLISH_US, language_id::GERMAN]).unwrap(),
            )
            .add(
                EntryKey::string(1, language_id::ENGLISH_US),
                &string_descriptor("Keyboard").unwrap(),
            )
            .add(
                EntryKey::string(1, language_id::GERMAN),
                &string_descriptor("Tastatur").unwrap(),
            )
            .build()
    }

    #[test]
    fn nth_configuration() {
        let table = Layout::new()
            .add(EntryKey::Kind(DescriptorKind::Configuration), &config(34))
            .add(EntryKey::Kind(DescriptorKind::Configuration), &config(25))
            .build();

        let first = table
            .resolve(&DescriptorKey::new(DescriptorKind::Configuration, 0, 0))
            .unwrap();
        let second = table
            .resolve(&DescriptorKey::new(DescriptorKind::Configuration, 1, 0))
            .unwrap();
        assert_eq!(first.length, 34);
        assert_eq!(second.length, 25);
        assert_eq!(second.address.offset(), 34);
        assert_eq!(
            table.resolve(&DescriptorKey::new(DescriptorKind::Configuration, 2, 0)),
            Err(NotFound)
        );
    }

    #[test]
    fn language_must_match_exactly() {
        let table = translated_table();
        let german = table
            .resolve(&DescriptorKey::new(DescriptorKind::String, 1, language_id::GERMAN))
            .unwrap();
        let english = table
            .resolve(&DescriptorKey::new(DescriptorKind::String, 1, language_id::ENGLISH_US))
            .unwrap();
        assert_ne!(german.address, english.address);
        assert_eq!(
            table.resolve(&DescriptorKey::new(DescriptorKind::String, 1, language_id::JAPANESE)),
            Err(NotFound)
        );
        assert_eq!(
            table.resolve(&DescriptorKey::new(DescriptorKind::String, 2, language_id::GERMAN)),
            Err(NotFound)
        );
    }

    #[test]
    fn language_list_ignores_language() {
        let table = translated_table();
        let expected = table
            .resolve(&DescriptorKey::new(DescriptorKind::String, 0, 0))
            .unwrap();
        for language in [language_id::ENGLISH_US, 0x1234, 0xFFFF] {
            let handle = table
                .resolve(&DescriptorKey::new(DescriptorKind::String, 0, language))
                .unwrap();
            assert_eq!(handle, expected);
            assert_eq!(handle.length, 6);
        }
    }

    #[test]
    fn language_is_ignored_for_other_kinds() {
        let table = Layout::new()
            .add(EntryKey::Kind(DescriptorKind::Configuration), &config(9))
            .build();
        assert!(table
            .resolve(&DescriptorKey::new(DescriptorKind::Configuration, 0, 0xBEEF))
            .is_ok());
    }

    #[test]
    fn class_specific_codes_are_separate_kinds() {
        let table = Layout::new()
            .add(
                EntryKey::Kind(DescriptorKind::ClassSpecific(CS_INTERFACE)),
                &[5, CS_INTERFACE, 0x00, 0x10, 0x01],
            )
            .add_sized(EntryKey::Kind(DescriptorKind::ClassSpecific(0x22)), &[])
            .build();

        let header = table
            .resolve(&DescriptorKey::new(DescriptorKind::ClassSpecific(CS_INTERFACE), 0, 0))
            .unwrap();
        assert_eq!(header.length, 5);

        let empty = table
            .resolve(&DescriptorKey::new(DescriptorKind::ClassSpecific(0x22), 0, 0))
            .unwrap();
        assert_eq!(empty.length, 0);

        assert_eq!(
            table.resolve(&DescriptorKey::new(DescriptorKind::ClassSpecific(0x25), 0, 0)),
            Err(NotFound)
        );
    }

    #[test]
    fn unknown_type_codes_do_not_decode() {
        assert_eq!(DescriptorKey::from_request(0x4001, 0x0409), None);
        assert_eq!(DescriptorKey::from_request(0x0000, 0), None);
        assert_eq!(
            DescriptorKey::from_request(0x0302, 0x0409),
            Some(DescriptorKey::new(DescriptorKind::String, 2, 0x0409))
        );
    }
}
