//! Loading a descriptor table from a TOML file.
//!
//! ```toml
//! storage = "runtime-selectable"
//! persistent-image = "eeprom.bin"
//!
//! [[descriptor]]
//! kind = "device"
//! space = "program"
//! bytes = [
//!     0x12, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x34,
//!     0x12, 0x78, 0x56, 0x00, 0x01, 0x01, 0x02, 0x03, 0x01,
//! ]
//!
//! [[descriptor]]
//! kind = "string"
//! space = "program"
//! languages = [0x0409]
//!
//! [[descriptor]]
//! kind = "string"
//! index = 3
//! language = 0x0409
//! space = "persistent"
//! address = 0
//! ```
//!
//! Descriptors given as `bytes`, `text` (strings) or `languages` (string 0) are laid out one after
//! the other in the image of their memory space. Persistent descriptors already live in the
//! persistent image and are referenced by `address` instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::MalformedTable;
use crate::memory::{
    DescriptorAddress, MemoryBackends, MemorySpace, PersistentMemory, ProgramMemory,
    VolatileMemory,
};
use crate::resolver::{MemorySpaceResolver, StorageMode};
use crate::table::{DescriptorTable, EntryKey, TableBuilder};
use crate::usb::{language_list, string_descriptor, DescriptorKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("descriptor {entry}: {reason}")]
    InvalidEntry { entry: usize, reason: String },

    #[error("invalid descriptor table: {0}")]
    Malformed(#[from] MalformedTable),
}

fn invalid(entry: usize, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidEntry {
        entry,
        reason: reason.into(),
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageConfig {
    #[serde(alias = "flash")]
    Program,
    #[serde(alias = "ram")]
    Volatile,
    #[serde(alias = "eeprom")]
    Persistent,
    RuntimeSelectable,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Program
    }
}

impl From<StorageConfig> for StorageMode {
    fn from(config: StorageConfig) -> Self {
        match config {
            StorageConfig::Program => StorageMode::Fixed(MemorySpace::Program),
            StorageConfig::Volatile => StorageMode::Fixed(MemorySpace::Volatile),
            StorageConfig::Persistent => StorageMode::Fixed(MemorySpace::Persistent),
            StorageConfig::RuntimeSelectable => StorageMode::RuntimeSelectable,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    /// Image backing persistent memory, relative to the configuration file.
    pub persistent_image: Option<PathBuf>,
    #[serde(default, rename = "descriptor")]
    pub descriptors: Vec<DescriptorConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DescriptorConfig {
    /// A [DescriptorKind] name or numeric code.
    pub kind: String,
    /// String number. Other kinds are indexed by their order in the file.
    pub index: Option<u8>,
    pub language: Option<u16>,
    pub space: Option<MemorySpace>,
    pub bytes: Option<Vec<u8>>,
    pub text: Option<String>,
    pub languages: Option<Vec<u16>>,
    pub address: Option<usize>,
    pub length: Option<u16>,
}

impl DescriptorConfig {
    fn key(&self, entry: usize) -> Result<EntryKey, ConfigError> {
        let kind: DescriptorKind = self
            .kind
            .parse()
            .map_err(|err| invalid(entry, format!("{}", err)))?;

        match (kind, self.index.unwrap_or(0), self.language) {
            (DescriptorKind::String, 0, None) => Ok(EntryKey::LanguageList),
            (DescriptorKind::String, 0, Some(_)) => {
                Err(invalid(entry, "the language list takes no language"))
            }
            (DescriptorKind::String, index, Some(language)) => {
                Ok(EntryKey::string(index, language))
            }
            (DescriptorKind::String, _, None) => Err(invalid(entry, "string needs a language")),
            (kind, _, _) if self.index.is_some() || self.language.is_some() => Err(invalid(
                entry,
                format!("{} descriptors are indexed by order and take no language", kind),
            )),
            (kind, _, _) => Ok(EntryKey::Kind(kind)),
        }
    }

    fn content(&self, entry: usize, key: EntryKey) -> Result<Option<Vec<u8>>, ConfigError> {
        let sources = [
            self.bytes.is_some(),
            self.text.is_some(),
            self.languages.is_some(),
        ];
        if sources.iter().filter(|given| **given).count() > 1 {
            return Err(invalid(entry, "give only one of bytes, text and languages"));
        }

        if let Some(text) = &self.text {
            if !matches!(key, EntryKey::String { .. }) {
                return Err(invalid(entry, "text is only for strings with a nonzero index"));
            }
            return string_descriptor(text)
                .map(Some)
                .map_err(|err| invalid(entry, err.to_string()));
        }
        if let Some(languages) = &self.languages {
            if key != EntryKey::LanguageList {
                return Err(invalid(entry, "languages are only for string 0"));
            }
            return language_list(languages)
                .map(Some)
                .map_err(|err| invalid(entry, err.to_string()));
        }
        Ok(self.bytes.clone())
    }
}

impl TableConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Lays out the configured descriptors and builds the table. Relative paths are resolved
    /// against `base_dir`.
    pub fn build(&self, base_dir: &Path) -> Result<DescriptorTable, ConfigError> {
        let mode = StorageMode::from(self.storage);
        let resolver = MemorySpaceResolver::new(mode);

        let mut program = Vec::new();
        let mut volatile = Vec::new();
        let mut placed = Vec::with_capacity(self.descriptors.len());

        for (i, descriptor) in self.descriptors.iter().enumerate() {
            let key = descriptor.key(i)?;
            let space = resolver.tag(i, descriptor.space)?;
            let content = descriptor.content(i, key)?;

            let offset = match (space, content, descriptor.address) {
                (MemorySpace::Persistent, None, Some(address)) => address,
                (MemorySpace::Persistent, _, _) => {
                    return Err(invalid(
                        i,
                        "persistent descriptors are referenced by address only",
                    ));
                }
                (_, Some(_), Some(_)) => {
                    return Err(invalid(i, "address is only for persistent descriptors"));
                }
                (space, Some(bytes), None) => {
                    let image = if space == MemorySpace::Program {
                        &mut program
                    } else {
                        &mut volatile
                    };
                    let offset = image.len();
                    image.extend_from_slice(&bytes);
                    offset
                }
                (_, None, _) => {
                    return Err(invalid(i, "needs one of bytes, text and languages"));
                }
            };

            placed.push((key, space, DescriptorAddress::new(offset), descriptor.length));
        }

        let mut backends = MemoryBackends::new()
            .with_program(ProgramMemory::new(program))
            .with_volatile(VolatileMemory::new(volatile));
        if let Some(image) = &self.persistent_image {
            backends = backends.with_persistent(PersistentMemory::open(base_dir.join(image))?);
        }

        let mut builder = TableBuilder::new(mode, backends);
        for (key, space, address, length) in placed {
            match length {
                Some(length) => builder.push_sized(key, Some(space), address, length),
                None => builder.push(key, Some(space), address),
            };
        }
        Ok(builder.build()?)
    }
}

/// Reads and builds the table described by the TOML file at `path`.
pub fn load_table(path: impl AsRef<Path>) -> Result<DescriptorTable, ConfigError> {
    let path = path.as_ref();
    let config = TableConfig::from_toml(&fs::read_to_string(path)?)?;
    config.build(path.parent().unwrap_or_else(|| Path::new(".")))
}
