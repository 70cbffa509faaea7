//! String descriptors (USB32 9.6.9).
//!
//! String index 0 is not a string: it holds the list of LANGIDs the device supports. Every other
//! index holds one UTF-16LE string per supported language.

use thiserror::Error;

use super::DescriptorKind;

/// LANGID codes assigned by USB-IF. Only the ones commonly seen in device tables are listed.
pub mod language_id {
    pub const ENGLISH_US: u16 = 0x0409;
    pub const GERMAN: u16 = 0x0407;
    pub const FRENCH: u16 = 0x040C;
    pub const JAPANESE: u16 = 0x0411;
}

/// bLength is a single byte, so a string descriptor cannot exceed 255 bytes.
pub const MAX_STRING_DESCRIPTOR_LEN: usize = u8::MAX as usize;

#[derive(Debug, Error)]
#[error("string descriptor would be {0} bytes (max {})", MAX_STRING_DESCRIPTOR_LEN)]
pub struct StringTooLong(pub usize);

fn with_header(
    payload: impl ExactSizeIterator<Item = [u8; 2]>,
) -> Result<Vec<u8>, StringTooLong> {
    let len = 2 + payload.len() * 2;
    if len > MAX_STRING_DESCRIPTOR_LEN {
        return Err(StringTooLong(len));
    }
    let mut bytes = Vec::with_capacity(len);
    bytes.push(len as u8);
    bytes.push(DescriptorKind::String.code());
    for unit in payload {
        bytes.extend_from_slice(&unit);
    }
    Ok(bytes)
}

/// Encodes `text` as a string descriptor.
pub fn string_descriptor(text: &str) -> Result<Vec<u8>, StringTooLong> {
    let units: Vec<u16> = text.encode_utf16().collect();
    with_header(units.iter().map(|unit| unit.to_le_bytes()))
}

/// Encodes the string descriptor at index 0 announcing `languages`.
pub fn language_list(languages: &[u16]) -> Result<Vec<u8>, StringTooLong> {
    with_header(languages.iter().map(|lang| lang.to_le_bytes()))
}

/// Decodes the LANGIDs of a language list descriptor, or `None` if `bytes` is not one.
pub fn parse_language_list(bytes: &[u8]) -> Option<Vec<u16>> {
    let (&length, rest) = bytes.split_first()?;
    let (&kind, ids) = rest.split_first()?;
    if usize::from(length) != bytes.len()
        || kind != DescriptorKind::String.code()
        || ids.len() % 2 != 0
    {
        return None;
    }
    Some(
        ids.chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}
