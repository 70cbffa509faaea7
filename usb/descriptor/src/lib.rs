//! Descriptor resolution for USB device mode.
//!
//! When the host sends GET_DESCRIPTOR on the default control pipe, the control-transfer
//! sequencer decodes the SETUP packet and asks a [DescriptorProvider] for the descriptor. The
//! provider answers with a [DescriptorResponse]: either a stall, or a [DescriptorHandle] naming
//! the memory space, the address inside that space and the number of bytes to stream.
//!
//! Descriptors live in one of three backends (see [memory]):
//!
//! - program memory, a read-only image fixed at build time,
//! - volatile memory, a RAM image the application may patch at runtime,
//! - persistent memory, byte-addressable storage such as an EEPROM image.
//!
//! A [DescriptorTable] is built once at startup by a [TableBuilder]. Every inconsistency in the
//! table is reported then as [MalformedTable]; once built, lookups cannot fail other than with
//! [NotFound].
//!
//! The relevant standards are referred to as follows:
//!
//! - USB2  - [Universal Serial Bus Specification](https://www.usb.org/document-library/usb-20-specification)
//! - USB32 - [Universal Serial Bus 3.2 Specification Revision 1.1](https://usb.org/document-library/usb-32-revision-11-june-2022)
pub extern crate plain;

pub mod config;
mod error;
mod locator;
pub mod memory;
mod packager;
mod provider;
mod resolver;
mod table;
pub mod usb;

pub use error::{MalformedTable, NotFound, StorageError};
pub use locator::DescriptorKey;
pub use memory::{DescriptorAddress, DescriptorHandle, MemoryBackends, MemorySpace};
pub use packager::{package, DescriptorResponse, RawDescriptor, NO_DESCRIPTOR};
pub use provider::DescriptorProvider;
pub use resolver::{MemorySpaceResolver, StorageMode};
pub use table::{DescriptorTable, EntryKey, TableBuilder};
