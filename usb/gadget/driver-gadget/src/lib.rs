//! Device-side handling of the default control pipe.
//!
//! [USBGadgetControl] owns a controller ([UDCAdapter]) and the application's [USBGadget]. Each
//! SETUP packet the controller reports is passed to [USBGadgetControl::handle_setup], which
//! answers descriptor requests from the gadget's [DescriptorProvider] and hands everything else
//! back to the caller.

use driver_udc::{in_packets, UDCAdapter, EP0};
use thiserror::Error;
use usb_descriptor::usb::Setup;
use usb_descriptor::{DescriptorHandle, DescriptorProvider, DescriptorResponse, StorageError};

/// The application behind a gadget.
pub trait USBGadget {
    type Descriptors: DescriptorProvider;

    /// The descriptors this gadget reports to the host.
    fn descriptors(&self) -> &Self::Descriptors;
}

#[derive(Debug, Error)]
pub enum GadgetError {
    #[error("endpoint i/o error: {0}")]
    Endpoint(#[from] syscall::Error),

    #[error("descriptor read failed: {0}")]
    Storage(#[from] StorageError),

    #[error("controller took {written} of {expected} bytes on ep0")]
    ShortWrite { written: usize, expected: usize },
}

/// What became of one control request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlOutcome {
    /// The request was rejected with a STALL handshake.
    Stalled,
    /// A data stage of `bytes` bytes was queued on EP0. The status stage is left to the
    /// controller.
    DataIn { bytes: usize },
    /// Not a descriptor request. Nothing was sent; the caller handles it.
    Unhandled(Setup),
}

pub struct USBGadgetControl<T: USBGadget, U: UDCAdapter> {
    gadget: T,
    udc: U,
    packet: Vec<u8>,
}

impl<T: USBGadget, U: UDCAdapter> USBGadgetControl<T, U> {
    pub fn new(gadget: T, udc: U) -> Self {
        USBGadgetControl {
            gadget,
            udc,
            packet: Vec::new(),
        }
    }

    pub fn gadget(&self) -> &T {
        &self.gadget
    }

    pub fn gadget_mut(&mut self) -> &mut T {
        &mut self.gadget
    }

    pub fn udc(&self) -> &U {
        &self.udc
    }

    pub fn udc_mut(&mut self) -> &mut U {
        &mut self.udc
    }

    /// Handles one SETUP packet as it arrived on the wire.
    ///
    /// Every call is independent: if the host abandons a transfer by sending a new SETUP, the
    /// new packet is simply handled from scratch.
    pub fn handle_setup(
        &mut self,
        packet: &[u8; Setup::SIZE],
    ) -> Result<ControlOutcome, GadgetError> {
        let setup = Setup::from_bytes(packet);
        if !setup.is_get_descriptor() {
            return Ok(ControlOutcome::Unhandled(setup));
        }

        match self
            .gadget
            .descriptors()
            .get_descriptor(setup.value, setup.index)
        {
            DescriptorResponse::Stall => {
                log::debug!(
                    "no descriptor type {:#04x} index {} language {:#06x}, stalling",
                    setup.descriptor_type(),
                    setup.descriptor_index(),
                    setup.index
                );
                self.udc.stall_ep(EP0)?;
                Ok(ControlOutcome::Stalled)
            }
            DescriptorResponse::Descriptor(handle) => self.send_descriptor(&handle, setup.length),
        }
    }

    /// Streams the descriptor behind `handle`, cut to the `requested` bytes the host accepts.
    fn send_descriptor(
        &mut self,
        handle: &DescriptorHandle,
        requested: u16,
    ) -> Result<ControlOutcome, GadgetError> {
        let total = usize::from(handle.length.min(requested));
        let max_packet = self.udc.max_packet_size(EP0);
        let packets = in_packets(total, usize::from(requested), max_packet)?;

        self.packet.resize(max_packet, 0);
        let mut offset = 0;
        for size in packets {
            let read = self
                .gadget
                .descriptors()
                .read(handle, offset, &mut self.packet[..size])?;
            let written = self.udc.write_ep(EP0, &self.packet[..read])?;
            if written != read {
                return Err(GadgetError::ShortWrite {
                    written,
                    expected: read,
                });
            }
            offset += read;
        }

        log::trace!("sent {} of {} descriptor bytes", offset, handle.length);
        Ok(ControlOutcome::DataIn { bytes: offset })
    }
}

#[cfg(test)]
mod tests {
    use syscall::Result;
    use usb_descriptor::memory::ProgramMemory;
    use usb_descriptor::usb::{
        language_id, language_list, string_descriptor, DescriptorKind, ReqRecipient, ReqType,
        HID_REPORT,
    };
    use usb_descriptor::{
        DescriptorAddress, DescriptorTable, EntryKey, MemoryBackends, StorageMode, TableBuilder,
    };

    use super::*;

    struct RecordingUdc {
        max_packet: usize,
        packets: Vec<Vec<u8>>,
        stalls: usize,
    }

    impl RecordingUdc {
        fn new(max_packet: usize) -> Self {
            Self {
                max_packet,
                packets: Vec::new(),
                stalls: 0,
            }
        }

        fn sent(&self) -> Vec<u8> {
            self.packets.concat()
        }

        fn packet_sizes(&self) -> Vec<usize> {
            self.packets.iter().map(Vec::len).collect()
        }
    }

    impl UDCAdapter for RecordingUdc {
        fn write_ep(&mut self, ep: usize, buf: &[u8]) -> Result<usize> {
            assert_eq!(ep, EP0);
            assert!(buf.len() <= self.max_packet);
            self.packets.push(buf.to_vec());
            Ok(buf.len())
        }

        fn read_ep(&mut self, _ep: usize, _buf: &mut [u8]) -> Result<Option<usize>> {
            Ok(None)
        }

        fn stall_ep(&mut self, ep: usize) -> Result<()> {
            assert_eq!(ep, EP0);
            self.stalls += 1;
            Ok(())
        }

        fn max_packet_size(&self, _ep: usize) -> usize {
            self.max_packet
        }
    }

    struct Keyboard {
        table: DescriptorTable,
    }

    impl USBGadget for Keyboard {
        type Descriptors = DescriptorTable;

        fn descriptors(&self) -> &DescriptorTable {
            &self.table
        }
    }

    fn device_bytes() -> Vec<u8> {
        let mut device = vec![18, 1, 0x00, 0x02, 0, 0, 0, 8];
        device.extend((8..18).map(|b| b as u8));
        device
    }

    fn config_bytes() -> Vec<u8> {
        let mut config = vec![9, 2, 34, 0, 1, 1, 0, 0x80, 50];
        config.extend((9..34).map(|b| b as u8));
        config
    }

    fn keyboard() -> Keyboard {
        let mut image = device_bytes();
        let config_at = image.len();
        image.extend(config_bytes());
        let languages_at = image.len();
        image.extend(language_list(&[language_id::ENGLISH_US]).unwrap());
        let product_at = image.len();
        image.extend(string_descriptor("Example").unwrap());
        let report_at = image.len();

        let mut builder = TableBuilder::new(
            StorageMode::default(),
            MemoryBackends::new().with_program(ProgramMemory::new(image)),
        );
        builder
            .push(EntryKey::Kind(DescriptorKind::Device), None, DescriptorAddress::new(0))
            .push(
                EntryKey::Kind(DescriptorKind::Configuration),
                None,
                DescriptorAddress::new(config_at),
            )
            .push(EntryKey::LanguageList, None, DescriptorAddress::new(languages_at))
            .push(
                EntryKey::string(2, language_id::ENGLISH_US),
                None,
                DescriptorAddress::new(product_at),
            )
            .push_sized(
                EntryKey::Kind(DescriptorKind::ClassSpecific(HID_REPORT)),
                None,
                DescriptorAddress::new(report_at),
                0,
            );
        Keyboard {
            table: builder.build().unwrap(),
        }
    }

    fn control(max_packet: usize) -> USBGadgetControl<Keyboard, RecordingUdc> {
        USBGadgetControl::new(keyboard(), RecordingUdc::new(max_packet))
    }

    fn get(kind: DescriptorKind, index: u8, language: u16, length: u16) -> [u8; 8] {
        Setup::get_descriptor(kind, index, language, length).to_bytes()
    }

    #[test]
    fn device_descriptor_in_packets() {
        let mut control = control(8);
        let outcome = control
            .handle_setup(&get(DescriptorKind::Device, 0, 0, 64))
            .unwrap();
        assert_eq!(outcome, ControlOutcome::DataIn { bytes: 18 });
        assert_eq!(control.udc().packet_sizes(), [8, 8, 2]);
        assert_eq!(control.udc().sent(), device_bytes());
    }

    #[test]
    fn host_length_cuts_configuration() {
        let mut control = control(64);
        let outcome = control
            .handle_setup(&get(DescriptorKind::Configuration, 0, 0, 9))
            .unwrap();
        assert_eq!(outcome, ControlOutcome::DataIn { bytes: 9 });
        assert_eq!(control.udc().sent(), &config_bytes()[..9]);

        let mut control = self::control(16);
        control
            .handle_setup(&get(DescriptorKind::Configuration, 0, 0, 255))
            .unwrap();
        assert_eq!(control.udc().packet_sizes(), [16, 16, 2]);
        assert_eq!(control.udc().sent(), config_bytes());
    }

    #[test]
    fn boundary_aligned_string_ends_with_zlp() {
        let mut control = control(8);
        let outcome = control
            .handle_setup(&get(DescriptorKind::String, 2, language_id::ENGLISH_US, 255))
            .unwrap();
        assert_eq!(outcome, ControlOutcome::DataIn { bytes: 16 });
        assert_eq!(control.udc().packet_sizes(), [8, 8, 0]);
    }

    #[test]
    fn missing_descriptors_stall() {
        let mut control = control(64);
        for setup in [
            get(DescriptorKind::String, 2, language_id::GERMAN, 255),
            get(DescriptorKind::Configuration, 1, 0, 255),
            get(DescriptorKind::DeviceQualifier, 0, 0, 10),
        ] {
            assert_eq!(control.handle_setup(&setup).unwrap(), ControlOutcome::Stalled);
        }
        assert_eq!(control.udc().stalls, 3);
        assert!(control.udc().packets.is_empty());
    }

    #[test]
    fn empty_class_descriptor_is_a_zlp() {
        let mut control = control(64);
        let mut setup =
            Setup::get_descriptor(DescriptorKind::ClassSpecific(HID_REPORT), 0, 0, 64);
        setup.kind = 0x81;
        assert_eq!(setup.req_ty(), ReqType::Standard);
        assert_eq!(setup.req_recipient(), Some(ReqRecipient::Interface));

        let outcome = control.handle_setup(&setup.to_bytes()).unwrap();
        assert_eq!(outcome, ControlOutcome::DataIn { bytes: 0 });
        assert_eq!(control.udc().packet_sizes(), [0]);
        assert_eq!(control.udc().stalls, 0);
    }

    #[test]
    fn other_requests_are_left_to_the_caller() {
        let mut control = control(64);
        let setup = Setup::set_address(7);
        assert_eq!(
            control.handle_setup(&setup.to_bytes()).unwrap(),
            ControlOutcome::Unhandled(setup)
        );
        assert_eq!(control.udc().stalls, 0);
        assert!(control.udc().packets.is_empty());
    }
}
