use std::num::ParseIntError;

use anyhow::{anyhow, bail, Context, Result};
use clap::{App, Arg, ArgMatches};
use driver_gadget::{ControlOutcome, USBGadget, USBGadgetControl};
use driver_udc::UDCAdapter;
use usb_descriptor::config::load_table;
use usb_descriptor::usb::{ConfigDescriptor, DescriptorKind, DeviceDescriptor, Setup};
use usb_descriptor::{DescriptorHandle, DescriptorProvider, DescriptorTable, EntryKey};

/// A gadget whose only job is to answer from a loaded table.
struct TableGadget(DescriptorTable);

impl USBGadget for TableGadget {
    type Descriptors = DescriptorTable;

    fn descriptors(&self) -> &DescriptorTable {
        &self.0
    }
}

/// Stands in for a controller by printing what would go on the wire.
struct ConsoleUdc {
    max_packet: usize,
}

impl UDCAdapter for ConsoleUdc {
    fn write_ep(&mut self, ep: usize, buf: &[u8]) -> syscall::Result<usize> {
        println!("ep{} IN  [{:2}] {}", ep, buf.len(), hex(buf));
        Ok(buf.len())
    }

    fn read_ep(&mut self, _ep: usize, _buf: &mut [u8]) -> syscall::Result<Option<usize>> {
        Ok(None)
    }

    fn stall_ep(&mut self, ep: usize) -> syscall::Result<()> {
        println!("ep{} STALL", ep);
        Ok(())
    }

    fn max_packet_size(&self, _ep: usize) -> usize {
        self.max_packet
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_int(s: &str) -> std::result::Result<u16, ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn read_all(table: &DescriptorTable, handle: &DescriptorHandle) -> Result<Vec<u8>> {
    let mut bytes = vec![0; usize::from(handle.length)];
    let read = table
        .read(handle, 0, &mut bytes)
        .context("failed to read descriptor")?;
    bytes.truncate(read);
    Ok(bytes)
}

fn check(table: &DescriptorTable) -> Result<()> {
    for (key, handle) in table.entries() {
        println!(
            "{:<32} {:<10} {} {:>5}",
            key.to_string(),
            handle.space.as_str(),
            handle.address,
            handle.length
        );

        match key {
            EntryKey::Kind(DescriptorKind::Device) => {
                let device = DeviceDescriptor::from_bytes(&read_all(table, &handle)?)
                    .ok_or_else(|| anyhow!("device descriptor is shorter than 18 bytes"))?;
                println!(
                    "    USB {}.{:02x} {:04x}:{:04x}, {} configuration(s)",
                    device.major_usb_vers(),
                    device.minor_usb_vers(),
                    device.vendor_id(),
                    device.product_id(),
                    device.configurations
                );
            }
            EntryKey::Kind(DescriptorKind::Configuration) => {
                if let Some(config) = ConfigDescriptor::from_bytes(&read_all(table, &handle)?) {
                    println!(
                        "    value {}, {} interface(s), {} bytes in total",
                        config.configuration_value,
                        config.interfaces,
                        config.total_length()
                    );
                }
            }
            _ => {}
        }
    }
    println!("{} descriptors", table.len());
    Ok(())
}

fn get(table: &DescriptorTable, matches: &ArgMatches) -> Result<()> {
    let kind: DescriptorKind = matches
        .value_of("KIND")
        .ok_or_else(|| anyhow!("no KIND given"))?
        .parse()?;
    let index = match matches.value_of("INDEX") {
        Some(index) => parse_int(index).context("expected INDEX to be an 8-bit integer")?,
        None => 0,
    };
    let index = u8::try_from(index).context("expected INDEX to be an 8-bit integer")?;
    let language = match matches.value_of("LANGUAGE") {
        Some(language) => parse_int(language).context("expected LANGUAGE to be a LANGID")?,
        None => 0,
    };

    let value = (u16::from(kind.code()) << 8) | u16::from(index);
    let response = table.get_descriptor(value, language);
    let raw = response.into_raw(table.resolver());
    match response.handle() {
        None => println!("stall"),
        Some(handle) => {
            match raw.space {
                Some(space) => println!(
                    "length {} address {} space {}",
                    raw.length, handle.address, space
                ),
                None => println!("length {} address {}", raw.length, handle.address),
            }
            println!("{}", hex(&read_all(table, handle)?));
        }
    }
    Ok(())
}

fn setup(table: DescriptorTable, matches: &ArgMatches) -> Result<()> {
    let packet = matches
        .value_of("PACKET")
        .ok_or_else(|| anyhow!("no PACKET given"))?
        .replace(' ', "");
    if packet.len() != Setup::SIZE * 2 || !packet.is_ascii() {
        bail!("PACKET must be {} hex bytes", Setup::SIZE);
    }
    let mut bytes = [0u8; Setup::SIZE];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&packet[i * 2..i * 2 + 2], 16)
            .context("PACKET must be hexadecimal")?;
    }
    let max_packet = match matches.value_of("MAX_PACKET") {
        Some(size) => {
            usize::from(parse_int(size).context("expected MAX_PACKET to be an integer")?)
        }
        None => 64,
    };

    let mut control = USBGadgetControl::new(TableGadget(table), ConsoleUdc { max_packet });
    match control.handle_setup(&bytes)? {
        ControlOutcome::Stalled => {}
        ControlOutcome::DataIn { bytes } => println!("data stage: {} bytes", bytes),
        ControlOutcome::Unhandled(setup) => println!("not a descriptor request: {:?}", setup),
    }
    Ok(())
}

fn main() -> Result<()> {
    let matches = App::new("gadgetctl")
        .about("Inspects USB gadget descriptor tables")
        .arg(
            Arg::with_name("CONFIG")
                .takes_value(true)
                .required(true)
                .long("config")
                .short("c"),
        )
        .subcommand(App::new("check").about("Validates the table and lists its entries"))
        .subcommand(
            App::new("get")
                .about("Answers a GET_DESCRIPTOR request")
                .arg(Arg::with_name("KIND").takes_value(true).required(true))
                .arg(Arg::with_name("INDEX").takes_value(true))
                .arg(
                    Arg::with_name("LANGUAGE")
                        .takes_value(true)
                        .long("language")
                        .short("l"),
                ),
        )
        .subcommand(
            App::new("setup")
                .about("Runs a raw SETUP packet through the control pipe")
                .arg(Arg::with_name("PACKET").takes_value(true).required(true))
                .arg(
                    Arg::with_name("MAX_PACKET")
                        .takes_value(true)
                        .long("max-packet")
                        .short("m"),
                ),
        )
        .get_matches();

    common::setup_logging(
        "usb",
        "gadget",
        "gadgetctl",
        common::output_level(),
        common::file_level(),
    );

    let config = matches
        .value_of("CONFIG")
        .ok_or_else(|| anyhow!("no config given"))?;
    let table = load_table(config).with_context(|| format!("failed to load {}", config))?;
    log::debug!("loaded {} descriptors from {}", table.len(), config);

    match matches.subcommand() {
        ("check", Some(_)) => check(&table),
        ("get", Some(get_matches)) => get(&table, get_matches),
        ("setup", Some(setup_matches)) => setup(table, setup_matches),
        _ => {
            println!("{}", matches.usage());
            Ok(())
        }
    }
}
