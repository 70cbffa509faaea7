//! Endpoint access to a USB device controller (UDC).
//!
//! A controller driver implements [UDCAdapter]; gadget code drives the endpoints through it
//! without knowing which controller sits underneath.

use syscall::{Error, Result, EINVAL};

/// Endpoint number of the default control pipe.
pub const EP0: usize = 0;

pub trait UDCAdapter {
    /// Queues `buf` as one packet on IN endpoint `ep`. An empty `buf` sends a zero-length packet.
    fn write_ep(&mut self, ep: usize, buf: &[u8]) -> Result<usize>;

    /// Takes the next packet from OUT endpoint `ep`, or `None` if nothing has arrived.
    fn read_ep(&mut self, ep: usize, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Answers the current transaction on `ep` with a STALL handshake.
    fn stall_ep(&mut self, ep: usize) -> Result<()>;

    /// wMaxPacketSize of `ep`.
    fn max_packet_size(&self, ep: usize) -> usize;
}

/// Splits `total` bytes into the packet sizes an IN data stage is sent as.
///
/// A data stage shorter than the host asked for must end with a short packet, so when it ends
/// exactly on a packet boundary a zero-length packet is appended. A zero-byte data stage is a
/// single zero-length packet.
pub fn in_packets(total: usize, requested: usize, max_packet: usize) -> Result<Vec<usize>> {
    if max_packet == 0 || total > requested {
        return Err(Error::new(EINVAL));
    }

    let mut packets: Vec<usize> = (0..total)
        .step_by(max_packet)
        .map(|start| max_packet.min(total - start))
        .collect();
    if total % max_packet == 0 && total < requested {
        packets.push(0);
    }
    log::trace!(
        "{} of {} bytes as {} packets of up to {}",
        total,
        requested,
        packets.len(),
        max_packet
    );
    Ok(packets)
}
