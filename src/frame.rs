use crate::error::EchoError;

/// `<u32 seq><u16 len>`, little-endian.
pub const HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub seq: u32,
    pub len: u16,
}

/// Clamp a requested packet size into what the header can describe.
pub fn clamp_packet_size(total_size: usize) -> usize {
    total_size.clamp(HEADER_SIZE, u16::MAX as usize)
}

pub fn build_packet(seq: u32, total_size: usize) -> Vec<u8> {
    // PAY = i % 256 pattern
    let total_size = clamp_packet_size(total_size);
    let mut out = Vec::with_capacity(total_size);
    out.extend_from_slice(&seq.to_le_bytes());
    out.extend_from_slice(&(total_size as u16).to_le_bytes());
    out.extend((0..total_size - HEADER_SIZE).map(|i| (i & 0xFF) as u8));
    out
}

pub fn parse_header(buf: &[u8]) -> Result<PacketHeader, EchoError> {
    if buf.len() < HEADER_SIZE {
        return Err(EchoError::Short(buf.len()));
    }
    Ok(PacketHeader {
        seq: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        len: u16::from_le_bytes([buf[4], buf[5]]),
    })
}

pub fn verify_echo(buf: &[u8], expected_seq: u32, expected_len: usize) -> Result<(), EchoError> {
    let hdr = parse_header(buf)?;
    if hdr.seq != expected_seq || hdr.len as usize != expected_len {
        return Err(EchoError::HeaderMismatch {
            seq: hdr.seq,
            len: hdr.len,
            expected_seq,
            expected_len: expected_len as u16,
        });
    }
    if buf.len() != hdr.len as usize {
        return Err(EchoError::LengthMismatch {
            declared: hdr.len,
            actual: buf.len(),
        });
    }
    if let Some(offset) = buf[HEADER_SIZE..]
        .iter()
        .enumerate()
        .position(|(i, &b)| b != (i & 0xFF) as u8)
    {
        return Err(EchoError::PayloadMismatch { offset });
    }
    Ok(())
}
