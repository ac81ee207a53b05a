//! Endian codec + encapsulation frame codec: the 24-byte ENIP header that precedes
//! every command's payload.

use byteorder::{ByteOrder, LittleEndian};
use enip_support::error::{EnipError, EnipResult};

pub const HEADER_LEN: usize = 24;

pub mod command {
    pub const NOP: u16 = 0x0000;
    pub const LIST_SERVICES: u16 = 0x0004;
    pub const LIST_IDENTITY: u16 = 0x0063;
    pub const LIST_INTERFACES: u16 = 0x0064;
    pub const REGISTER_SESSION: u16 = 0x0065;
    pub const UNREGISTER_SESSION: u16 = 0x0066;
    pub const SEND_RR_DATA: u16 = 0x006F;
    pub const SEND_UNIT_DATA: u16 = 0x0070;
}

pub mod status {
    pub const SUCCESS: u32 = 0x0000;
    pub const INVALID_COMMAND: u32 = 0x0001;
    pub const INSUFFICIENT_MEMORY: u32 = 0x0002;
    pub const INCORRECT_DATA: u32 = 0x0003;
    pub const INVALID_SESSION_HANDLE: u32 = 0x0064;
    pub const INVALID_LENGTH: u32 = 0x0065;
    pub const UNSUPPORTED_PROTOCOL: u32 = 0x0069;
}

/// The fixed 24-byte ENIP encapsulation header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: u16,
    pub length: u16,
    pub session_handle: u32,
    pub status: u32,
    pub sender_context: [u8; 8],
    pub options: u32,
}

impl Header {
    /// Reads the 24-byte header from the front of `buf`. Does not validate `options`;
    /// callers check that separately so `FrameUnderrun` and `UnsupportedOptions` stay
    /// distinguishable.
    pub fn read(buf: &[u8]) -> EnipResult<Header> {
        if buf.len() < HEADER_LEN {
            return Err(EnipError::FrameUnderrun);
        }

        let mut sender_context = [0u8; 8];
        sender_context.copy_from_slice(&buf[12..20]);

        Ok(Header {
            command: LittleEndian::read_u16(&buf[0..2]),
            length: LittleEndian::read_u16(&buf[2..4]),
            session_handle: LittleEndian::read_u32(&buf[4..8]),
            status: LittleEndian::read_u32(&buf[8..12]),
            sender_context,
            options: LittleEndian::read_u32(&buf[20..24]),
        })
    }

    pub fn write(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= HEADER_LEN);
        LittleEndian::write_u16(&mut out[0..2], self.command);
        LittleEndian::write_u16(&mut out[2..4], self.length);
        LittleEndian::write_u32(&mut out[4..8], self.session_handle);
        LittleEndian::write_u32(&mut out[8..12], self.status);
        out[12..20].copy_from_slice(&self.sender_context);
        LittleEndian::write_u32(&mut out[20..24], self.options);
    }

    /// Builds the reply header for this request: command, session handle, sender
    /// context and options are echoed verbatim; only `length`/`status` change.
    pub fn reply(&self, payload_len: u16, status: u32) -> Header {
        Header {
            command: self.command,
            length: payload_len,
            session_handle: self.session_handle,
            status,
            sender_context: self.sender_context,
            options: self.options,
        }
    }
}

/// Decodes exactly one frame from the front of `buf`.
///
/// Returns the header, the payload slice, and `bytes_remaining`: positive means more
/// bytes follow (another frame already buffered), zero is an exact match, negative means
/// the frame is short and the caller must wait for more bytes before retrying.
pub fn decode(buf: &[u8]) -> EnipResult<(Header, &[u8], isize)> {
    let header = Header::read(buf)?;
    let bytes_remaining = buf.len() as isize - HEADER_LEN as isize - header.length as isize;

    if bytes_remaining < 0 {
        return Err(EnipError::FrameUnderrun);
    }

    let payload = &buf[HEADER_LEN..HEADER_LEN + header.length as usize];
    Ok((header, payload, bytes_remaining))
}

/// Serializes `header` followed by `payload` into a fresh buffer.
pub fn encode(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN + payload.len()];
    header.write(&mut out[..HEADER_LEN]);
    out[HEADER_LEN..].copy_from_slice(payload);
    out
}
