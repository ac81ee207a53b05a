//! Common Packet Format codec: the item-list payload carried by SendRRData and
//! SendUnitData, and by some of the List* replies.

use byteorder::{ByteOrder, LittleEndian};
use enip_support::error::{EnipError, EnipResult};

pub const ITEM_ID_NULL: u16 = 0x0000;
pub const ITEM_ID_LIST_IDENTITY: u16 = 0x000C;
pub const ITEM_ID_CONNECTION_BASED: u16 = 0x00A1;
pub const ITEM_ID_CONNECTED_TRANSPORT: u16 = 0x00B1;
pub const ITEM_ID_UNCONNECTED_MESSAGE: u16 = 0x00B2;
pub const ITEM_ID_LIST_SERVICES: u16 = 0x0100;
pub const ITEM_ID_SOCKADDR_O_TO_T: u16 = 0x8000;
pub const ITEM_ID_SOCKADDR_T_TO_O: u16 = 0x8001;
pub const ITEM_ID_SEQUENCED_ADDRESS: u16 = 0x8002;

/// The address item of a CPF message: tags which of the three recognized variants
/// (by length, on the wire) was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressItem {
    Null,
    Connected { connection_id: u32 },
    Sequenced { connection_id: u32, sequence_number: u32 },
}

impl AddressItem {
    pub fn connection_id(&self) -> Option<u32> {
        match self {
            AddressItem::Null => None,
            AddressItem::Connected { connection_id } => Some(*connection_id),
            AddressItem::Sequenced { connection_id, .. } => Some(*connection_id),
        }
    }
}

/// The data item of a CPF message. The payload is a borrowed slice into the input
/// buffer: CPF parsing never copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataItem<'a> {
    Unconnected(&'a [u8]),
    Connected(&'a [u8]),
}

impl<'a> DataItem<'a> {
    pub fn payload(&self) -> &'a [u8] {
        match self {
            DataItem::Unconnected(data) => data,
            DataItem::Connected(data) => data,
        }
    }
}

/// One of the two optional sockaddr items (O->T / T->O) that may follow the primary
/// address/data item pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockAddrItem {
    pub is_o_to_t: bool,
    pub family: u16,
    pub port: u16,
    pub addr: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpfMessage<'a> {
    pub address: AddressItem,
    pub data: Option<DataItem<'a>>,
    pub sockaddr: [Option<SockAddrItem>; 2],
}

impl<'a> CpfMessage<'a> {
    pub fn unconnected(data: &'a [u8]) -> CpfMessage<'a> {
        CpfMessage {
            address: AddressItem::Null,
            data: Some(DataItem::Unconnected(data)),
            sockaddr: [None, None],
        }
    }

    pub fn connected(connection_id: u32, data: &'a [u8]) -> CpfMessage<'a> {
        CpfMessage {
            address: AddressItem::Connected { connection_id },
            data: Some(DataItem::Connected(data)),
            sockaddr: [None, None],
        }
    }
}

/// Parses a CPF item list out of `buf`. `strict` controls whether a length mismatch is
/// tolerated when more than two items were declared (see the open-question note in
/// DESIGN.md): with `strict = false`, a mismatch is only an error when `item_count <= 2`.
pub fn parse(buf: &[u8], strict: bool) -> EnipResult<CpfMessage<'_>> {
    if buf.len() < 2 {
        return Err(EnipError::CpfMalformed);
    }

    let mut pos = 0usize;
    let item_count = read_u16(buf, &mut pos)?;

    let mut address = AddressItem::Null;

    if item_count >= 1 {
        let type_id = read_u16(buf, &mut pos)?;
        let length = read_u16(buf, &mut pos)?;

        if type_id != ITEM_ID_NULL && type_id != ITEM_ID_CONNECTION_BASED && type_id != ITEM_ID_SEQUENCED_ADDRESS {
            return Err(EnipError::CpfMalformed);
        }

        address = if length >= 4 {
            let connection_id = read_u32(buf, &mut pos)?;
            if length == 8 {
                let sequence_number = read_u32(buf, &mut pos)?;
                AddressItem::Sequenced { connection_id, sequence_number }
            } else {
                AddressItem::Connected { connection_id }
            }
        } else {
            AddressItem::Null
        };
    }

    let mut data = None;

    if item_count >= 2 {
        let type_id = read_u16(buf, &mut pos)?;
        let length = read_u16(buf, &mut pos)? as usize;

        if pos + length > buf.len() {
            return Err(EnipError::CpfMalformed);
        }

        let value = &buf[pos..pos + length];
        pos += length;

        data = Some(match type_id {
            ITEM_ID_UNCONNECTED_MESSAGE => DataItem::Unconnected(value),
            ITEM_ID_CONNECTED_TRANSPORT => DataItem::Connected(value),
            _ => return Err(EnipError::CpfMalformed),
        });
    }

    let mut sockaddr = [None, None];
    let extra_items = (item_count as i32 - 2).max(0) as usize;

    for slot in sockaddr.iter_mut().take(extra_items.min(2)) {
        if pos + 2 > buf.len() {
            return Err(EnipError::CpfMalformed);
        }

        let type_id = LittleEndian::read_u16(&buf[pos..pos + 2]);

        if type_id == ITEM_ID_SOCKADDR_O_TO_T || type_id == ITEM_ID_SOCKADDR_T_TO_O {
            pos += 2;
            let _length = read_u16(buf, &mut pos)?;
            let family = read_u16(buf, &mut pos)?;
            let port = read_u16(buf, &mut pos)?;
            let addr = read_u32(buf, &mut pos)?;

            if pos + 8 > buf.len() {
                return Err(EnipError::CpfMalformed);
            }
            pos += 8;

            *slot = Some(SockAddrItem {
                is_o_to_t: type_id == ITEM_ID_SOCKADDR_O_TO_T,
                family,
                port,
                addr,
            });
        }
        // Not a recognized sockaddr item: leave `pos` untouched and treat this slot
        // as absent, mirroring the source's "rewind 2 bytes" behavior.
    }

    if pos != buf.len() {
        if !strict && item_count > 2 {
            // Trailing bytes beyond a declared optional tail are tolerated for
            // interop with peers that send items this parser doesn't model.
        } else {
            return Err(EnipError::CpfMalformed);
        }
    }

    Ok(CpfMessage { address, data, sockaddr })
}

/// Emits a CPF item list (item count through the trailing sockaddr items). Callers that
/// need the leading 4-byte interface-handle + 2-byte timeout fields (SendRRData,
/// SendUnitData) write those themselves before calling `emit`.
pub fn emit(msg: &CpfMessage, out: &mut Vec<u8>) {
    let item_count = 1 + msg.data.is_some() as u16 + msg.sockaddr.iter().flatten().count() as u16;

    write_u16(out, item_count);

    match msg.address {
        AddressItem::Null => {
            write_u16(out, ITEM_ID_NULL);
            write_u16(out, 0);
        }
        AddressItem::Connected { connection_id } => {
            write_u16(out, ITEM_ID_CONNECTION_BASED);
            write_u16(out, 4);
            write_u32(out, connection_id);
        }
        AddressItem::Sequenced { connection_id, sequence_number } => {
            write_u16(out, ITEM_ID_SEQUENCED_ADDRESS);
            write_u16(out, 8);
            write_u32(out, connection_id);
            write_u32(out, sequence_number);
        }
    }

    if let Some(data) = &msg.data {
        match data {
            DataItem::Unconnected(payload) => {
                write_u16(out, ITEM_ID_UNCONNECTED_MESSAGE);
                write_u16(out, payload.len() as u16);
                out.extend_from_slice(payload);
            }
            DataItem::Connected(payload) => {
                write_u16(out, ITEM_ID_CONNECTED_TRANSPORT);
                write_u16(out, payload.len() as u16);
                out.extend_from_slice(payload);
            }
        }
    }

    for item in msg.sockaddr.iter().flatten() {
        write_u16(out, if item.is_o_to_t { ITEM_ID_SOCKADDR_O_TO_T } else { ITEM_ID_SOCKADDR_T_TO_O });
        write_u16(out, 16);
        write_u16(out, item.family);
        write_u16(out, item.port);
        write_u32(out, item.addr);
        out.extend_from_slice(&[0u8; 8]);
    }
}

#[inline]
fn read_u16(buf: &[u8], pos: &mut usize) -> EnipResult<u16> {
    if *pos + 2 > buf.len() {
        return Err(EnipError::CpfMalformed);
    }
    let value = LittleEndian::read_u16(&buf[*pos..*pos + 2]);
    *pos += 2;
    Ok(value)
}

#[inline]
fn read_u32(buf: &[u8], pos: &mut usize) -> EnipResult<u32> {
    if *pos + 4 > buf.len() {
        return Err(EnipError::CpfMalformed);
    }
    let value = LittleEndian::read_u32(&buf[*pos..*pos + 4]);
    *pos += 4;
    Ok(value)
}

#[inline]
fn write_u16(out: &mut Vec<u8>, value: u16) {
    let mut tmp = [0u8; 2];
    LittleEndian::write_u16(&mut tmp, value);
    out.extend_from_slice(&tmp);
}

#[inline]
fn write_u32(out: &mut Vec<u8>, value: u32) {
    let mut tmp = [0u8; 4];
    LittleEndian::write_u32(&mut tmp, value);
    out.extend_from_slice(&tmp);
}
