//! Reply payload builders for the three "list" commands that carry device identity
//! information: ListServices, ListIdentity, ListInterfaces.
//!
//! Unlike SendRRData/SendUnitData, these commands don't carry an address-item/data-item
//! CPF pair -- they're a bare item count followed by one recognized item (or, for
//! ListInterfaces, no items at all) -- so they're built directly rather than through
//! `cpf::emit`.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde_derive::{Deserialize, Serialize};

use crate::net::cpf::{ITEM_ID_LIST_IDENTITY, ITEM_ID_LIST_SERVICES};

pub const ENCAP_PROTOCOL_VERSION: u16 = 1;
pub const ENIP_PORT: u16 = 0xAF12;
const AF_INET: u16 = 2;

/// Static device identity, configured once at `init` and unchanging thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub device_type: u16,
    pub product_code: u16,
    pub revision_major: u8,
    pub revision_minor: u8,
    pub status_word: u16,
    pub serial_number: u32,
    pub product_name: String,
    /// The default-as-`0xFF` device state octet; configurable mainly for tests that
    /// want to assert the field is plumbed through rather than hardcoded.
    #[serde(default = "default_state")]
    pub state: u8,
}

fn default_state() -> u8 {
    0xFF
}

/// Builds the ListServices reply item list: item count 1, a single List Services
/// Response item (type `0x0100`) carrying protocol version, capability flags, and the
/// fixed 16-byte "Communications" name.
pub fn build_list_services_reply() -> Vec<u8> {
    let mut value = Vec::with_capacity(20);
    write_u16(&mut value, ENCAP_PROTOCOL_VERSION);
    // Capability flags: bit 5 (TCP) | bit 8 (UDP class 0/1) = 0x0020 | 0x0100.
    write_u16(&mut value, 0x0120);

    let mut name = [0u8; 16];
    name[..14].copy_from_slice(b"Communications");
    value.extend_from_slice(&name);

    let mut out = Vec::with_capacity(4 + value.len());
    write_u16(&mut out, 1);
    write_u16(&mut out, ITEM_ID_LIST_SERVICES);
    write_u16(&mut out, value.len() as u16);
    out.extend_from_slice(&value);
    out
}

/// Builds the ListIdentity reply item list: item count 1, a single Identity item
/// (type `0x000C`) describing the device.
pub fn build_list_identity_reply(identity: &DeviceIdentity, device_ip: u32) -> Vec<u8> {
    let mut value = Vec::with_capacity(40);
    write_u16(&mut value, ENCAP_PROTOCOL_VERSION);

    // sockaddr_in: family/port/address are big-endian (network byte order); sin_zero
    // padding is unused and left as zero.
    write_u16_be(&mut value, AF_INET);
    write_u16_be(&mut value, ENIP_PORT);
    write_u32_be(&mut value, device_ip);
    value.extend_from_slice(&[0u8; 8]);

    write_u16(&mut value, identity.vendor_id);
    write_u16(&mut value, identity.device_type);
    write_u16(&mut value, identity.product_code);
    value.push(identity.revision_major);
    value.push(identity.revision_minor);
    write_u16(&mut value, identity.status_word);
    write_u32(&mut value, identity.serial_number);

    let name_bytes = identity.product_name.as_bytes();
    value.push(name_bytes.len() as u8);
    value.extend_from_slice(name_bytes);

    value.push(identity.state);

    let mut out = Vec::with_capacity(4 + value.len());
    write_u16(&mut out, 1);
    write_u16(&mut out, ITEM_ID_LIST_IDENTITY);
    write_u16(&mut out, value.len() as u16);
    out.extend_from_slice(&value);
    out
}

/// Builds the ListInterfaces reply: an empty item list.
pub fn build_list_interfaces_reply() -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    write_u16(&mut out, 0);
    out
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    let mut tmp = [0u8; 2];
    LittleEndian::write_u16(&mut tmp, value);
    out.extend_from_slice(&tmp);
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    let mut tmp = [0u8; 4];
    LittleEndian::write_u32(&mut tmp, value);
    out.extend_from_slice(&tmp);
}

fn write_u16_be(out: &mut Vec<u8>, value: u16) {
    let mut tmp = [0u8; 2];
    BigEndian::write_u16(&mut tmp, value);
    out.extend_from_slice(&tmp);
}

fn write_u32_be(out: &mut Vec<u8>, value: u32) {
    let mut tmp = [0u8; 4];
    BigEndian::write_u32(&mut tmp, value);
    out.extend_from_slice(&tmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity() -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 1,
            device_type: 0x0C,
            product_code: 65001,
            revision_major: 1,
            revision_minor: 0,
            status_word: 0,
            serial_number: 0x1234_5678,
            product_name: "opener".to_string(),
            state: 0xFF,
        }
    }

    #[test]
    fn list_services_reply_matches_wire_layout() {
        let reply = build_list_services_reply();
        assert_eq!(LittleEndian::read_u16(&reply[0..2]), 1);
        assert_eq!(LittleEndian::read_u16(&reply[2..4]), ITEM_ID_LIST_SERVICES);
        let len = LittleEndian::read_u16(&reply[4..6]);
        assert_eq!(len as usize, reply.len() - 6);
        assert_eq!(LittleEndian::read_u16(&reply[6..8]), ENCAP_PROTOCOL_VERSION);
        assert_eq!(LittleEndian::read_u16(&reply[8..10]), 0x0120);
        assert_eq!(&reply[10..24], b"Communications\0\0");
    }

    #[test]
    fn list_identity_reply_matches_wire_layout() {
        let identity = sample_identity();
        let reply = build_list_identity_reply(&identity, 0x0100_007f);

        assert_eq!(LittleEndian::read_u16(&reply[0..2]), 1);
        assert_eq!(LittleEndian::read_u16(&reply[2..4]), ITEM_ID_LIST_IDENTITY);

        let value = &reply[6..];
        assert_eq!(LittleEndian::read_u16(&value[0..2]), 1);
        assert_eq!(BigEndian::read_u16(&value[2..4]), AF_INET);
        assert_eq!(BigEndian::read_u16(&value[4..6]), ENIP_PORT);
        assert_eq!(BigEndian::read_u32(&value[6..10]), 0x0100_007f);
        assert_eq!(LittleEndian::read_u16(&value[18..20]), identity.vendor_id);
        assert_eq!(LittleEndian::read_u16(&value[20..22]), identity.device_type);
        assert_eq!(LittleEndian::read_u16(&value[22..24]), identity.product_code);
        assert_eq!(value[24], identity.revision_major);
        assert_eq!(value[25], identity.revision_minor);
        assert_eq!(LittleEndian::read_u16(&value[26..28]), identity.status_word);
        assert_eq!(LittleEndian::read_u32(&value[28..32]), identity.serial_number);
        assert_eq!(value[32] as usize, identity.product_name.len());
        let name_end = 33 + identity.product_name.len();
        assert_eq!(&value[33..name_end], identity.product_name.as_bytes());
        assert_eq!(value[name_end], 0xFF);
    }

    #[test]
    fn list_interfaces_reply_is_an_empty_item_list() {
        let reply = build_list_interfaces_reply();
        assert_eq!(reply, vec![0x00, 0x00]);
    }
}
