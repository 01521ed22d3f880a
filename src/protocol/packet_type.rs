// ---- Packet tag byte -------------------------------------------------------

use crate::protocol::PacketError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PacketType {
    Handshake = 0x00,
    Message = 0x01,
    Config = 0x02,
}

impl PacketType {
    pub fn from_u8(v: u8) -> Result<PacketType, PacketError> {
        match v {
            0x00 => Ok(PacketType::Handshake),
            0x01 => Ok(PacketType::Message),
            0x02 => Ok(PacketType::Config),
            other => Err(PacketError::InvalidPacketType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
