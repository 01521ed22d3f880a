use byteorder::{ByteOrder, LittleEndian};
use std::str;

use super::{MAX_MESSAGE_LEN, MAX_USERNAME_LEN, PLACEHOLDER_BODY, PacketError, PacketType};
use crate::clock::unix_timestamp;

// ---- Public packet types ---------------------------------------------------

/// A chat line as it travels between peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    /// Unix seconds, set by the sending peer.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// Same as [`ChatMessage::new`], stamped with the current wall clock.
    pub fn now(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, content, unix_timestamp())
    }
}

/// Tagged payload carried inside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake,
    Message(ChatMessage),
    Config,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Handshake => PacketType::Handshake,
            Packet::Message(_) => PacketType::Message,
            Packet::Config => PacketType::Config,
        }
    }

    /// Exact number of bytes `serialize_into` will produce.
    pub fn encoded_len(&self) -> usize {
        match self {
            Packet::Handshake | Packet::Config => 2,
            Packet::Message(m) => 1 + 1 + m.sender.len() + 8 + 2 + m.content.len(),
        }
    }

    /// Write the packet into `dst`, returning the number of bytes used.
    pub fn serialize_into(&self, dst: &mut [u8]) -> Result<usize, PacketError> {
        if let Packet::Message(m) = self {
            check_field("sender", m.sender.len(), MAX_USERNAME_LEN)?;
            check_field("content", m.content.len(), MAX_MESSAGE_LEN)?;
        }

        let needed = self.encoded_len();
        if dst.len() < needed {
            return Err(PacketError::BufferTooSmall {
                needed,
                available: dst.len(),
            });
        }

        let mut w = Writer::new(dst);
        w.put_u8(self.packet_type().as_u8());
        match self {
            Packet::Handshake | Packet::Config => w.put_u8(PLACEHOLDER_BODY),
            Packet::Message(m) => {
                // Lengths were bounded by check_field above.
                w.put_u8(m.sender.len() as u8);
                w.put_bytes(m.sender.as_bytes());
                w.put_i64(m.timestamp);
                w.put_u16(m.content.len() as u16);
                w.put_bytes(m.content.as_bytes());
            }
        }
        Ok(w.written())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let mut out = vec![0u8; self.encoded_len()];
        let n = self.serialize_into(&mut out)?;
        out.truncate(n);
        Ok(out)
    }

    pub fn deserialize(src: &[u8]) -> Result<Packet, PacketError> {
        let mut cursor = Cursor::new(src);

        let packet = match PacketType::from_u8(cursor.get_u8()?)? {
            PacketType::Handshake => {
                cursor.get_u8()?;
                Packet::Handshake
            }
            PacketType::Config => {
                cursor.get_u8()?;
                Packet::Config
            }
            PacketType::Message => {
                let sender_len = cursor.get_u8()? as usize;
                let sender = cursor.get_str(sender_len, MAX_USERNAME_LEN)?.to_owned();
                let timestamp = cursor.get_i64()?;
                let content_len = cursor.get_u16()? as usize;
                let content = cursor.get_str(content_len, MAX_MESSAGE_LEN)?.to_owned();
                Packet::Message(ChatMessage {
                    sender,
                    content,
                    timestamp,
                })
            }
        };

        cursor.finish()?;
        Ok(packet)
    }
}

fn check_field(field: &'static str, actual: usize, max: usize) -> Result<(), PacketError> {
    if actual > max {
        return Err(PacketError::FieldTooLong { field, max, actual });
    }
    Ok(())
}

// ---- Writer over a pre-sized slice ------------------------------------------

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put_u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn put_u16(&mut self, v: u16) {
        LittleEndian::write_u16(&mut self.buf[self.pos..self.pos + 2], v);
        self.pos += 2;
    }

    fn put_i64(&mut self, v: i64) {
        LittleEndian::write_i64(&mut self.buf[self.pos..self.pos + 8], v);
        self.pos += 8;
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn written(&self) -> usize {
        self.pos
    }
}

// ---- Cursor for decoding -----------------------------------------------------

#[derive(Debug)]
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn get_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.get_fixed(1)?[0])
    }

    fn get_u16(&mut self) -> Result<u16, PacketError> {
        Ok(LittleEndian::read_u16(self.get_fixed(2)?))
    }

    fn get_i64(&mut self) -> Result<i64, PacketError> {
        Ok(LittleEndian::read_i64(self.get_fixed(8)?))
    }

    /// Fixed-width field; running short here means the source is truncated.
    fn get_fixed(&mut self, width: usize) -> Result<&'a [u8], PacketError> {
        if self.buf.len() < width {
            return Err(PacketError::BufferTooSmall {
                needed: width,
                available: self.buf.len(),
            });
        }
        self.get_bytes(width)
    }

    /// Variable-length field whose length was declared inside the packet.
    fn get_bytes(&mut self, len: usize) -> Result<&'a [u8], PacketError> {
        if self.buf.len() < len {
            return Err(PacketError::InvalidData("declared length exceeds remaining bytes"));
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    /// Length-checked UTF-8 field: remaining bytes first, then the field cap.
    fn get_str(&mut self, len: usize, max: usize) -> Result<&'a str, PacketError> {
        let bytes = self.get_bytes(len)?;
        if len > max {
            return Err(PacketError::InvalidData("field exceeds protocol maximum"));
        }
        str::from_utf8(bytes).map_err(|_| PacketError::InvalidData("field is not valid UTF-8"))
    }

    fn finish(self) -> Result<(), PacketError> {
        if !self.buf.is_empty() {
            Err(PacketError::InvalidData("trailing bytes in packet body"))
        } else {
            Ok(())
        }
    }
}
