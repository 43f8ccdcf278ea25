use std::fmt;

use thiserror::Error;

use super::command::{CommandFlags, CommandId};

/// Smallest possible header: command, flags/client, sequence and a single
/// byte length.
pub const MIN_HEADER_SIZE: usize = 4;

/// Largest encoded varint for a 32-bit value
const MAX_VARINT_SIZE: usize = 5;

/// Possible errors encoding or decoding a frame header
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header requires at least {MIN_HEADER_SIZE} bytes, got {0}")]
    TooShort(usize),
    #[error("variable-length integer is truncated")]
    VarintTruncated,
    #[error("variable-length integer exceeds 32 bits")]
    VarintOverflow,
    #[error("client id {0} does not fit in 4 bits")]
    InvalidClientId(u8),
    #[error("data length {header} does not match payload length {payload}")]
    LengthMismatch { header: u32, payload: usize },
    #[error("frame of {len} bytes exceeds maximum transfer size of {max} bytes")]
    TooLarge { len: usize, max: usize },
}

/// Header prefixed to every frame on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command_id: CommandId,
    pub flags: CommandFlags,
    pub client: u8,
    pub sequence: u8,
    pub data_length: u32,
    /// Only present on the wire when [CommandFlags::CHUNK_PACKET] is set
    pub chunk_index: u32,
}

impl CommandHeader {
    pub fn new(command_id: CommandId, flags: CommandFlags) -> Self {
        Self {
            command_id,
            flags,
            client: 0,
            sequence: 0,
            data_length: 0,
            chunk_index: 0,
        }
    }

    /// Decode a header from the start of the given buffer. Returns the header
    /// and the number of bytes it occupied.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), HeaderError> {
        if buf.len() < MIN_HEADER_SIZE {
            return Err(HeaderError::TooShort(buf.len()));
        }

        let command_id = CommandId::from(buf[0]);
        let flags = CommandFlags::from_bits_retain(buf[1] & 0xF0);
        let client = buf[1] & 0x0F;
        let sequence = buf[2];

        let mut consumed = 3;
        let (data_length, len) = decode_varint(&buf[consumed..])?;
        consumed += len;

        let mut chunk_index = 0;
        if flags.contains(CommandFlags::CHUNK_PACKET) {
            let (index, len) = decode_varint(&buf[consumed..])?;
            chunk_index = index;
            consumed += len;
        }

        let header = Self {
            command_id,
            flags,
            client,
            sequence,
            data_length,
            chunk_index,
        };
        Ok((header, consumed))
    }

    /// Number of bytes this header occupies when encoded
    pub fn encoded_len(&self) -> usize {
        let mut len = 3 + varint_len(self.data_length);
        if self.flags.contains(CommandFlags::CHUNK_PACKET) {
            len += varint_len(self.chunk_index);
        }
        len
    }

    /// Append the encoded header to the given buffer
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), HeaderError> {
        if self.client > 0x0F {
            return Err(HeaderError::InvalidClientId(self.client));
        }

        buf.push(self.command_id.to_u8());
        buf.push((self.flags.bits() & 0xF0) | self.client);
        buf.push(self.sequence);
        encode_varint(self.data_length, buf);
        if self.flags.contains(CommandFlags::CHUNK_PACKET) {
            encode_varint(self.chunk_index, buf);
        }

        Ok(())
    }

    /// Encode a complete frame. Fails when `data_length` disagrees with the
    /// payload, or when the frame would not fit in a single transfer of
    /// `max_size` bytes.
    pub fn encode(&self, payload: &[u8], max_size: usize) -> Result<Vec<u8>, HeaderError> {
        if self.data_length as usize != payload.len() {
            return Err(HeaderError::LengthMismatch {
                header: self.data_length,
                payload: payload.len(),
            });
        }

        let len = self.encoded_len() + payload.len();
        if len > max_size {
            return Err(HeaderError::TooLarge { len, max: max_size });
        }

        let mut buf = Vec::with_capacity(len);
        self.encode_into(&mut buf)?;
        buf.extend_from_slice(payload);
        Ok(buf)
    }
}

impl fmt::Display for CommandHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command: {}, flags: {:?}, client: {}, sequence: {}, length: {}",
            self.command_id, self.flags, self.client, self.sequence, self.data_length
        )?;
        if self.flags.contains(CommandFlags::CHUNK_PACKET) {
            write!(f, ", chunk index: {}", self.chunk_index)?;
        }
        Ok(())
    }
}

/// Decode a base-128 varint. The high bit of each byte marks continuation.
pub fn decode_varint(buf: &[u8]) -> Result<(u32, usize), HeaderError> {
    let mut value: u64 = 0;
    for (i, byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_SIZE {
            return Err(HeaderError::VarintOverflow);
        }
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            let value = u32::try_from(value).map_err(|_| HeaderError::VarintOverflow)?;
            return Ok((value, i + 1));
        }
    }

    Err(HeaderError::VarintTruncated)
}

/// Append the base-128 varint encoding of the given value
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Number of bytes needed to encode the given value as a varint
pub fn varint_len(value: u32) -> usize {
    let mut len = 1;
    let mut value = value >> 7;
    while value != 0 {
        len += 1;
        value >>= 7;
    }
    len
}
