use super::command::{CommandFlags, CommandId, PowerMode};
use super::header::{CommandHeader, HeaderError};

/// A complete logical message. The header's data length always reflects the
/// payload, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: CommandHeader,
    payload: Vec<u8>,
}

impl Message {
    pub fn new(command_id: CommandId, flags: CommandFlags, payload: Vec<u8>) -> Self {
        let mut header = CommandHeader::new(command_id, flags);
        header.data_length = payload.len() as u32;
        Self { header, payload }
    }

    /// Build a message from an already-decoded header, e.g. one reassembled
    /// from chunks.
    pub fn from_parts(mut header: CommandHeader, payload: Vec<u8>) -> Self {
        header.data_length = payload.len() as u32;
        Self { header, payload }
    }

    pub fn header(&self) -> &CommandHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn set_client(&mut self, client: u8) {
        self.header.client = client;
    }

    pub fn set_sequence(&mut self, sequence: u8) {
        self.header.sequence = sequence;
    }

    /// Encode the message as a single frame no larger than `max_size`
    pub fn encode(&self, max_size: usize) -> Result<Vec<u8>, HeaderError> {
        self.header.encode(&self.payload, max_size)
    }

    /// System message asking the device to report its descriptor
    pub fn descriptor_request() -> Self {
        Self::new(
            CommandId::Descriptor,
            CommandFlags::SYSTEM_COMMAND,
            Vec::new(),
        )
    }

    pub fn power_mode(mode: PowerMode) -> Self {
        Self::new(
            CommandId::PowerMode,
            CommandFlags::SYSTEM_COMMAND,
            vec![mode as u8],
        )
    }

    /// Acknowledge the given frame. `received` is the number of bytes
    /// accumulated so far and `remaining` the number still outstanding.
    pub fn acknowledge(header: &CommandHeader, received: u16, remaining: u16) -> Self {
        let mut payload = Vec::with_capacity(9);
        payload.push(0x00);
        payload.push(header.command_id.to_u8());
        payload.push((header.flags & CommandFlags::SYSTEM_COMMAND).bits() | header.client);
        payload.extend_from_slice(&received.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        payload.extend_from_slice(&remaining.to_le_bytes());

        let mut msg = Self::new(
            CommandId::Acknowledgement,
            CommandFlags::SYSTEM_COMMAND,
            payload,
        );
        msg.header.client = header.client;
        msg.header.sequence = header.sequence;
        msg
    }

    /// Ask a wireless legacy adapter for the devices currently connected
    pub fn request_devices() -> Self {
        Self::new(
            CommandId::WirelessLegacyRequestDevices,
            CommandFlags::empty(),
            Vec::new(),
        )
    }
}
