use std::fmt;

use bitflags::bitflags;

/// Command identifiers found in byte 0 of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Acknowledgement,
    Arrival,
    Status,
    Descriptor,
    PowerMode,
    Authentication,
    Keystroke,
    SerialNumber,
    Input,
    GhlInput,
    WirelessLegacyRequestDevices,
    Other(u8),
}

impl CommandId {
    pub fn to_u8(&self) -> u8 {
        match self {
            CommandId::Acknowledgement => 0x01,
            CommandId::Arrival => 0x02,
            CommandId::Status => 0x03,
            CommandId::Descriptor => 0x04,
            CommandId::PowerMode => 0x05,
            CommandId::Authentication => 0x06,
            CommandId::Keystroke => 0x07,
            CommandId::SerialNumber => 0x1E,
            CommandId::Input => 0x20,
            CommandId::GhlInput => 0x21,
            CommandId::WirelessLegacyRequestDevices => 0x24,
            CommandId::Other(value) => *value,
        }
    }
}

impl From<u8> for CommandId {
    fn from(value: u8) -> Self {
        match value {
            0x01 => CommandId::Acknowledgement,
            0x02 => CommandId::Arrival,
            0x03 => CommandId::Status,
            0x04 => CommandId::Descriptor,
            0x05 => CommandId::PowerMode,
            0x06 => CommandId::Authentication,
            0x07 => CommandId::Keystroke,
            0x1E => CommandId::SerialNumber,
            0x20 => CommandId::Input,
            0x21 => CommandId::GhlInput,
            0x24 => CommandId::WirelessLegacyRequestDevices,
            value => CommandId::Other(value),
        }
    }
}

impl From<CommandId> for u8 {
    fn from(value: CommandId) -> Self {
        value.to_u8()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02X})", self, self.to_u8())
    }
}

bitflags! {
    /// Flags stored in the high nibble of header byte 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandFlags: u8 {
        const NEEDS_ACKNOWLEDGEMENT = 0x10;
        const SYSTEM_COMMAND = 0x20;
        const CHUNK_START = 0x40;
        const CHUNK_PACKET = 0x80;
    }
}

/// Values carried by a [CommandId::PowerMode] message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    On = 0x00,
    Off = 0x04,
    Reset = 0x07,
}
