//! Parser for the payload of a [super::command::CommandId::Descriptor]
//! message. The payload begins with a fixed header holding a table of
//! little-endian offsets, each pointing at a counted element list.
use thiserror::Error;
use uuid::Uuid;

/// Offset of the element offset table within the descriptor header
const OFFSET_TABLE_START: usize = 4;
/// Number of entries in the offset table
const OFFSET_TABLE_LEN: usize = 8;
/// Descriptor headers must at least hold the offset table
pub const MIN_HEADER_LENGTH: usize = OFFSET_TABLE_START + OFFSET_TABLE_LEN * 2;

const GUID_SIZE: usize = 16;

/// Elements referenced by the descriptor offset table, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    ExternalCommands = 0,
    FirmwareVersions = 1,
    AudioFormats = 2,
    InputCommands = 3,
    OutputCommands = 4,
    Classes = 5,
    Interfaces = 6,
    HidDescriptor = 7,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("descriptor is {0} bytes, too short for its header")]
    TooShort(usize),
    #[error("descriptor header length {0} is invalid")]
    InvalidHeaderLength(u16),
    #[error("{element:?} offset {offset} is outside the descriptor")]
    OffsetOutOfRange { element: Element, offset: usize },
    #[error("{element:?} element is truncated")]
    Truncated { element: Element },
    #[error("class name is not valid UTF-8")]
    InvalidClassName,
}

/// Decoded device descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Command ids the device sends
    pub input_commands: Vec<u8>,
    /// Command ids the device accepts
    pub output_commands: Vec<u8>,
    /// Class names, e.g. "Windows.Xbox.Input.Gamepad"
    pub classes: Vec<String>,
    /// Capability identifiers in the order they were advertised
    pub interfaces: Vec<Uuid>,
}

impl Descriptor {
    pub fn parse(data: &[u8]) -> Result<Self, DescriptorError> {
        if data.len() < MIN_HEADER_LENGTH {
            return Err(DescriptorError::TooShort(data.len()));
        }
        let header_length = u16::from_le_bytes([data[0], data[1]]);
        if (header_length as usize) < MIN_HEADER_LENGTH || header_length as usize > data.len() {
            return Err(DescriptorError::InvalidHeaderLength(header_length));
        }

        let mut descriptor = Descriptor::default();

        if let Some(body) = element(data, Element::InputCommands)? {
            descriptor.input_commands = bytes_list(body, Element::InputCommands)?;
        }
        if let Some(body) = element(data, Element::OutputCommands)? {
            descriptor.output_commands = bytes_list(body, Element::OutputCommands)?;
        }
        if let Some(body) = element(data, Element::Classes)? {
            descriptor.classes = class_list(body)?;
        }
        if let Some(body) = element(data, Element::Interfaces)? {
            descriptor.interfaces = guid_list(body)?;
        }

        Ok(descriptor)
    }
}

/// Returns the bytes starting at the given element, or None if the element
/// is absent (offset of zero).
fn element(data: &[u8], element: Element) -> Result<Option<&[u8]>, DescriptorError> {
    let pos = OFFSET_TABLE_START + element as usize * 2;
    let offset = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
    if offset == 0 {
        return Ok(None);
    }
    if offset >= data.len() {
        return Err(DescriptorError::OffsetOutOfRange { element, offset });
    }
    Ok(Some(&data[offset..]))
}

/// A count byte followed by that many single-byte items
fn bytes_list(body: &[u8], element: Element) -> Result<Vec<u8>, DescriptorError> {
    let count = body[0] as usize;
    body.get(1..1 + count)
        .map(|items| items.to_vec())
        .ok_or(DescriptorError::Truncated { element })
}

/// A count byte followed by length-prefixed strings
fn class_list(body: &[u8]) -> Result<Vec<String>, DescriptorError> {
    let truncated = DescriptorError::Truncated {
        element: Element::Classes,
    };
    let count = body[0] as usize;
    let mut classes = Vec::with_capacity(count);
    let mut pos = 1;
    for _ in 0..count {
        let len_bytes = body.get(pos..pos + 2).ok_or(truncated.clone())?;
        let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        pos += 2;
        let name = body.get(pos..pos + len).ok_or(truncated.clone())?;
        let name = std::str::from_utf8(name).map_err(|_| DescriptorError::InvalidClassName)?;
        classes.push(name.to_string());
        pos += len;
    }
    Ok(classes)
}

/// A count byte followed by GUIDs in their little-endian wire layout
fn guid_list(body: &[u8]) -> Result<Vec<Uuid>, DescriptorError> {
    let count = body[0] as usize;
    let items = body
        .get(1..1 + count * GUID_SIZE)
        .ok_or(DescriptorError::Truncated {
            element: Element::Interfaces,
        })?;

    let guids = items
        .chunks_exact(GUID_SIZE)
        .map(|chunk| {
            let mut bytes = [0u8; GUID_SIZE];
            bytes.copy_from_slice(chunk);
            Uuid::from_bytes_le(bytes)
        })
        .collect();
    Ok(guids)
}
