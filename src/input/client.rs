//! One logical client of a GIP device. Clients reassemble chunked messages,
//! keep track of the identity the device reports and own the mapper bound
//! to them.
use std::collections::HashMap;

use packed_struct::types::SizedInteger;

use crate::drivers::gip::{
    command::{CommandFlags, CommandId, PowerMode},
    descriptor::Descriptor,
    header::CommandHeader,
    hid_report::{Arrival, DeviceStatus, Keystroke, Report, KEYSTROKE_SIZE},
    message::Message,
    XboxResult,
};

use super::mapping::{
    resolver::{self, DeviceIdentity, ResolveError},
    Mapper, MapperContext, MapperKind,
};

/// Partially received chunked message
#[derive(Debug)]
struct ChunkBuffer {
    data: Vec<u8>,
    /// Bytes received so far. Chunks arrive in order, so this is also the
    /// offset of the next chunk.
    received: usize,
}

impl ChunkBuffer {
    fn remaining(&self) -> usize {
        self.data.len() - self.received
    }

    fn is_complete(&self) -> bool {
        self.received == self.data.len()
    }
}

/// Outcome of feeding one chunk to the reassembler
enum Chunk {
    /// More chunks are needed
    Incomplete { received: usize, remaining: usize },
    Complete(Vec<u8>),
    /// Trailing empty chunk after a completed message
    Ignored,
}

pub struct Client {
    id: u8,
    ctx: MapperContext,
    arrival: Option<Arrival>,
    status: Option<DeviceStatus>,
    descriptor: Option<Descriptor>,
    mapper: Option<Mapper>,
    chunks: HashMap<CommandId, ChunkBuffer>,
    inputs_enabled: bool,
}

impl Client {
    pub fn new(id: u8, ctx: MapperContext, inputs_enabled: bool) -> Self {
        log::debug!("Created client {id}");
        Self {
            id,
            ctx,
            arrival: None,
            status: None,
            descriptor: None,
            mapper: None,
            chunks: HashMap::new(),
            inputs_enabled,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn arrival(&self) -> Option<&Arrival> {
        self.arrival.as_ref()
    }

    pub fn status(&self) -> Option<&DeviceStatus> {
        self.status.as_ref()
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_ref()
    }

    pub fn mapper(&self) -> Option<&Mapper> {
        self.mapper.as_ref()
    }

    /// Human readable name for log messages. Clients that never sent an
    /// arrival message are labelled with their legacy id if one is known.
    pub fn label(&self) -> String {
        if let Some(arrival) = self.arrival.as_ref() {
            return arrival.serial_string();
        }
        if let Some(MapperKind::Fallback(fallback)) = self.mapper.as_ref().map(Mapper::kind) {
            if let Some(id) = fallback.legacy_id() {
                return id.iter().map(|b| format!("{b:02X}")).collect();
            }
        }
        format!("client {}", self.id)
    }

    pub fn enable_inputs(&mut self, enabled: bool) {
        self.inputs_enabled = enabled;
        if let Some(mapper) = self.mapper.as_mut() {
            mapper.enable_inputs(enabled);
        }
    }

    /// Handle one frame addressed to this client. Messages that should be
    /// sent back to the device are pushed onto `outbox`.
    pub fn handle_message(
        &mut self,
        header: &CommandHeader,
        payload: &[u8],
        outbox: &mut Vec<Message>,
    ) -> XboxResult {
        if !header.flags.contains(CommandFlags::CHUNK_PACKET) {
            if header.flags.contains(CommandFlags::NEEDS_ACKNOWLEDGEMENT) {
                self.acknowledge(header, payload.len(), 0, outbox);
            }
            return self.dispatch(header.command_id, payload, outbox);
        }

        match self.reassemble(header, payload) {
            Ok(Chunk::Incomplete {
                received,
                remaining,
            }) => {
                if header.flags.contains(CommandFlags::NEEDS_ACKNOWLEDGEMENT) {
                    self.acknowledge(header, received, remaining, outbox);
                }
                XboxResult::Pending
            }
            Ok(Chunk::Complete(message)) => {
                if header.flags.contains(CommandFlags::NEEDS_ACKNOWLEDGEMENT) {
                    self.acknowledge(header, message.len(), 0, outbox);
                }
                self.dispatch(header.command_id, &message, outbox)
            }
            Ok(Chunk::Ignored) => XboxResult::Success,
            Err(()) => XboxResult::InvalidMessage,
        }
    }

    fn acknowledge(
        &self,
        header: &CommandHeader,
        received: usize,
        remaining: usize,
        outbox: &mut Vec<Message>,
    ) {
        let received = u16::try_from(received).unwrap_or(u16::MAX);
        let remaining = u16::try_from(remaining).unwrap_or(u16::MAX);
        outbox.push(Message::acknowledge(header, received, remaining));
    }

    /// Add a chunk to the reassembly buffer for its command. The first chunk
    /// carries the total message length in its chunk index; later chunks
    /// carry their offset, which must follow the bytes received so far.
    /// Repeated chunks are acknowledged again without being copied.
    fn reassemble(&mut self, header: &CommandHeader, payload: &[u8]) -> Result<Chunk, ()> {
        let index = header.chunk_index as usize;

        if header.flags.contains(CommandFlags::CHUNK_START) {
            if self.chunks.remove(&header.command_id).is_some() {
                log::debug!(
                    "Client {}: restarting chunked {} message",
                    self.id,
                    header.command_id
                );
            }
            if payload.len() > index {
                log::debug!(
                    "Client {}: first chunk of {} bytes exceeds total of {index}",
                    self.id,
                    payload.len()
                );
                return Err(());
            }
            let mut data = vec![0u8; index];
            data[..payload.len()].copy_from_slice(payload);
            let buffer = ChunkBuffer {
                data,
                received: payload.len(),
            };
            return Ok(self.finish_chunk(header.command_id, buffer));
        }

        let Some(mut buffer) = self.chunks.remove(&header.command_id) else {
            if payload.is_empty() {
                return Ok(Chunk::Ignored);
            }
            log::debug!(
                "Client {}: chunk for {} without a chunk start",
                self.id,
                header.command_id
            );
            return Err(());
        };

        let end = index + payload.len();
        if end > buffer.data.len() {
            log::debug!(
                "Client {}: chunk at {index} with {} bytes exceeds total of {}",
                self.id,
                payload.len(),
                buffer.data.len()
            );
            return Err(());
        }
        if index != buffer.received {
            if end <= buffer.received {
                log::trace!(
                    "Client {}: repeated chunk at {index} for {}",
                    self.id,
                    header.command_id
                );
                return Ok(self.finish_chunk(header.command_id, buffer));
            }
            log::debug!(
                "Client {}: chunk at {index} for {} out of order, expected {}",
                self.id,
                header.command_id,
                buffer.received
            );
            self.chunks.insert(header.command_id, buffer);
            return Err(());
        }
        buffer.data[index..end].copy_from_slice(payload);
        buffer.received = end;
        Ok(self.finish_chunk(header.command_id, buffer))
    }

    fn finish_chunk(&mut self, command: CommandId, buffer: ChunkBuffer) -> Chunk {
        if buffer.is_complete() {
            return Chunk::Complete(buffer.data);
        }
        let chunk = Chunk::Incomplete {
            received: buffer.received,
            remaining: buffer.remaining(),
        };
        self.chunks.insert(command, buffer);
        chunk
    }

    /// Handle a complete message
    fn dispatch(&mut self, command: CommandId, data: &[u8], outbox: &mut Vec<Message>) -> XboxResult {
        match command {
            CommandId::Arrival => self.handle_arrival(data, outbox),
            CommandId::Status => self.handle_status(data),
            CommandId::Descriptor => self.handle_descriptor(data, outbox),
            CommandId::Keystroke => self.handle_keystroke(data),
            CommandId::Input | CommandId::GhlInput => match self.mapper.as_mut() {
                Some(mapper) => mapper.handle_message(command, data),
                None => XboxResult::Pending,
            },
            _ => match self.mapper.as_mut() {
                Some(mapper) => mapper.handle_message(command, data),
                None => XboxResult::Success,
            },
        }
    }

    fn handle_arrival(&mut self, data: &[u8], outbox: &mut Vec<Message>) -> XboxResult {
        let arrival = match Arrival::read(data) {
            Ok(arrival) => arrival,
            Err(e) => {
                log::debug!("Client {}: invalid arrival: {e}", self.id);
                return XboxResult::InvalidMessage;
            }
        };
        log::info!(
            "Client {} arrived: serial {}, device {:04x}:{:04x}, firmware {}",
            self.id,
            arrival.serial_string(),
            arrival.vendor_id.to_primitive(),
            arrival.product_id.to_primitive(),
            arrival.firmware_version,
        );
        self.arrival = Some(arrival);

        let mut request = Message::descriptor_request();
        request.set_client(self.id);
        outbox.push(request);
        XboxResult::Success
    }

    fn handle_status(&mut self, data: &[u8]) -> XboxResult {
        let status = match DeviceStatus::read(data) {
            Ok(status) => status,
            Err(e) => {
                log::debug!("Client {}: invalid status: {e}", self.id);
                return XboxResult::InvalidMessage;
            }
        };
        if !status.connected() {
            return XboxResult::Disconnected;
        }
        if self.status.as_ref() != Some(&status) {
            log::debug!(
                "Client {}: battery {:?} at level {:?}",
                self.id,
                status.battery_type,
                status.battery_level
            );
        }
        self.status = Some(status);
        XboxResult::Success
    }

    fn handle_descriptor(&mut self, data: &[u8], outbox: &mut Vec<Message>) -> XboxResult {
        // Devices resend their descriptor if the request is repeated
        if self.mapper.is_some() {
            return XboxResult::Success;
        }

        let descriptor = match Descriptor::parse(data) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::debug!("Client {}: invalid descriptor: {e}", self.id);
                return XboxResult::InvalidMessage;
            }
        };
        log::debug!(
            "Client {}: classes {:?}, interfaces {:?}",
            self.id,
            descriptor.classes,
            descriptor.interfaces
        );

        let identity = self.arrival.as_ref().map(|arrival| DeviceIdentity {
            vendor_id: arrival.vendor_id.to_primitive(),
            product_id: arrival.product_id.to_primitive(),
        });
        let result = resolver::resolve(&descriptor.interfaces, identity, &self.ctx);
        self.descriptor = Some(descriptor);

        let resolution = match result {
            Ok(resolution) => resolution,
            Err(ResolveError::CreateFailed(e)) => {
                log::error!("Client {}: failed to create mapper: {e}", self.id);
                return XboxResult::Success;
            }
            Err(e) => {
                log::debug!("Client {}: {e}", self.id);
                return XboxResult::UnsupportedDevice;
            }
        };
        if resolution.capacity_exhausted {
            log::warn!(
                "No more virtual controllers are available, further devices will not be mapped"
            );
        }

        let mut mapper = resolution.mapper;
        mapper.enable_inputs(self.inputs_enabled);
        log::info!("Client {} mapped as {}", self.id, mapper.name());

        let mut power_on = Message::power_mode(PowerMode::On);
        power_on.set_client(self.id);
        outbox.push(power_on);
        for mut message in mapper.initial_messages() {
            message.set_client(self.id);
            outbox.push(message);
        }
        self.mapper = Some(mapper);
        XboxResult::Success
    }

    fn handle_keystroke(&mut self, data: &[u8]) -> XboxResult {
        let Some(mapper) = self.mapper.as_mut() else {
            return XboxResult::Success;
        };
        for chunk in data.chunks_exact(KEYSTROKE_SIZE) {
            let key = match Keystroke::read(chunk) {
                Ok(key) => key,
                Err(e) => {
                    log::debug!("Client {}: invalid keystroke: {e}", self.id);
                    return XboxResult::InvalidMessage;
                }
            };
            mapper.handle_keystroke(&key);
        }
        XboxResult::Success
    }
}
