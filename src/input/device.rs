//! A physical GIP device. Raw transfers from the transport are split into
//! frames and handed to the client each frame is addressed to.
use std::collections::HashMap;

use crate::drivers::gip::{
    command::CommandId,
    header::{CommandHeader, MIN_HEADER_SIZE},
    message::Message,
    XboxResult,
};

use super::{client::Client, mapping::MapperContext};

/// The outbound half of a transport channel
pub trait PacketSink: Send {
    /// Largest single transfer the channel accepts. Channels that cannot send
    /// report zero.
    fn max_packet_size(&self) -> usize;
    fn send_packet(&mut self, data: &[u8]) -> XboxResult;
}

/// Sink for channels that can only receive
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PacketSink for NullSink {
    fn max_packet_size(&self) -> usize {
        0
    }

    fn send_packet(&mut self, _data: &[u8]) -> XboxResult {
        XboxResult::Success
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Device<S: PacketSink> {
    name: String,
    sink: S,
    ctx: MapperContext,
    clients: HashMap<u8, Client>,
    inputs_enabled: bool,
    sequence: u8,
}

impl<S: PacketSink> Device<S> {
    pub fn new(name: impl Into<String>, sink: S, ctx: MapperContext) -> Self {
        Self {
            name: name.into(),
            sink,
            ctx,
            clients: HashMap::new(),
            inputs_enabled: false,
            sequence: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn client(&self, id: u8) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn inputs_enabled(&self) -> bool {
        self.inputs_enabled
    }

    pub fn enable_inputs(&mut self, enabled: bool) {
        if self.inputs_enabled != enabled {
            log::debug!(
                "{}: inputs {}",
                self.name,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.inputs_enabled = enabled;
        for client in self.clients.values_mut() {
            client.enable_inputs(enabled);
        }
    }

    fn log_packet(&self, direction: &str, frame: &[u8], header_len: usize) {
        if !self.ctx.settings.log_packets() {
            return;
        }
        let (header, payload) = frame.split_at(header_len.min(frame.len()));
        log::debug!(
            "{} {direction} [{}] {}",
            self.name,
            hex(header),
            hex(payload)
        );
    }

    /// Handle a raw transfer, which may hold several frames back to back.
    /// Stops at the first frame that could not be handled.
    pub fn handle_raw(&mut self, mut data: &[u8]) -> XboxResult {
        while !data.is_empty() {
            let (header, header_len) = match CommandHeader::decode(data) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::debug!("{}: invalid header: {e}", self.name);
                    return XboxResult::InvalidMessage;
                }
            };

            let Some(frame_len) = header_len.checked_add(header.data_length as usize) else {
                return XboxResult::InvalidMessage;
            };
            if data.len() < frame_len {
                log::debug!(
                    "{}: frame needs {frame_len} bytes, only {} available",
                    self.name,
                    data.len()
                );
                return XboxResult::InvalidMessage;
            }

            self.log_packet("<-", &data[..frame_len], header_len);
            let result = self.handle_frame(&header, &data[header_len..frame_len]);
            if result != XboxResult::Success {
                return result;
            }

            data = &data[frame_len..];
        }

        XboxResult::Success
    }

    /// Hand a single frame to its client, creating the client on first sight
    pub fn handle_frame(&mut self, header: &CommandHeader, payload: &[u8]) -> XboxResult {
        let inputs_enabled = self.inputs_enabled;
        let client = self
            .clients
            .entry(header.client)
            .or_insert_with(|| Client::new(header.client, self.ctx.clone(), inputs_enabled));

        let mut outbox = Vec::new();
        let result = client.handle_message(header, payload, &mut outbox);
        for message in outbox {
            self.send(message);
        }

        match result {
            XboxResult::Success | XboxResult::Pending => {}
            XboxResult::UnsupportedDevice => {
                if let Some(client) = self.clients.remove(&header.client) {
                    log::info!("{}: {} is not supported", self.name, client.label());
                }
                // Client 0 is the device itself
                if header.client == 0 {
                    return XboxResult::UnsupportedDevice;
                }
            }
            XboxResult::Disconnected => {
                if let Some(client) = self.clients.remove(&header.client) {
                    log::info!("{}: {} disconnected", self.name, client.label());
                }
            }
            XboxResult::InvalidMessage => {
                log::debug!("{}: dropped invalid message ({header})", self.name);
            }
        }

        XboxResult::Success
    }

    fn next_sequence(&mut self) -> u8 {
        // Sequence 0 is never used
        self.sequence = self.sequence.checked_add(1).unwrap_or(1);
        self.sequence
    }

    /// Encode and send a message as a single transfer
    pub fn send(&mut self, mut message: Message) -> XboxResult {
        let max_size = self.sink.max_packet_size();
        if max_size < MIN_HEADER_SIZE {
            return XboxResult::Success;
        }

        // Acknowledgements echo the sequence of the acknowledged frame
        if message.header().command_id != CommandId::Acknowledgement {
            let sequence = self.next_sequence();
            message.set_sequence(sequence);
        }

        let frame = match message.encode(max_size) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("{}: failed to encode message: {e}", self.name);
                return XboxResult::InvalidMessage;
            }
        };
        self.log_packet("->", &frame, message.header().encoded_len());
        self.sink.send_packet(&frame)
    }
}
