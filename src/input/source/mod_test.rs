use std::{collections::VecDeque, io, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    drivers::gip::{
        command::{CommandFlags, CommandId, PowerMode},
        descriptor::{Element, MIN_HEADER_LENGTH},
        header::CommandHeader,
        XboxResult,
    },
    input::{
        device::{Device, NullSink, PacketSink},
        mapping::MapperContext,
        settings::MappingSettings,
        target::memory::MemoryTargets,
    },
};

use super::{
    run_device, run_read_loop, ChannelError, DeviceMap, LoopExit, PacketSource, ReadControl,
};

type ReadResult = Result<Option<Vec<u8>>, ChannelError>;

/// Source replaying scripted reads, then asking the loop to stop
struct ScriptedSource {
    reads: VecDeque<ReadResult>,
    control: Arc<ReadControl>,
}

impl ScriptedSource {
    fn new(reads: Vec<ReadResult>, control: Arc<ReadControl>) -> Self {
        Self {
            reads: reads.into(),
            control,
        }
    }
}

impl PacketSource for ScriptedSource {
    fn read_packet(&mut self) -> ReadResult {
        match self.reads.pop_front() {
            Some(result) => result,
            None => {
                self.control.request_stop();
                Ok(None)
            }
        }
    }
}

fn failure() -> ReadResult {
    Err(ChannelError::Io(io::Error::other("pipe error")))
}

fn status_frame() -> ReadResult {
    let mut header = CommandHeader::new(CommandId::Status, CommandFlags::SYSTEM_COMMAND);
    header.data_length = 4;
    let frame = header
        .encode(&[0xC0, 0, 0, 0], usize::MAX)
        .expect("should encode frame");
    Ok(Some(frame))
}

/// Sink keeping every frame the device sent
#[derive(Clone, Default)]
struct RecordingSink {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PacketSink for RecordingSink {
    fn max_packet_size(&self) -> usize {
        64
    }

    fn send_packet(&mut self, data: &[u8]) -> XboxResult {
        self.sent.lock().push(data.to_vec());
        XboxResult::Success
    }
}

impl RecordingSink {
    /// Power modes sent, in order
    fn power_modes(&self) -> Vec<u8> {
        self.sent
            .lock()
            .iter()
            .filter(|frame| frame[0] == CommandId::PowerMode.to_u8())
            .filter_map(|frame| frame.last().copied())
            .collect()
    }
}

/// Descriptor of a client exposing a single unknown interface
fn unknown_descriptor_frame() -> ReadResult {
    let mut data = vec![0u8; MIN_HEADER_LENGTH];
    data[0..2].copy_from_slice(&(MIN_HEADER_LENGTH as u16).to_le_bytes());
    let pos = 4 + Element::Interfaces as usize * 2;
    data[pos..pos + 2].copy_from_slice(&(MIN_HEADER_LENGTH as u16).to_le_bytes());
    data.push(1);
    data.extend_from_slice(&Uuid::from_u128(0x1234).to_bytes_le());

    let mut header = CommandHeader::new(CommandId::Descriptor, CommandFlags::SYSTEM_COMMAND);
    header.data_length = data.len() as u32;
    let frame = header
        .encode(&data, usize::MAX)
        .expect("should encode frame");
    Ok(Some(frame))
}

fn context(targets: &MemoryTargets) -> MapperContext {
    MapperContext {
        factory: Arc::new(targets.clone()),
        settings: Arc::new(MappingSettings::default()),
        map_guide_button: true,
        fallback_mapping: false,
    }
}

fn device(targets: &MemoryTargets) -> Device<NullSink> {
    Device::new("test", NullSink, context(targets))
}

#[test]
fn test_two_failures_then_success_keeps_reading() {
    let targets = MemoryTargets::new(1, 0);
    let mut device = device(&targets);
    let control = Arc::new(ReadControl::new(false));
    let mut source =
        ScriptedSource::new(vec![failure(), failure(), status_frame()], control.clone());

    let exit = run_read_loop(&mut device, &mut source, &control);
    assert_eq!(exit, LoopExit::Stopped);
    assert_eq!(device.client_count(), 1, "frame after retries should be handled");
}

#[test]
fn test_three_failures_fail_the_channel() {
    let targets = MemoryTargets::new(1, 0);
    let mut device = device(&targets);
    let control = Arc::new(ReadControl::new(false));
    let mut source = ScriptedSource::new(
        vec![failure(), failure(), failure(), status_frame()],
        control.clone(),
    );

    let exit = run_read_loop(&mut device, &mut source, &control);
    assert_eq!(exit, LoopExit::Failed);
    assert_eq!(device.client_count(), 0);
}

#[test]
fn test_failures_are_counted_consecutively() {
    let targets = MemoryTargets::new(1, 0);
    let mut device = device(&targets);
    let control = Arc::new(ReadControl::new(false));
    let reads = vec![
        failure(),
        failure(),
        Ok(None),
        failure(),
        failure(),
        status_frame(),
    ];
    let mut source = ScriptedSource::new(reads, control.clone());

    assert_eq!(
        run_read_loop(&mut device, &mut source, &control),
        LoopExit::Stopped
    );
}

#[test]
fn test_disconnect_ends_loop_immediately() {
    let targets = MemoryTargets::new(1, 0);
    let mut device = device(&targets);
    let control = Arc::new(ReadControl::new(false));
    let mut source = ScriptedSource::new(
        vec![Err(ChannelError::Disconnected), status_frame()],
        control.clone(),
    );

    assert_eq!(
        run_read_loop(&mut device, &mut source, &control),
        LoopExit::Disconnected
    );
}

#[test]
fn test_inputs_flag_applied_on_next_iteration() {
    let targets = MemoryTargets::new(1, 0);
    let mut device = device(&targets);
    let control = Arc::new(ReadControl::new(true));
    assert!(!device.inputs_enabled());

    let mut source = ScriptedSource::new(vec![Ok(None)], control.clone());
    run_read_loop(&mut device, &mut source, &control);
    assert!(device.inputs_enabled());
}

#[test]
fn test_device_map_updates_count() {
    let (count, rx) = watch::channel(0);
    let first: DeviceMap<&str, u32> = DeviceMap::new(count.clone());
    let second: DeviceMap<&str, u32> = DeviceMap::new(count);

    assert!(first.insert_with("a", || Some(1)));
    assert!(!first.insert_with("a", || Some(2)), "key already present");
    assert!(!first.insert_with("b", || None), "creation declined");
    assert!(second.insert_with("a", || Some(3)));
    assert_eq!(*rx.borrow(), 2);

    assert_eq!(first.remove(&"a"), Some(1));
    assert_eq!(first.remove(&"a"), None);
    assert_eq!(*rx.borrow(), 1);

    assert!(second.insert_with("b", || Some(4)));
    let mut drained = second.drain();
    drained.sort();
    assert_eq!(drained, vec![3, 4]);
    assert_eq!(*rx.borrow(), 0);
    assert!(second.is_empty());
}

#[test]
fn test_stopped_device_is_reset() {
    let targets = MemoryTargets::new(1, 0);
    let control = Arc::new(ReadControl::new(true));
    let mut source = ScriptedSource::new(vec![status_frame(), Ok(None)], control.clone());
    let sink = RecordingSink::default();

    let exit = run_device("test", &mut source, sink.clone(), context(&targets), &control);
    assert_eq!(exit, LoopExit::Stopped);
    assert_eq!(sink.power_modes(), vec![PowerMode::Reset as u8]);
}

#[test]
fn test_unsupported_device_is_powered_off() {
    let targets = MemoryTargets::new(1, 0);
    let control = Arc::new(ReadControl::new(true));
    let mut source = ScriptedSource::new(
        vec![unknown_descriptor_frame(), status_frame()],
        control.clone(),
    );
    let sink = RecordingSink::default();

    let exit = run_device("test", &mut source, sink.clone(), context(&targets), &control);
    assert_eq!(exit, LoopExit::Unsupported);
    assert_eq!(sink.power_modes(), vec![PowerMode::Off as u8]);
    assert_eq!(source.reads.len(), 1, "nothing read after the abort");
}

#[test]
fn test_lost_device_is_left_alone() {
    let targets = MemoryTargets::new(1, 0);
    let control = Arc::new(ReadControl::new(true));
    let sink = RecordingSink::default();

    let mut source = ScriptedSource::new(vec![Err(ChannelError::Disconnected)], control.clone());
    let exit = run_device("test", &mut source, sink.clone(), context(&targets), &control);
    assert_eq!(exit, LoopExit::Disconnected);

    let mut source = ScriptedSource::new(vec![failure(), failure(), failure()], control.clone());
    let exit = run_device("test", &mut source, sink.clone(), context(&targets), &control);
    assert_eq!(exit, LoopExit::Failed);

    assert!(sink.power_modes().is_empty());
}
