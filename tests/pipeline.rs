use std::sync::Arc;

use packed_struct::PackedStruct;
use uuid::Uuid;

use instrumentmapper::drivers::gip::{
    command::{CommandFlags, CommandId},
    descriptor::{Element, MIN_HEADER_LENGTH},
    guids,
    header::CommandHeader,
    hid_report::{DrumInputReport, Frets, GuitarInputReport},
    XboxResult,
};
use instrumentmapper::input::{
    device::{Device, NullSink},
    mapping::MapperContext,
    settings::{MappingMode, MappingSettings},
    target::{memory::MemoryTargets, xb360::X360Buttons},
};

fn context(targets: &MemoryTargets, mode: MappingMode) -> MapperContext {
    MapperContext {
        factory: Arc::new(targets.clone()),
        settings: Arc::new(MappingSettings::new(mode, false, 1.5, false)),
        map_guide_button: true,
        fallback_mapping: false,
    }
}

fn frame(command: CommandId, flags: CommandFlags, payload: &[u8]) -> Vec<u8> {
    let mut header = CommandHeader::new(command, flags);
    header.data_length = payload.len() as u32;
    header.encode(payload, usize::MAX).expect("should encode frame")
}

fn descriptor_frame(interface: Uuid) -> Vec<u8> {
    let mut data = vec![0u8; MIN_HEADER_LENGTH];
    data[0..2].copy_from_slice(&(MIN_HEADER_LENGTH as u16).to_le_bytes());
    let pos = 4 + Element::Interfaces as usize * 2;
    let offset = data.len() as u16;
    data[pos..pos + 2].copy_from_slice(&offset.to_le_bytes());
    data.push(1);
    data.extend_from_slice(&interface.to_bytes_le());
    frame(CommandId::Descriptor, CommandFlags::SYSTEM_COMMAND, &data)
}

fn red_pad_hit() -> Vec<u8> {
    let input = DrumInputReport {
        red_pad: 7.into(),
        ..Default::default()
    };
    let input = input.pack().expect("should pack report");
    frame(CommandId::Input, CommandFlags::empty(), &input)
}

fn guitar_frets(frets: Frets) -> Vec<u8> {
    let input = GuitarInputReport {
        upper_frets: frets.bits(),
        ..Default::default()
    };
    let input = input.pack().expect("should pack report");
    frame(CommandId::Input, CommandFlags::empty(), &input)
}

#[test]
fn test_capture_only_drums_as_joystick() {
    let targets = MemoryTargets::new(0, 1);
    let mut device = Device::new("capture", NullSink, context(&targets, MappingMode::VJoy));
    device.enable_inputs(true);

    let mut data = descriptor_frame(guids::MADCATZ_DRUMKIT);
    data.extend(red_pad_hit());
    assert_eq!(device.handle_raw(&data), XboxResult::Success);
    assert_eq!(targets.joysticks_acquired(), 1);

    let state = targets.last_joystick_state(0).expect("state should be submitted");
    assert!(state.pressed(1), "red pad should press button 1");

    // Input is dropped while capture is paused
    device.enable_inputs(false);
    let submitted = targets.joystick_states(0).len();
    device.handle_raw(&red_pad_hit());
    assert_eq!(targets.joystick_states(0).len(), submitted);

    drop(device);
    assert_eq!(targets.joysticks_acquired(), 0, "joystick should be released");
}

#[test]
fn test_devices_beyond_capacity_stay_unmapped() {
    let targets = MemoryTargets::new(1, 0);
    let mut first = Device::new("first", NullSink, context(&targets, MappingMode::ViGEm));
    let mut second = Device::new("second", NullSink, context(&targets, MappingMode::ViGEm));
    first.enable_inputs(true);
    second.enable_inputs(true);

    let descriptor = descriptor_frame(guids::PDP_GUITAR);
    assert_eq!(first.handle_raw(&descriptor), XboxResult::Success);
    assert_eq!(second.handle_raw(&descriptor), XboxResult::Success);
    assert!(first.client(0).and_then(|c| c.mapper()).is_some());
    assert!(second.client(0).and_then(|c| c.mapper()).is_none());

    // The unmapped device keeps running, its input goes nowhere
    assert_eq!(second.handle_raw(&guitar_frets(Frets::GREEN)), XboxResult::Success);
    assert_eq!(first.handle_raw(&guitar_frets(Frets::GREEN)), XboxResult::Success);
    assert_eq!(targets.xbox360_created(), 1);
    let report = targets.last_xbox360_report(0).expect("report should be submitted");
    assert!(report.pressed(X360Buttons::A));

    // Capacity freed by the first device is available again
    drop(first);
    let mut third = Device::new("third", NullSink, context(&targets, MappingMode::ViGEm));
    assert_eq!(third.handle_raw(&descriptor), XboxResult::Success);
    assert!(third.client(0).and_then(|c| c.mapper()).is_some());
}
