use std::sync::Arc;

use packed_struct::PackedStruct;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{Frets, GamepadButtons, GuitarInputReport, RiffmasterInputReport},
        XboxResult,
    },
    input::{
        mapping::{
            guitar::{self, GuitarMapper, TiltRange},
            riffmaster::{self, PickupCycle},
            value, DeviceMapper, MapperContext,
        },
        settings::{MappingMode, MappingSettings},
        target::{memory::MemoryTargets, xb360::X360Buttons, xb360::X360Report},
    },
};

fn context(targets: &MemoryTargets, mode: MappingMode) -> MapperContext {
    MapperContext {
        factory: Arc::new(targets.clone()),
        settings: Arc::new(MappingSettings::new(mode, false, 1.5, false)),
        map_guide_button: true,
        fallback_mapping: true,
    }
}

#[test]
fn test_pickup_switch_quantization() {
    let values: Vec<u8> = (0..=4).map(value::pickup_switch).collect();
    assert_eq!(values, vec![25, 76, 127, 178, 229]);
}

#[test]
fn test_pickup_switch_from_raw_report() {
    for (raw, expected) in [(0x00, 25), (0x10, 76), (0x20, 127), (0x30, 178), (0x40, 229)] {
        let input = GuitarInputReport {
            pickup_switch: raw,
            ..Default::default()
        };
        let mut report = X360Report::default();
        guitar::apply_xbox360(&mut report, &input, TiltRange::Positive);
        assert_eq!(report.left_trigger, expected, "raw pickup value {raw:#x}");
    }
}

#[test]
fn test_guitar_frets_and_axes() {
    let input = GuitarInputReport {
        buttons: (GamepadButtons::MENU | GamepadButtons::DPAD_DOWN).bits().into(),
        upper_frets: (Frets::GREEN | Frets::ORANGE).bits(),
        lower_frets: Frets::BLUE.bits(),
        whammy: 0xFF,
        tilt: 0x80,
        ..Default::default()
    };
    let mut report = X360Report::default();
    guitar::apply_xbox360(&mut report, &input, TiltRange::Positive);

    assert!(report.pressed(X360Buttons::START));
    assert!(report.pressed(X360Buttons::DPAD_DOWN));
    assert!(report.pressed(X360Buttons::A));
    assert!(report.pressed(X360Buttons::X));
    assert!(report.pressed(X360Buttons::LEFT_SHOULDER));
    assert!(report.pressed(X360Buttons::LEFT_THUMB));
    assert!(!report.pressed(X360Buttons::B));
    assert!(!report.pressed(X360Buttons::BACK));
    assert_eq!(report.thumb_rx, i16::MAX);
    assert_eq!(report.thumb_ry, 0x4040);

    guitar::apply_xbox360(&mut report, &input, TiltRange::Full);
    assert_eq!(report.thumb_ry, 0x0080);
}

#[test]
fn test_guitar_mapper_submits_reports() {
    let targets = MemoryTargets::new(1, 0);
    let mut mapper = GuitarMapper::new(&context(&targets, MappingMode::ViGEm))
        .expect("should create mapper");

    let input = GuitarInputReport {
        upper_frets: Frets::RED.bits(),
        ..Default::default()
    };
    let data = input.pack().expect("should pack report");
    assert_eq!(
        mapper.handle_message(CommandId::Input, &data),
        XboxResult::Success
    );
    let report = targets.last_xbox360_report(0).expect("should submit report");
    assert!(report.pressed(X360Buttons::B));

    // Short reports are rejected, other commands ignored
    assert_eq!(
        mapper.handle_message(CommandId::Input, &data[..10]),
        XboxResult::InvalidMessage
    );
    assert_eq!(
        mapper.handle_message(CommandId::Status, &[0x80]),
        XboxResult::Success
    );
}

#[test]
fn test_guitar_joystick_mapping() {
    let targets = MemoryTargets::new(0, 1);
    let mut mapper =
        GuitarMapper::new(&context(&targets, MappingMode::VJoy)).expect("should create mapper");

    let input = GuitarInputReport {
        buttons: GamepadButtons::OPTIONS.bits().into(),
        upper_frets: Frets::YELLOW.bits(),
        pickup_switch: 0x30,
        whammy: 0xFF,
        ..Default::default()
    };
    let data = input.pack().expect("should pack report");
    assert_eq!(
        mapper.handle_message(CommandId::Input, &data),
        XboxResult::Success
    );

    let state = targets.last_joystick_state(0).expect("should submit state");
    assert!(state.pressed(3));
    assert!(state.pressed(16));
    assert!(!state.pressed(1));
    assert_eq!(state.axis_x, 0x30 * 0x200);
    assert_eq!(state.axis_y, 0x7FFF);
}

#[test]
fn test_riffmaster_pickup_cycles_on_press() {
    let mut pickup = PickupCycle::default();
    assert_eq!(pickup.position(), 0);

    // Holding the button only advances once
    pickup.update(true);
    pickup.update(true);
    assert_eq!(pickup.position(), 1);

    for _ in 0..4 {
        pickup.update(false);
        pickup.update(true);
    }
    assert_eq!(pickup.position(), 0, "position should wrap after five presses");
}

#[test]
fn test_riffmaster_shadps4_tilt() {
    let mut input = RiffmasterInputReport::default();
    input.base.tilt = 0xFF;
    input.base.whammy = 0xFF;
    let mut report = X360Report::default();
    let mut pickup = PickupCycle::default();

    riffmaster::apply_shadps4(&mut report, &input, &mut pickup, 1.5);
    assert_eq!(report.thumb_ry, i16::MIN, "scaled tilt should clamp");
    assert_eq!(report.thumb_ly, 0x7FFF);
    assert_eq!(report.left_trigger, 25);

    riffmaster::apply_shadps4(&mut report, &input, &mut pickup, 0.5);
    assert_eq!(report.thumb_ry, -16384);
}

#[test]
fn test_riffmaster_joystick() {
    let input = RiffmasterInputReport {
        joystick_x: 1234.into(),
        joystick_y: (-1234).into(),
        joystick_click: true,
        ..Default::default()
    };
    let mut report = X360Report::default();
    riffmaster::apply_xbox360(&mut report, &input, TiltRange::Positive);
    assert_eq!(report.thumb_lx, 1234);
    assert_eq!(report.thumb_ly, -1234);
    assert!(report.pressed(X360Buttons::LEFT_THUMB));
}
