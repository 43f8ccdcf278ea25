use packed_struct::types::SizedInteger;

use crate::drivers::gip::hid_report::{
    legacy_id, Arrival, BatteryLevel, BatteryType, DeviceStatus, DrumInputReport, Frets,
    GamepadButtons, GamepadInputReport, GhlInputReport, GuitarInputReport, Keystroke, Report,
    ReportError, RiffmasterInputReport, DRUM_REPORT_SIZE, GUITAR_REPORT_SIZE,
};

#[test]
fn test_guitar_report() {
    let mut data = [0u8; GUITAR_REPORT_SIZE];
    // Menu + green on the upper frets, orange on the lower frets
    data[0] = 0x04;
    data[2] = 0x70;
    data[3] = 0xFF;
    data[4] = 0x20;
    data[5] = 0x01;
    data[6] = 0x10;

    let report = GuitarInputReport::read(&data).expect("should unpack guitar report");
    assert_eq!(report.buttons(), GamepadButtons::MENU);
    assert_eq!(report.tilt, 0x70);
    assert_eq!(report.whammy, 0xFF);
    assert_eq!(report.pickup_position(), 2);
    assert_eq!(report.frets(), Frets::GREEN | Frets::ORANGE);
    assert!(report.lower_frets_pressed());
}

#[test]
fn test_drum_report_nibbles() {
    let mut data = [0u8; DRUM_REPORT_SIZE];
    // Kick one, red pad 0x7 / yellow pad 0x1, blue pad 0x0 / green pad
    // 0xF, yellow cymbal 0x3 / blue cymbal 0x0, green cymbal 0xA
    data[1] = 0x10;
    data[2] = 0x71;
    data[3] = 0x0F;
    data[4] = 0x30;
    data[5] = 0xA0;

    let report = DrumInputReport::read(&data).expect("should unpack drum report");
    assert!(report.buttons().contains(GamepadButtons::KICK_ONE));
    assert_eq!(report.red_pad.to_primitive(), 0x7);
    assert_eq!(report.yellow_pad.to_primitive(), 0x1);
    assert_eq!(report.blue_pad.to_primitive(), 0x0);
    assert_eq!(report.green_pad.to_primitive(), 0xF);
    assert_eq!(report.yellow_cymbal.to_primitive(), 0x3);
    assert_eq!(report.blue_cymbal.to_primitive(), 0x0);
    assert_eq!(report.green_cymbal.to_primitive(), 0xA);
}

#[test]
fn test_gamepad_report() {
    let data = [
        0x10, 0x00, 0xFF, 0x03, 0x00, 0x00, 0x00, 0x80, 0xFF, 0x7F, 0x00, 0x00, 0x00, 0x00,
    ];
    let report = GamepadInputReport::read_exact(&data).expect("should unpack gamepad report");
    assert_eq!(report.buttons(), GamepadButtons::A);
    assert_eq!(report.left_trigger.to_primitive(), 1023);
    assert_eq!(report.left_stick_x.to_primitive(), i16::MIN);
    assert_eq!(report.left_stick_y.to_primitive(), i16::MAX);
}

#[test]
fn test_riffmaster_report() {
    let mut data = [0u8; 48];
    data[5] = 0x02;
    data[40..42].copy_from_slice(&(-1234i16).to_le_bytes());
    data[42..44].copy_from_slice(&4321i16.to_le_bytes());
    data[44] = 0x01;

    let report = RiffmasterInputReport::read(&data).expect("should unpack riffmaster report");
    assert_eq!(report.base.frets(), Frets::RED);
    assert_eq!(report.joystick_x.to_primitive(), -1234);
    assert_eq!(report.joystick_y.to_primitive(), 4321);
    assert!(report.joystick_click);
}

#[test]
fn test_ghl_report_exact_size() {
    let data = [0x09, 0x00, 0xFF, 0x00, 0x80, 0x40, 0x04, 0x00];
    let report = GhlInputReport::read_exact(&data).expect("should unpack ghl report");
    assert!(report.strum_down());
    assert!(!report.strum_up());
    assert_eq!(report.buttons(), GamepadButtons::MENU);

    let result = GhlInputReport::read_exact(&data[..7]);
    assert!(matches!(
        result,
        Err(ReportError::InvalidLength {
            expected: 8,
            actual: 7
        })
    ));
}

#[test]
fn test_short_report_rejected() {
    let data = [0u8; GUITAR_REPORT_SIZE - 1];
    assert!(GuitarInputReport::read(&data).is_err());
}

#[test]
fn test_keystroke() {
    let key = Keystroke::read(&[0x01, 0x5B]).expect("should unpack keystroke");
    assert!(key.pressed);
    assert_eq!(key.key_code, 0x5B);
}

#[test]
fn test_device_status() {
    // Connected, charge kit, high battery
    let status = DeviceStatus::read(&[0x8A, 0x00, 0x00, 0x00]).expect("should unpack status");
    assert!(status.connected());
    assert_eq!(status.battery_type, BatteryType::ChargeKit);
    assert_eq!(status.battery_level, BatteryLevel::High);

    let status = DeviceStatus::read(&[0x00, 0x00, 0x00, 0x00]).expect("should unpack status");
    assert!(!status.connected());
    assert_eq!(status.battery_type, BatteryType::Wired);
    assert_eq!(status.battery_level, BatteryLevel::Low);
}

#[test]
fn test_arrival() {
    let mut data = [0u8; 28];
    data[0..6].copy_from_slice(&[0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    data[8..10].copy_from_slice(&0x0E6Fu16.to_le_bytes());
    data[10..12].copy_from_slice(&0x0248u16.to_le_bytes());
    data[12..14].copy_from_slice(&1u16.to_le_bytes());
    data[14..16].copy_from_slice(&2u16.to_le_bytes());

    let arrival = Arrival::read(&data).expect("should unpack arrival");
    assert_eq!(arrival.vendor_id.to_primitive(), 0x0E6F);
    assert_eq!(arrival.product_id.to_primitive(), 0x0248);
    assert_eq!(arrival.firmware_version.to_string(), "1.2.0.0");
    assert_eq!(arrival.serial_string(), "010203040506");
}

#[test]
fn test_legacy_id_offsets() {
    let mut data = [0u8; GUITAR_REPORT_SIZE];
    data[10..16].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
    assert_eq!(legacy_id(&data), Some([1, 2, 3, 4, 5, 6]));
    assert_eq!(legacy_id(&data[..20]), None);
}
