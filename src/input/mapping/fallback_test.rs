use std::sync::Arc;

use packed_struct::PackedStruct;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{DrumInputReport, Frets, GhlFrets, GhlInputReport, GuitarInputReport},
        XboxResult,
    },
    input::{
        mapping::{
            fallback::{FallbackMapper, InputKind},
            DeviceMapper, MapperContext,
        },
        settings::{MappingMode, MappingSettings},
        target::{memory::MemoryTargets, xb360::X360Buttons},
    },
};

fn mapper(targets: &MemoryTargets) -> FallbackMapper {
    let ctx = MapperContext {
        factory: Arc::new(targets.clone()),
        settings: Arc::new(MappingSettings::new(MappingMode::ViGEm, true, 1.5, false)),
        map_guide_button: false,
        fallback_mapping: true,
    };
    FallbackMapper::new(&ctx).expect("should create mapper")
}

#[test]
fn test_classify_by_exact_length() {
    assert_eq!(InputKind::classify(&[0; 40]), Some(InputKind::Guitar));
    assert_eq!(InputKind::classify(&[0; 36]), Some(InputKind::Drums));
    assert_eq!(InputKind::classify(&[0; 41]), None);
    assert_eq!(InputKind::classify(&[0; 35]), None);
    assert_eq!(InputKind::classify(&[]), None);
}

#[test]
fn test_guitar_length_routes_to_guitar_transform() {
    let targets = MemoryTargets::new(1, 0);
    let mut mapper = mapper(&targets);

    let input = GuitarInputReport {
        upper_frets: Frets::GREEN.bits(),
        legacy_id: [1, 2, 3, 4, 5, 6],
        ..Default::default()
    };
    let data = input.pack().expect("should pack report");
    assert_eq!(data.len(), 40);
    assert_eq!(
        mapper.handle_message(CommandId::Input, &data),
        XboxResult::Success
    );

    assert_eq!(mapper.last_kind(), Some(InputKind::Guitar));
    assert_eq!(mapper.legacy_id(), Some([1, 2, 3, 4, 5, 6]));
    let report = targets.last_xbox360_report(0).expect("should submit report");
    assert!(report.pressed(X360Buttons::A));
}

#[test]
fn test_drum_length_routes_to_drum_transform() {
    let targets = MemoryTargets::new(1, 0);
    let mut mapper = mapper(&targets);

    let input = DrumInputReport {
        red_pad: 0xF.into(),
        ..Default::default()
    };
    let data = input.pack().expect("should pack report");
    assert_eq!(data.len(), 36);
    assert_eq!(
        mapper.handle_message(CommandId::Input, &data),
        XboxResult::Success
    );

    assert_eq!(mapper.last_kind(), Some(InputKind::Drums));
    let report = targets.last_xbox360_report(0).expect("should submit report");
    assert!(report.pressed(X360Buttons::B));
    // Accurate drum mappings are enabled in these settings
    assert!(report.pressed(X360Buttons::RIGHT_THUMB));
}

#[test]
fn test_unknown_length_is_ignored() {
    let targets = MemoryTargets::new(1, 0);
    let mut mapper = mapper(&targets);

    assert_eq!(
        mapper.handle_message(CommandId::Input, &[0xFF; 20]),
        XboxResult::Success
    );
    assert_eq!(mapper.last_kind(), None);
    assert!(targets.xbox360_reports(0).is_empty());
}

#[test]
fn test_ghl_input_requires_exact_size() {
    let targets = MemoryTargets::new(1, 0);
    let mut mapper = mapper(&targets);

    let input = GhlInputReport {
        frets: GhlFrets::WHITE_3.bits(),
        strum_bar: 0x00,
        ..Default::default()
    };
    let data = input.pack().expect("should pack report");
    assert_eq!(
        mapper.handle_message(CommandId::GhlInput, &data),
        XboxResult::Success
    );
    let report = targets.last_xbox360_report(0).expect("should submit report");
    assert!(report.pressed(X360Buttons::RIGHT_SHOULDER));
    assert!(report.pressed(X360Buttons::DPAD_UP), "strum up");

    let mut longer = data.to_vec();
    longer.push(0);
    assert_eq!(
        mapper.handle_message(CommandId::GhlInput, &longer),
        XboxResult::InvalidMessage
    );
    assert_eq!(
        mapper.handle_message(CommandId::GhlInput, &data[..7]),
        XboxResult::InvalidMessage
    );
}
