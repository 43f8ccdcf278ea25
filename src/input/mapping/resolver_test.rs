use std::sync::Arc;

use uuid::uuid;

use crate::{
    drivers::gip::{
        command::CommandId,
        guids::{self, DeviceKind},
        hid_report::{Keystroke, GUIDE_KEY_CODE},
    },
    input::{
        mapping::{
            resolver::{self, DeviceIdentity, ResolveError},
            MapperContext, MapperKind,
        },
        settings::{MappingMode, MappingSettings},
        target::{memory::MemoryTargets, xb360::X360Buttons},
    },
};

fn context(targets: &MemoryTargets, fallback_mapping: bool) -> MapperContext {
    MapperContext {
        factory: Arc::new(targets.clone()),
        settings: Arc::new(MappingSettings::default()),
        map_guide_button: true,
        fallback_mapping,
    }
}

#[test]
fn test_find_single_interface() {
    let unknown = uuid!("11111111-2222-3333-4444-555555555555");
    let (guid, kind) =
        resolver::find_interface(&[unknown, guids::PDP_DRUMKIT]).expect("should resolve");
    assert_eq!(guid, guids::PDP_DRUMKIT);
    assert_eq!(kind, DeviceKind::Drums);
}

#[test]
fn test_two_unrelated_interfaces_are_ambiguous() {
    let result = resolver::find_interface(&[guids::MADCATZ_GUITAR, guids::PDP_DRUMKIT]);
    assert!(matches!(result, Err(ResolveError::Ambiguous(ids)) if ids.len() == 2));
}

#[test]
fn test_repeated_interface_is_not_ambiguous() {
    let result = resolver::find_interface(&[guids::PDP_GUITAR, guids::PDP_GUITAR]);
    assert!(matches!(result, Ok((_, DeviceKind::Guitar))));
}

#[test]
fn test_ghl_with_gamepad_resolves_to_ghl() {
    for interfaces in [
        [guids::GHL_GUITAR, guids::XBOX_GAMEPAD],
        [guids::XBOX_GAMEPAD, guids::GHL_GUITAR],
    ] {
        let (guid, kind) = resolver::find_interface(&interfaces).expect("should resolve");
        assert_eq!(guid, guids::GHL_GUITAR);
        assert_eq!(kind, DeviceKind::GhlGuitar);
    }
}

#[test]
fn test_no_recognized_interface() {
    let targets = MemoryTargets::new(1, 0);
    let unknown = uuid!("11111111-2222-3333-4444-555555555555");

    let result = resolver::resolve(&[unknown], None, &context(&targets, false));
    assert!(matches!(result, Err(ResolveError::Unsupported(_))));
    assert_eq!(targets.xbox360_created(), 0);

    let resolution = resolver::resolve(&[unknown], None, &context(&targets, true))
        .expect("should fall back");
    assert!(matches!(resolution.mapper.kind(), MapperKind::Fallback(_)));
}

#[test]
fn test_riffmaster_detected_by_identity() {
    let targets = MemoryTargets::new(2, 0);
    let ctx = context(&targets, false);
    let riffmaster = DeviceIdentity {
        vendor_id: guids::RIFFMASTER_VENDOR_ID,
        product_id: guids::RIFFMASTER_PRODUCT_ID,
    };

    let resolution = resolver::resolve(&[guids::PDP_GUITAR], Some(riffmaster), &ctx)
        .expect("should resolve");
    assert!(matches!(resolution.mapper.kind(), MapperKind::Riffmaster(_)));

    let resolution =
        resolver::resolve(&[guids::PDP_GUITAR], None, &ctx).expect("should resolve");
    assert!(matches!(resolution.mapper.kind(), MapperKind::Guitar(_)));
}

#[test]
fn test_capacity_exhausted_is_flagged() {
    let targets = MemoryTargets::new(1, 0);
    let ctx = context(&targets, false);

    let first = resolver::resolve(&[guids::MADCATZ_GUITAR], None, &ctx).expect("should resolve");
    assert!(first.capacity_exhausted);

    let second = resolver::resolve(&[guids::MADCATZ_GUITAR], None, &ctx);
    assert!(matches!(second, Err(ResolveError::CreateFailed(_))));
}

#[test]
fn test_mode_selects_output() {
    let targets = MemoryTargets::new(1, 1);
    let ctx = context(&targets, false);
    ctx.settings.set_mode(MappingMode::VJoy);

    resolver::resolve(&[guids::MADCATZ_DRUMKIT], None, &ctx).expect("should resolve");
    assert_eq!(targets.joysticks_acquired(), 1);
    assert_eq!(targets.xbox360_connected(), 0);
}

#[test]
fn test_guide_key_fires_guide_button() {
    let targets = MemoryTargets::new(1, 0);
    let mut resolution = resolver::resolve(&[guids::MADCATZ_GUITAR], None, &context(&targets, false))
        .expect("should resolve");

    let key = Keystroke {
        pressed: true,
        key_code: GUIDE_KEY_CODE,
        ..Default::default()
    };
    resolution.mapper.handle_keystroke(&key);
    let report = targets.last_xbox360_report(0).expect("should submit report");
    assert!(report.pressed(X360Buttons::GUIDE));

    // Disabling inputs resets the report and drops further input
    resolution.mapper.enable_inputs(false);
    let report = targets.last_xbox360_report(0).expect("should submit report");
    assert!(!report.pressed(X360Buttons::GUIDE));
    let count = targets.xbox360_reports(0).len();
    resolution.mapper.handle_keystroke(&key);
    resolution.mapper.handle_message(CommandId::Input, &[0; 40]);
    assert_eq!(targets.xbox360_reports(0).len(), count);
}
