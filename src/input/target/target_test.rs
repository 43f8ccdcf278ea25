use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use crate::drivers::gip::{hid_report::GamepadButtons, XboxResult};
use crate::input::target::{
    joystick::{JoystickController, JoystickState, HAT_NEUTRAL, HAT_UP_RIGHT},
    memory::{MemoryTargets, HISTORY_LIMIT},
    uinput::wait_for_devnode,
    xb360::{X360Buttons, Xbox360Controller},
    SlotPool, TargetFactory,
};

#[test]
fn test_slot_pool() {
    let pool = SlotPool::new(2);
    let first = pool.acquire().expect("should acquire first slot");
    let second = pool.acquire().expect("should acquire second slot");
    assert_eq!(first.index(), 0);
    assert_eq!(second.index(), 1);
    assert!(pool.acquire().is_none(), "pool should be exhausted");

    drop(first);
    let third = pool.acquire().expect("released slot should be reused");
    assert_eq!(third.index(), 0);
}

#[test]
fn test_xbox360_pending_until_acknowledged() {
    let targets = MemoryTargets::manual_acknowledge(4, 0);
    let mut controller = Xbox360Controller::new(&targets).expect("should create controller");

    controller.report_mut().set_button(X360Buttons::A, true);
    assert_eq!(controller.submit(), XboxResult::Pending);
    assert!(targets.xbox360_reports(0).is_empty());

    targets.acknowledge_all();
    assert_eq!(controller.submit(), XboxResult::Success);
    assert_eq!(controller.user_index(), Some(0));
    let report = targets.last_xbox360_report(0).expect("should have a report");
    assert!(report.pressed(X360Buttons::A));
}

#[test]
fn test_xbox360_drop_resets_and_disconnects() {
    let targets = MemoryTargets::new(1, 0);
    let mut controller = Xbox360Controller::new(&targets).expect("should create controller");
    controller.report_mut().set_button(X360Buttons::B, true);
    controller.report_mut().thumb_rx = 1000;
    assert_eq!(controller.submit(), XboxResult::Success);
    assert!(!targets.xbox360_available());

    drop(controller);
    let reports = targets.xbox360_reports(0);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1], Default::default(), "last report should be neutral");
    assert_eq!(targets.xbox360_connected(), 0);
    assert!(targets.xbox360_available());
}

#[test]
fn test_memory_history_is_bounded() {
    let targets = MemoryTargets::new(1, 0);
    let mut controller = Xbox360Controller::new(&targets).expect("should create controller");
    for value in 0..(HISTORY_LIMIT as i16 * 4) {
        controller.report_mut().thumb_lx = value;
        assert_eq!(controller.submit(), XboxResult::Success);
    }

    let reports = targets.xbox360_reports(0);
    assert_eq!(reports.len(), HISTORY_LIMIT);
    assert_eq!(reports[0].thumb_lx, HISTORY_LIMIT as i16 * 3);
    let last = targets.last_xbox360_report(0).expect("should have a report");
    assert_eq!(last.thumb_lx, HISTORY_LIMIT as i16 * 4 - 1);
}

#[test]
fn test_xbox360_capacity() {
    let targets = MemoryTargets::new(1, 0);
    let _first = Xbox360Controller::new(&targets).expect("should create controller");
    assert!(Xbox360Controller::new(&targets).is_err());
}

#[test]
fn test_joystick_ids_and_release() {
    let targets = MemoryTargets::new(0, 2);
    let first = JoystickController::new(&targets).expect("should acquire joystick");
    let second = JoystickController::new(&targets).expect("should acquire joystick");
    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
    assert!(JoystickController::new(&targets).is_err());

    drop(first);
    assert_eq!(targets.joysticks_acquired(), 1);
    let last = targets.last_joystick_state(0).expect("should have reset state");
    assert_eq!(last, JoystickState::default());
}

#[test]
fn test_joystick_buttons_and_hat() {
    let mut state = JoystickState::default();
    state.set_button(1, true);
    state.set_button(16, true);
    assert_eq!(state.buttons, 0x8001);
    state.set_button(1, false);
    assert_eq!(state.buttons, 0x8000);

    // Out of range buttons are ignored
    state.set_button(0, true);
    state.set_button(33, true);
    assert_eq!(state.buttons, 0x8000);

    state.set_dpad(GamepadButtons::DPAD_UP | GamepadButtons::DPAD_RIGHT);
    assert_eq!(state.hat, HAT_UP_RIGHT);
    state.set_dpad(GamepadButtons::empty());
    assert_eq!(state.hat, HAT_NEUTRAL);
}

#[test]
fn test_wait_for_devnode() {
    let present = PathBuf::from("Cargo.toml");
    let missing = PathBuf::from("/dev/input/event-missing");

    let start = Instant::now();
    assert!(wait_for_devnode(&[missing.clone(), present], Duration::from_secs(5)));
    assert!(start.elapsed() < Duration::from_secs(5));

    let start = Instant::now();
    assert!(!wait_for_devnode(&[missing], Duration::from_millis(50)));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert!(!wait_for_devnode(&[], Duration::from_secs(5)), "nothing to wait for");
}
