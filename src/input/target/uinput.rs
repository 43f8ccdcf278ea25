//! Virtual controllers backed by uinput devices
use std::{
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventType, InputEvent, InputId, KeyCode,
    SynchronizationCode, SynchronizationEvent, UinputAbsSetup,
};
use tokio::sync::oneshot;

use super::{
    joystick::{self, JoystickState, AXIS_MAX, BUTTON_COUNT},
    xb360::{X360Buttons, X360Report},
    AcquiredJoystick, JoystickBackend, PendingXbox360, Slot, SlotPool, TargetError,
    TargetFactory, Xbox360Backend,
};

/// Xbox 360 buttons and the key codes they are emitted as
const XBOX360_KEYS: [(X360Buttons, KeyCode); 11] = [
    (X360Buttons::A, KeyCode::BTN_SOUTH),
    (X360Buttons::B, KeyCode::BTN_EAST),
    (X360Buttons::X, KeyCode::BTN_NORTH),
    (X360Buttons::Y, KeyCode::BTN_WEST),
    (X360Buttons::LEFT_SHOULDER, KeyCode::BTN_TL),
    (X360Buttons::RIGHT_SHOULDER, KeyCode::BTN_TR),
    (X360Buttons::BACK, KeyCode::BTN_SELECT),
    (X360Buttons::START, KeyCode::BTN_START),
    (X360Buttons::GUIDE, KeyCode::BTN_MODE),
    (X360Buttons::LEFT_THUMB, KeyCode::BTN_THUMBL),
    (X360Buttons::RIGHT_THUMB, KeyCode::BTN_THUMBR),
];

/// First joystick button code (BTN_TRIGGER). Joystick buttons use the
/// consecutive BTN_JOYSTICK range.
const JOYSTICK_BUTTON_BASE: u16 = 0x120;

/// How long the connection acknowledgement waits for the device node
const DEVNODE_TIMEOUT: Duration = Duration::from_secs(2);
const DEVNODE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Block until one of `paths` exists or `timeout` elapses. Returns whether a
/// node appeared.
pub(super) fn wait_for_devnode(paths: &[PathBuf], timeout: Duration) -> bool {
    if paths.is_empty() {
        return false;
    }
    let deadline = Instant::now() + timeout;
    loop {
        if paths.iter().any(|path| path.exists()) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(DEVNODE_POLL_INTERVAL);
    }
}

/// Creates virtual controllers through /dev/uinput
#[derive(Debug, Clone)]
pub struct UinputTargets {
    xbox360_slots: Arc<SlotPool>,
    joystick_slots: Arc<SlotPool>,
}

impl UinputTargets {
    pub fn new(max_xbox360: usize, max_joysticks: usize) -> Self {
        Self {
            xbox360_slots: SlotPool::new(max_xbox360),
            joystick_slots: SlotPool::new(max_joysticks),
        }
    }
}

impl TargetFactory for UinputTargets {
    fn create_xbox360(&self) -> Result<PendingXbox360, TargetError> {
        let slot = self
            .xbox360_slots
            .acquire()
            .ok_or(TargetError::Unavailable("Xbox 360"))?;
        let mut device = create_xbox360_device().map_err(TargetError::CreateFailed)?;

        // Find the path to the device in /dev/input
        let paths: Vec<PathBuf> = match device.enumerate_dev_nodes_blocking() {
            Ok(paths) => paths.flatten().collect(),
            Err(e) => {
                log::debug!("Failed to find Xbox 360 controller device node: {e}");
                Vec::new()
            }
        };
        for path in paths.iter() {
            log::debug!("Xbox 360 controller available as {}", path.display());
        }

        // Acknowledge the connection from another thread once the device node
        // exists, much like a bus driver reporting the assigned LED
        let (tx, rx) = oneshot::channel();
        let user_index = slot.index() as u8;
        thread::spawn(move || {
            if !wait_for_devnode(&paths, DEVNODE_TIMEOUT) {
                log::warn!("Xbox 360 controller {user_index} has no device node yet");
            }
            let _ = tx.send(user_index);
        });

        Ok(PendingXbox360 {
            backend: Box::new(UinputXbox360 {
                device,
                _slot: slot,
            }),
            connected: rx,
        })
    }

    fn create_joystick(&self) -> Result<AcquiredJoystick, TargetError> {
        let slot = self
            .joystick_slots
            .acquire()
            .ok_or(TargetError::Unavailable("joystick"))?;
        let id = slot.index() as u8 + 1;
        let device = create_joystick_device(id).map_err(TargetError::CreateFailed)?;

        Ok(AcquiredJoystick {
            id,
            backend: Box::new(UinputJoystick {
                device,
                _slot: slot,
            }),
        })
    }

    fn xbox360_available(&self) -> bool {
        self.xbox360_slots.available()
    }

    fn joystick_available(&self) -> bool {
        self.joystick_slots.available()
    }
}

/// Create the virtual Xbox 360 device to emulate
fn create_xbox360_device() -> Result<VirtualDevice, std::io::Error> {
    // Setup Key inputs
    let mut keys = AttributeSet::<KeyCode>::new();
    for (_, key) in XBOX360_KEYS {
        keys.insert(key);
    }

    // Setup ABS inputs
    let joystick_setup = AbsInfo::new(0, -32768, 32767, 16, 128, 1);
    let abs_x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, joystick_setup);
    let abs_y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, joystick_setup);
    let abs_rx = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RX, joystick_setup);
    let abs_ry = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RY, joystick_setup);
    let triggers_setup = AbsInfo::new(0, 0, 255, 0, 0, 1);
    let abs_z = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Z, triggers_setup);
    let abs_rz = UinputAbsSetup::new(AbsoluteAxisCode::ABS_RZ, triggers_setup);
    let dpad_setup = AbsInfo::new(0, -1, 1, 0, 0, 1);
    let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, dpad_setup);
    let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, dpad_setup);

    let id = InputId::new(BusType(3), 0x045e, 0x028e, 0x0110);

    // Build the device
    let device = VirtualDeviceBuilder::new()?
        .name("Microsoft X-Box 360 pad")
        .input_id(id)
        .with_keys(&keys)?
        .with_absolute_axis(&abs_x)?
        .with_absolute_axis(&abs_y)?
        .with_absolute_axis(&abs_rx)?
        .with_absolute_axis(&abs_ry)?
        .with_absolute_axis(&abs_z)?
        .with_absolute_axis(&abs_rz)?
        .with_absolute_axis(&abs_hat0x)?
        .with_absolute_axis(&abs_hat0y)?
        .build()?;

    Ok(device)
}

/// Create the virtual joystick device with the given id
fn create_joystick_device(id: u8) -> Result<VirtualDevice, std::io::Error> {
    let mut keys = AttributeSet::<KeyCode>::new();
    for button in 0..BUTTON_COUNT as u16 {
        keys.insert(KeyCode::new(JOYSTICK_BUTTON_BASE + button));
    }

    let axis_setup = AbsInfo::new(0, 0, AXIS_MAX, 0, 0, 1);
    let abs_x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_X, axis_setup);
    let abs_y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Y, axis_setup);
    let abs_z = UinputAbsSetup::new(AbsoluteAxisCode::ABS_Z, axis_setup);
    let hat_setup = AbsInfo::new(0, -1, 1, 0, 0, 1);
    let abs_hat0x = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0X, hat_setup);
    let abs_hat0y = UinputAbsSetup::new(AbsoluteAxisCode::ABS_HAT0Y, hat_setup);

    let name = format!("Instrument Mapper Joystick {id}");
    let device = VirtualDeviceBuilder::new()?
        .name(name.as_str())
        .with_keys(&keys)?
        .with_absolute_axis(&abs_x)?
        .with_absolute_axis(&abs_y)?
        .with_absolute_axis(&abs_z)?
        .with_absolute_axis(&abs_hat0x)?
        .with_absolute_axis(&abs_hat0y)?
        .build()?;

    Ok(device)
}

fn key_event(code: KeyCode, pressed: bool) -> InputEvent {
    InputEvent::new(EventType::KEY.0, code.0, pressed as i32)
}

fn abs_event(code: AbsoluteAxisCode, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE.0, code.0, value)
}

/// Convert a pair of opposing buttons into a hat axis value
fn hat_axis(negative: bool, positive: bool) -> i32 {
    match (negative, positive) {
        (true, false) => -1,
        (false, true) => 1,
        _ => 0,
    }
}

struct UinputXbox360 {
    device: VirtualDevice,
    _slot: Slot,
}

impl Xbox360Backend for UinputXbox360 {
    fn update(&mut self, report: &X360Report) -> Result<(), TargetError> {
        let mut events: Vec<InputEvent> = XBOX360_KEYS
            .iter()
            .map(|(button, key)| key_event(*key, report.pressed(*button)))
            .collect();

        let hat_x = hat_axis(
            report.pressed(X360Buttons::DPAD_LEFT),
            report.pressed(X360Buttons::DPAD_RIGHT),
        );
        let hat_y = hat_axis(
            report.pressed(X360Buttons::DPAD_UP),
            report.pressed(X360Buttons::DPAD_DOWN),
        );
        events.extend([
            abs_event(AbsoluteAxisCode::ABS_X, report.thumb_lx as i32),
            // Y axes are inverted on Linux gamepads
            abs_event(AbsoluteAxisCode::ABS_Y, -(report.thumb_ly as i32) - 1),
            abs_event(AbsoluteAxisCode::ABS_RX, report.thumb_rx as i32),
            abs_event(AbsoluteAxisCode::ABS_RY, -(report.thumb_ry as i32) - 1),
            abs_event(AbsoluteAxisCode::ABS_Z, report.left_trigger as i32),
            abs_event(AbsoluteAxisCode::ABS_RZ, report.right_trigger as i32),
            abs_event(AbsoluteAxisCode::ABS_HAT0X, hat_x),
            abs_event(AbsoluteAxisCode::ABS_HAT0Y, hat_y),
        ]);

        self.device.emit(events.as_slice())?;
        self.device
            .emit(&[SynchronizationEvent::new(SynchronizationCode::SYN_REPORT, 0).into()])?;
        Ok(())
    }
}

struct UinputJoystick {
    device: VirtualDevice,
    _slot: Slot,
}

impl JoystickBackend for UinputJoystick {
    fn update(&mut self, state: &JoystickState) -> Result<(), TargetError> {
        let mut events: Vec<InputEvent> = (1..=BUTTON_COUNT)
            .map(|button| {
                let code = KeyCode::new(JOYSTICK_BUTTON_BASE + button as u16 - 1);
                key_event(code, state.pressed(button))
            })
            .collect();

        let (hat_x, hat_y) = match state.hat {
            joystick::HAT_UP => (0, -1),
            joystick::HAT_UP_RIGHT => (1, -1),
            joystick::HAT_RIGHT => (1, 0),
            joystick::HAT_DOWN_RIGHT => (1, 1),
            joystick::HAT_DOWN => (0, 1),
            joystick::HAT_DOWN_LEFT => (-1, 1),
            joystick::HAT_LEFT => (-1, 0),
            joystick::HAT_UP_LEFT => (-1, -1),
            _ => (0, 0),
        };
        events.extend([
            abs_event(AbsoluteAxisCode::ABS_X, state.axis_x),
            abs_event(AbsoluteAxisCode::ABS_Y, state.axis_y),
            abs_event(AbsoluteAxisCode::ABS_Z, state.axis_z),
            abs_event(AbsoluteAxisCode::ABS_HAT0X, hat_x),
            abs_event(AbsoluteAxisCode::ABS_HAT0Y, hat_y),
        ]);

        self.device.emit(events.as_slice())?;
        self.device
            .emit(&[SynchronizationEvent::new(SynchronizationCode::SYN_REPORT, 0).into()])?;
        Ok(())
    }
}
