use crate::drivers::gip::{hid_report::GamepadButtons, XboxResult};

use super::{JoystickBackend, TargetError, TargetFactory};

/// Largest axis value. Axes range from 0 to this value.
pub const AXIS_MAX: i32 = 0x8000;

/// Continuous hat values in hundredths of a degree
pub const HAT_NEUTRAL: u32 = u32::MAX;
pub const HAT_UP: u32 = 0;
pub const HAT_UP_RIGHT: u32 = 4500;
pub const HAT_RIGHT: u32 = 9000;
pub const HAT_DOWN_RIGHT: u32 = 13500;
pub const HAT_DOWN: u32 = 18000;
pub const HAT_DOWN_LEFT: u32 = 22500;
pub const HAT_LEFT: u32 = 27000;
pub const HAT_UP_LEFT: u32 = 31500;

/// Number of buttons a joystick exposes
pub const BUTTON_COUNT: u8 = 16;

/// Full state of a joystick. Buttons are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickState {
    pub buttons: u32,
    pub hat: u32,
    pub axis_x: i32,
    pub axis_y: i32,
    pub axis_z: i32,
}

impl Default for JoystickState {
    fn default() -> Self {
        Self {
            buttons: 0,
            hat: HAT_NEUTRAL,
            axis_x: 0,
            axis_y: 0,
            axis_z: 0,
        }
    }
}

impl JoystickState {
    pub fn set_button(&mut self, button: u8, pressed: bool) {
        if button == 0 || button > 32 {
            return;
        }
        let bit = 1u32 << (button - 1);
        if pressed {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
    }

    pub fn pressed(&self, button: u8) -> bool {
        if button == 0 || button > 32 {
            return false;
        }
        self.buttons & (1u32 << (button - 1)) != 0
    }

    /// Set the hat from the d-pad of the given buttons
    pub fn set_dpad(&mut self, buttons: GamepadButtons) {
        let up = buttons.contains(GamepadButtons::DPAD_UP);
        let down = buttons.contains(GamepadButtons::DPAD_DOWN);
        let left = buttons.contains(GamepadButtons::DPAD_LEFT);
        let right = buttons.contains(GamepadButtons::DPAD_RIGHT);

        self.hat = match (up, down, left, right) {
            (true, _, true, _) => HAT_UP_LEFT,
            (true, _, _, true) => HAT_UP_RIGHT,
            (true, _, _, _) => HAT_UP,
            (_, true, true, _) => HAT_DOWN_LEFT,
            (_, true, _, true) => HAT_DOWN_RIGHT,
            (_, true, _, _) => HAT_DOWN,
            (_, _, true, _) => HAT_LEFT,
            (_, _, _, true) => HAT_RIGHT,
            _ => HAT_NEUTRAL,
        };
    }

    pub fn reset(&mut self) {
        *self = JoystickState::default();
    }
}

/// Owns one acquired joystick for its whole lifetime. Joysticks are usable
/// as soon as they are acquired.
pub struct JoystickController {
    id: u8,
    backend: Option<Box<dyn JoystickBackend>>,
    state: JoystickState,
}

impl JoystickController {
    pub fn new(factory: &dyn TargetFactory) -> Result<Self, TargetError> {
        let acquired = factory.create_joystick()?;
        log::debug!("Acquired joystick device with id {}", acquired.id);
        Ok(Self {
            id: acquired.id,
            backend: Some(acquired.backend),
            state: JoystickState::default(),
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn state(&self) -> &JoystickState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut JoystickState {
        &mut self.state
    }

    pub fn submit(&mut self) -> XboxResult {
        let Some(backend) = self.backend.as_mut() else {
            return XboxResult::Disconnected;
        };
        if let Err(e) = backend.update(&self.state) {
            log::debug!("Failed to update joystick {}: {e}", self.id);
        }
        XboxResult::Success
    }

    pub fn map_guide_button(&mut self, pressed: bool) {
        self.state.set_button(14, pressed);
        self.submit();
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.submit();
    }
}

impl Drop for JoystickController {
    fn drop(&mut self) {
        self.reset();
        if self.backend.take().is_some() {
            log::debug!("Released joystick device {}", self.id);
        }
    }
}
