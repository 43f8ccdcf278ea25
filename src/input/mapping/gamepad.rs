//! Standard Xbox One gamepads. Only built for debugging the pipeline with a
//! regular controller.
use packed_struct::types::SizedInteger;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{GamepadButtons, GamepadInputReport, Report},
        XboxResult,
    },
    input::target::{
        joystick::JoystickState,
        xb360::{X360Buttons, X360Report},
        TargetError,
    },
};

use super::{guitar, value, DeviceMapper, MapperContext, Output};

/// Gamepad buttons and the Xbox 360 buttons they map to
const BUTTONS: [(GamepadButtons, X360Buttons); 10] = [
    (GamepadButtons::MENU, X360Buttons::START),
    (GamepadButtons::OPTIONS, X360Buttons::BACK),
    (GamepadButtons::A, X360Buttons::A),
    (GamepadButtons::B, X360Buttons::B),
    (GamepadButtons::X, X360Buttons::X),
    (GamepadButtons::Y, X360Buttons::Y),
    (GamepadButtons::LEFT_BUMPER, X360Buttons::LEFT_SHOULDER),
    (GamepadButtons::RIGHT_BUMPER, X360Buttons::RIGHT_SHOULDER),
    (GamepadButtons::LEFT_STICK_PRESS, X360Buttons::LEFT_THUMB),
    (GamepadButtons::RIGHT_STICK_PRESS, X360Buttons::RIGHT_THUMB),
];

/// Triggers range from 0 to 1023
fn trigger(value: u16) -> u8 {
    (value.min(0x3FF) >> 2) as u8
}

pub fn apply_xbox360(report: &mut X360Report, input: &GamepadInputReport) {
    let buttons = input.buttons();
    for (from, to) in BUTTONS {
        report.set_button(to, buttons.contains(from));
    }
    guitar::apply_dpad(report, buttons);

    report.left_trigger = trigger(input.left_trigger.to_primitive());
    report.right_trigger = trigger(input.right_trigger.to_primitive());
    report.thumb_lx = input.left_stick_x.to_primitive();
    report.thumb_ly = input.left_stick_y.to_primitive();
    report.thumb_rx = input.right_stick_x.to_primitive();
    report.thumb_ry = input.right_stick_y.to_primitive();
}

/// Map a gamepad onto a joystick the way it shows up as a regular
/// joystick
pub fn apply_joystick(state: &mut JoystickState, input: &GamepadInputReport) {
    let buttons = input.buttons();
    state.set_button(1, buttons.contains(GamepadButtons::A));
    state.set_button(2, buttons.contains(GamepadButtons::B));
    state.set_button(3, buttons.contains(GamepadButtons::X));
    state.set_button(4, buttons.contains(GamepadButtons::Y));
    state.set_button(5, buttons.contains(GamepadButtons::LEFT_BUMPER));
    state.set_button(6, buttons.contains(GamepadButtons::RIGHT_BUMPER));
    state.set_button(7, buttons.contains(GamepadButtons::OPTIONS));
    state.set_button(8, buttons.contains(GamepadButtons::MENU));
    state.set_button(9, buttons.contains(GamepadButtons::LEFT_STICK_PRESS));
    state.set_button(10, buttons.contains(GamepadButtons::RIGHT_STICK_PRESS));
    state.set_dpad(buttons);

    state.axis_x = value::joystick_axis_signed(input.left_stick_x.to_primitive());
    state.axis_y = value::joystick_axis_inverted(input.left_stick_y.to_primitive());

    // Both triggers share one axis
    let triggers = (input.left_trigger.to_primitive() as i32
        - input.right_trigger.to_primitive() as i32)
        * 0x20;
    state.axis_z = value::joystick_axis_signed(value::clamp_i16(triggers as i64));
}

pub(super) fn apply_output(output: &mut Output, input: &GamepadInputReport) {
    match output {
        Output::Xbox360(controller) => apply_xbox360(controller.report_mut(), input),
        Output::Joystick(joystick) => apply_joystick(joystick.state_mut(), input),
    }
}

pub struct GamepadMapper {
    output: Output,
}

impl GamepadMapper {
    pub fn new(ctx: &MapperContext) -> Result<Self, TargetError> {
        Ok(Self {
            output: Output::new(ctx.settings.mode(), ctx.factory.as_ref())?,
        })
    }
}

impl DeviceMapper for GamepadMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if command != CommandId::Input {
            return XboxResult::Success;
        }
        let input = match GamepadInputReport::read(data) {
            Ok(input) => input,
            Err(e) => {
                log::debug!("Invalid gamepad report: {e}");
                return XboxResult::InvalidMessage;
            }
        };
        apply_output(&mut self.output, &input);
        self.output.submit()
    }

    fn map_guide_button(&mut self, pressed: bool) {
        self.output.map_guide_button(pressed);
    }

    fn reset_report(&mut self) {
        self.output.reset();
    }
}
