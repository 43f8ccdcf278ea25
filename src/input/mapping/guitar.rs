//! Rock Band 4 guitars
use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{Frets, GamepadButtons, GuitarInputReport, Report},
        XboxResult,
    },
    input::{
        settings::MappingMode,
        target::{joystick::JoystickState, xb360::X360Buttons, xb360::X360Report, TargetError},
    },
};

use super::{value, DeviceMapper, MapperContext, Output};

/// How the tilt sensor is spread over its axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltRange {
    /// Only the positive half of the axis
    Positive,
    /// The whole signed range of the axis
    Full,
}

impl TiltRange {
    pub fn for_mode(mode: MappingMode) -> Self {
        match mode {
            MappingMode::Rpcs3 => TiltRange::Full,
            _ => TiltRange::Positive,
        }
    }
}

/// Set the menu, options and d-pad buttons shared by every instrument
pub(super) fn apply_system_buttons(report: &mut X360Report, buttons: GamepadButtons) {
    report.set_button(X360Buttons::START, buttons.contains(GamepadButtons::MENU));
    report.set_button(X360Buttons::BACK, buttons.contains(GamepadButtons::OPTIONS));
    apply_dpad(report, buttons);
}

pub(super) fn apply_dpad(report: &mut X360Report, buttons: GamepadButtons) {
    report.set_button(X360Buttons::DPAD_UP, buttons.contains(GamepadButtons::DPAD_UP));
    report.set_button(X360Buttons::DPAD_DOWN, buttons.contains(GamepadButtons::DPAD_DOWN));
    report.set_button(X360Buttons::DPAD_LEFT, buttons.contains(GamepadButtons::DPAD_LEFT));
    report.set_button(X360Buttons::DPAD_RIGHT, buttons.contains(GamepadButtons::DPAD_RIGHT));
}

/// Map a guitar report onto an Xbox 360 report
pub fn apply_xbox360(report: &mut X360Report, input: &GuitarInputReport, tilt: TiltRange) {
    apply_system_buttons(report, input.buttons());

    let frets = input.frets();
    report.set_button(X360Buttons::A, frets.contains(Frets::GREEN));
    report.set_button(X360Buttons::B, frets.contains(Frets::RED));
    report.set_button(X360Buttons::Y, frets.contains(Frets::YELLOW));
    report.set_button(X360Buttons::X, frets.contains(Frets::BLUE));
    report.set_button(X360Buttons::LEFT_SHOULDER, frets.contains(Frets::ORANGE));
    report.set_button(X360Buttons::LEFT_THUMB, input.lower_frets_pressed());

    report.thumb_rx = value::scale_to_i16(input.whammy);
    report.thumb_ry = match tilt {
        TiltRange::Positive => value::scale_to_i16_positive(input.tilt),
        TiltRange::Full => value::scale_to_i16(input.tilt),
    };
    report.left_trigger = value::pickup_switch(input.pickup_position());
}

/// Map a guitar report onto a joystick
pub fn apply_joystick(state: &mut JoystickState, input: &GuitarInputReport) {
    let buttons = input.buttons();
    state.set_button(15, buttons.contains(GamepadButtons::MENU));
    state.set_button(16, buttons.contains(GamepadButtons::OPTIONS));
    state.set_dpad(buttons);

    let frets = input.frets();
    state.set_button(1, frets.contains(Frets::GREEN));
    state.set_button(2, frets.contains(Frets::RED));
    state.set_button(3, frets.contains(Frets::YELLOW));
    state.set_button(4, frets.contains(Frets::BLUE));
    state.set_button(5, frets.contains(Frets::ORANGE));

    state.axis_y = value::joystick_axis(input.whammy);
    state.axis_z = value::joystick_axis(input.tilt);
    // Raw pickup values are multiples of 0x10 up to 0x40
    state.axis_x = input.pickup_switch as i32 * 0x200;
}

/// Maps a guitar report onto whichever output the mapper owns
pub(super) fn apply_output(output: &mut Output, input: &GuitarInputReport, tilt: TiltRange) {
    match output {
        Output::Xbox360(controller) => apply_xbox360(controller.report_mut(), input, tilt),
        Output::Joystick(joystick) => apply_joystick(joystick.state_mut(), input),
    }
}

pub struct GuitarMapper {
    output: Output,
    tilt: TiltRange,
}

impl GuitarMapper {
    pub fn new(ctx: &MapperContext) -> Result<Self, TargetError> {
        let mode = ctx.settings.mode();
        Ok(Self {
            output: Output::new(mode, ctx.factory.as_ref())?,
            tilt: TiltRange::for_mode(mode),
        })
    }

    pub fn output(&self) -> &Output {
        &self.output
    }
}

impl DeviceMapper for GuitarMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if command != CommandId::Input {
            return XboxResult::Success;
        }
        let input = match GuitarInputReport::read(data) {
            Ok(input) => input,
            Err(e) => {
                log::debug!("Invalid guitar report: {e}");
                return XboxResult::InvalidMessage;
            }
        };
        apply_output(&mut self.output, &input, self.tilt);
        self.output.submit()
    }

    fn map_guide_button(&mut self, pressed: bool) {
        self.output.map_guide_button(pressed);
    }

    fn reset_report(&mut self) {
        self.output.reset();
    }
}
