//! Guitar Hero Live guitars
use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{GamepadButtons, GhlFrets, GhlInputReport, Report},
        XboxResult,
    },
    input::target::{
        joystick::JoystickState,
        xb360::{X360Buttons, X360Report},
        TargetError,
    },
};

use super::{value, DeviceMapper, MapperContext, Output};

/// Buttons with the strum bar folded into the d-pad
fn strummed_buttons(input: &GhlInputReport) -> GamepadButtons {
    let mut buttons = input.buttons();
    if input.strum_up() {
        buttons |= GamepadButtons::DPAD_UP;
    }
    if input.strum_down() {
        buttons |= GamepadButtons::DPAD_DOWN;
    }
    buttons
}

/// Map a GHL guitar report onto an Xbox 360 report
pub fn apply_xbox360(report: &mut X360Report, input: &GhlInputReport) {
    let buttons = strummed_buttons(input);
    report.set_button(X360Buttons::START, buttons.contains(GamepadButtons::MENU));
    report.set_button(X360Buttons::BACK, buttons.contains(GamepadButtons::OPTIONS));
    super::guitar::apply_dpad(report, buttons);

    let frets = input.frets();
    report.set_button(X360Buttons::A, frets.contains(GhlFrets::BLACK_1));
    report.set_button(X360Buttons::B, frets.contains(GhlFrets::BLACK_2));
    report.set_button(X360Buttons::Y, frets.contains(GhlFrets::BLACK_3));
    report.set_button(X360Buttons::X, frets.contains(GhlFrets::WHITE_1));
    report.set_button(X360Buttons::LEFT_SHOULDER, frets.contains(GhlFrets::WHITE_2));
    report.set_button(X360Buttons::RIGHT_SHOULDER, frets.contains(GhlFrets::WHITE_3));

    report.thumb_rx = value::scale_to_i16(input.whammy);
    report.thumb_ry = value::scale_to_i16(input.tilt);
}

/// Map a GHL guitar report onto a joystick
pub fn apply_joystick(state: &mut JoystickState, input: &GhlInputReport) {
    let buttons = strummed_buttons(input);
    state.set_button(15, buttons.contains(GamepadButtons::MENU));
    state.set_button(16, buttons.contains(GamepadButtons::OPTIONS));
    state.set_dpad(buttons);

    let frets = input.frets();
    state.set_button(1, frets.contains(GhlFrets::BLACK_1));
    state.set_button(2, frets.contains(GhlFrets::BLACK_2));
    state.set_button(3, frets.contains(GhlFrets::BLACK_3));
    state.set_button(4, frets.contains(GhlFrets::WHITE_1));
    state.set_button(5, frets.contains(GhlFrets::WHITE_2));
    state.set_button(6, frets.contains(GhlFrets::WHITE_3));

    state.axis_y = value::joystick_axis(input.whammy);
    state.axis_z = value::joystick_axis(input.tilt);
}

pub(super) fn apply_output(output: &mut Output, input: &GhlInputReport) {
    match output {
        Output::Xbox360(controller) => apply_xbox360(controller.report_mut(), input),
        Output::Joystick(joystick) => apply_joystick(joystick.state_mut(), input),
    }
}

/// Read a GHL report, which must be exactly its wire size
pub(super) fn read_report(data: &[u8]) -> Option<GhlInputReport> {
    match GhlInputReport::read_exact(data) {
        Ok(input) => Some(input),
        Err(e) => {
            log::debug!("Invalid GHL guitar report: {e}");
            None
        }
    }
}

pub struct GhlMapper {
    output: Output,
}

impl GhlMapper {
    pub fn new(ctx: &MapperContext) -> Result<Self, TargetError> {
        Ok(Self {
            output: Output::new(ctx.settings.mode(), ctx.factory.as_ref())?,
        })
    }

    pub fn output(&self) -> &Output {
        &self.output
    }
}

impl DeviceMapper for GhlMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if command != CommandId::GhlInput {
            return XboxResult::Success;
        }
        let Some(input) = read_report(data) else {
            return XboxResult::InvalidMessage;
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
