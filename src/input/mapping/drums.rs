//! Rock Band 4 drum kits
use std::sync::Arc;

use packed_struct::types::SizedInteger;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{DrumInputReport, GamepadButtons, Report},
        XboxResult,
    },
    input::{
        settings::{MappingMode, MappingSettings},
        target::{
            joystick::JoystickState,
            xb360::{X360Buttons, X360Report},
            TargetError,
        },
    },
};

use super::{guitar, value, DeviceMapper, MapperContext, Output};

const YELLOW_BIT: u8 = 0x01;
const BLUE_BIT: u8 = 0x02;

/// Decoded pad and cymbal velocities of one drum report
#[derive(Debug, Clone, Copy, Default)]
struct Hits {
    red_pad: u8,
    yellow_pad: u8,
    blue_pad: u8,
    green_pad: u8,
    yellow_cymbal: u8,
    blue_cymbal: u8,
    green_cymbal: u8,
}

impl From<&DrumInputReport> for Hits {
    fn from(input: &DrumInputReport) -> Self {
        Self {
            red_pad: input.red_pad.to_primitive(),
            yellow_pad: input.yellow_pad.to_primitive(),
            blue_pad: input.blue_pad.to_primitive(),
            green_pad: input.green_pad.to_primitive(),
            yellow_cymbal: input.yellow_cymbal.to_primitive(),
            blue_cymbal: input.blue_cymbal.to_primitive(),
            green_cymbal: input.green_cymbal.to_primitive(),
        }
    }
}

/// Tracks which of the yellow and blue cymbals currently drives the d-pad.
/// Real Xbox 360 kits only ever report one of the two directions, so a new
/// hit does not steal the d-pad from a cymbal that is still held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CymbalDpad {
    previous: u8,
    mask: u8,
}

impl CymbalDpad {
    /// Update the d-pad state from the cymbals of the current report
    pub fn update(&mut self, yellow: bool, blue: bool) {
        let mut cymbals = 0;
        if yellow {
            cymbals |= YELLOW_BIT;
        }
        if blue {
            cymbals |= BLUE_BIT;
        }
        if cymbals == self.previous {
            return;
        }

        if cymbals == 0 {
            self.mask = 0;
        }

        if self.mask != 0 {
            // Only remove the released cymbal
            if cymbals & YELLOW_BIT == 0 {
                self.mask &= !YELLOW_BIT;
            } else if cymbals & BLUE_BIT == 0 {
                self.mask &= !BLUE_BIT;
            }
        }

        // A cleared d-pad is handed to whichever cymbal is still active,
        // yellow first
        if self.mask == 0 {
            if cymbals & YELLOW_BIT != 0 {
                self.mask |= YELLOW_BIT;
            } else if cymbals & BLUE_BIT != 0 {
                self.mask |= BLUE_BIT;
            }
        }

        self.previous = cymbals;
    }

    pub fn up(&self) -> bool {
        self.mask & YELLOW_BIT != 0
    }

    pub fn down(&self) -> bool {
        self.mask & BLUE_BIT != 0
    }
}

/// Map a drum report onto an Xbox 360 report. The accurate mapping mimics an
/// Xbox 360 Rock Band kit; otherwise every pad and cymbal gets its own output.
pub fn apply_xbox360(
    report: &mut X360Report,
    input: &DrumInputReport,
    dpad: &mut CymbalDpad,
    accurate: bool,
) {
    let buttons = input.buttons();
    report.set_button(X360Buttons::START, buttons.contains(GamepadButtons::MENU));
    report.set_button(X360Buttons::BACK, buttons.contains(GamepadButtons::OPTIONS));

    let hits = Hits::from(input);
    if accurate {
        apply_accurate_dpad(report, buttons, &hits, dpad);
        apply_accurate_drums(report, buttons, &hits);
    } else {
        guitar::apply_dpad(report, buttons);
        apply_individual_drums(report, buttons, &hits);
    }
}

fn apply_accurate_dpad(
    report: &mut X360Report,
    buttons: GamepadButtons,
    hits: &Hits,
    dpad: &mut CymbalDpad,
) {
    dpad.update(hits.yellow_cymbal != 0, hits.blue_cymbal != 0);

    report.set_button(
        X360Buttons::DPAD_UP,
        dpad.up() || buttons.contains(GamepadButtons::DPAD_UP),
    );
    report.set_button(
        X360Buttons::DPAD_DOWN,
        dpad.down() || buttons.contains(GamepadButtons::DPAD_DOWN),
    );
    report.set_button(X360Buttons::DPAD_LEFT, buttons.contains(GamepadButtons::DPAD_LEFT));
    report.set_button(X360Buttons::DPAD_RIGHT, buttons.contains(GamepadButtons::DPAD_RIGHT));
}

fn apply_accurate_drums(report: &mut X360Report, buttons: GamepadButtons, hits: &Hits) {
    let yellow = hits.yellow_pad | hits.yellow_cymbal;
    let blue = hits.blue_pad | hits.blue_cymbal;
    let green = hits.green_pad | hits.green_cymbal;

    // Color flags
    report.set_button(
        X360Buttons::B,
        hits.red_pad != 0 || buttons.contains(GamepadButtons::B),
    );
    report.set_button(X360Buttons::Y, yellow != 0 || buttons.contains(GamepadButtons::Y));
    report.set_button(X360Buttons::X, blue != 0 || buttons.contains(GamepadButtons::X));
    report.set_button(X360Buttons::A, green != 0 || buttons.contains(GamepadButtons::A));

    // Pad and cymbal flags
    let pads = hits.red_pad | hits.yellow_pad | hits.blue_pad | hits.green_pad;
    let cymbals = hits.yellow_cymbal | hits.blue_cymbal | hits.green_cymbal;
    report.set_button(X360Buttons::RIGHT_THUMB, pads != 0);
    report.set_button(X360Buttons::RIGHT_SHOULDER, cymbals != 0);

    // Pedals
    report.set_button(
        X360Buttons::LEFT_SHOULDER,
        buttons.contains(GamepadButtons::KICK_ONE),
    );
    report.set_button(X360Buttons::LEFT_THUMB, buttons.contains(GamepadButtons::KICK_TWO));

    // Velocities
    report.thumb_lx = value::drum_velocity(hits.red_pad);
    report.thumb_ly = value::drum_velocity_negative(yellow);
    report.thumb_rx = value::drum_velocity(blue);
    report.thumb_ry = value::drum_velocity_negative(green);
}

fn apply_individual_drums(report: &mut X360Report, buttons: GamepadButtons, hits: &Hits) {
    report.set_button(
        X360Buttons::B,
        hits.red_pad != 0 || buttons.contains(GamepadButtons::B),
    );
    report.set_button(
        X360Buttons::Y,
        hits.yellow_pad != 0 || buttons.contains(GamepadButtons::Y),
    );
    report.set_button(
        X360Buttons::X,
        hits.blue_pad != 0 || buttons.contains(GamepadButtons::X),
    );
    report.set_button(
        X360Buttons::A,
        hits.green_pad != 0 || buttons.contains(GamepadButtons::A),
    );

    report.set_button(X360Buttons::LEFT_THUMB, hits.yellow_cymbal != 0);
    report.set_button(X360Buttons::RIGHT_THUMB, hits.blue_cymbal != 0);
    report.set_button(X360Buttons::RIGHT_SHOULDER, hits.green_cymbal != 0);

    report.set_button(
        X360Buttons::LEFT_SHOULDER,
        buttons.contains(GamepadButtons::KICK_ONE),
    );
    // Out of buttons, so the second kick goes to a trigger
    report.left_trigger = if buttons.contains(GamepadButtons::KICK_TWO) {
        u8::MAX
    } else {
        0
    };
}

/// Map a drum report onto a joystick
pub fn apply_joystick(state: &mut JoystickState, input: &DrumInputReport) {
    let buttons = input.buttons();
    state.set_button(15, buttons.contains(GamepadButtons::MENU));
    state.set_button(16, buttons.contains(GamepadButtons::OPTIONS));
    state.set_dpad(buttons);

    // Face buttons, overridden below by any pad hit
    state.set_button(4, buttons.contains(GamepadButtons::A));
    state.set_button(1, buttons.contains(GamepadButtons::B));
    state.set_button(3, buttons.contains(GamepadButtons::X));
    state.set_button(2, buttons.contains(GamepadButtons::Y));

    let hits = Hits::from(input);
    if hits.red_pad != 0 {
        state.set_button(1, true);
    }
    if hits.yellow_pad != 0 {
        state.set_button(2, true);
    }
    if hits.blue_pad != 0 {
        state.set_button(3, true);
    }
    if hits.green_pad != 0 {
        state.set_button(4, true);
    }

    state.set_button(6, hits.yellow_cymbal != 0);
    state.set_button(7, hits.blue_cymbal != 0);
    state.set_button(8, hits.green_cymbal != 0);

    state.set_button(5, buttons.contains(GamepadButtons::KICK_ONE));
    state.set_button(9, buttons.contains(GamepadButtons::KICK_TWO));
}

/// Drum transform carrying the d-pad state between reports
#[derive(Debug, Default)]
pub struct DrumTransform {
    dpad: CymbalDpad,
}

impl DrumTransform {
    pub(super) fn apply(
        &mut self,
        output: &mut Output,
        input: &DrumInputReport,
        settings: &MappingSettings,
    ) {
        match output {
            Output::Xbox360(controller) => {
                let accurate =
                    settings.mode() == MappingMode::Rpcs3 || settings.accurate_drums();
                apply_xbox360(controller.report_mut(), input, &mut self.dpad, accurate);
            }
            Output::Joystick(joystick) => apply_joystick(joystick.state_mut(), input),
        }
    }
}

pub struct DrumsMapper {
    output: Output,
    settings: Arc<MappingSettings>,
    transform: DrumTransform,
}

impl DrumsMapper {
    pub fn new(ctx: &MapperContext) -> Result<Self, TargetError> {
        Ok(Self {
            output: Output::new(ctx.settings.mode(), ctx.factory.as_ref())?,
            settings: ctx.settings.clone(),
            transform: DrumTransform::default(),
        })
    }

    pub fn output(&self) -> &Output {
        &self.output
    }
}

impl DeviceMapper for DrumsMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if command != CommandId::Input {
            return XboxResult::Success;
        }
        let input = match DrumInputReport::read(data) {
            Ok(input) => input,
            Err(e) => {
                log::debug!("Invalid drum report: {e}");
                return XboxResult::InvalidMessage;
            }
        };
        self.transform.apply(&mut self.output, &input, &self.settings);
        self.output.submit()
    }

    fn map_guide_button(&mut self, pressed: bool) {
        self.output.map_guide_button(pressed);
    }

    fn reset_report(&mut self) {
        self.output.reset();
    }
}
