//! PDP Riffmaster guitars. These send a regular guitar report followed by
//! an analog joystick.
use std::sync::Arc;

use packed_struct::types::SizedInteger;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{GamepadButtons, Report, RiffmasterInputReport},
        XboxResult,
    },
    input::{
        settings::{MappingMode, MappingSettings},
        target::{xb360::X360Buttons, xb360::X360Report, TargetError},
    },
};

use super::{
    guitar::{self, TiltRange},
    value, DeviceMapper, MapperContext, Output,
};

/// Number of positions the emulated pickup switch cycles through
const PICKUP_POSITIONS: u8 = 5;

/// Emulated pickup switch, advanced on each press of the joystick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PickupCycle {
    current: u8,
    held: bool,
}

impl PickupCycle {
    /// Advance on the rising edge of the button
    pub fn update(&mut self, pressed: bool) {
        if pressed && !self.held {
            self.current = (self.current + 1) % PICKUP_POSITIONS;
        }
        self.held = pressed;
    }

    pub fn position(&self) -> u8 {
        self.current
    }
}

/// Map a Riffmaster report onto an Xbox 360 report
pub fn apply_xbox360(report: &mut X360Report, input: &RiffmasterInputReport, tilt: TiltRange) {
    guitar::apply_xbox360(report, &input.base, tilt);

    report.thumb_lx = input.joystick_x.to_primitive();
    report.thumb_ly = input.joystick_y.to_primitive();
    report.set_button(
        X360Buttons::LEFT_THUMB,
        input.joystick_click || input.base.lower_frets_pressed(),
    );
}

/// Map a Riffmaster report onto an Xbox 360 report the way shadPS4 expects.
/// Tilt is scaled by the given sensitivity and inverted, and the pickup
/// switch is emulated with the joystick.
pub fn apply_shadps4(
    report: &mut X360Report,
    input: &RiffmasterInputReport,
    pickup: &mut PickupCycle,
    sensitivity: f64,
) {
    guitar::apply_xbox360(report, &input.base, TiltRange::Positive);

    report.thumb_ly = value::scale_to_i16_positive(input.base.whammy);
    let tilt = value::scale_to_i16(input.base.tilt) as f64 * sensitivity;
    report.thumb_ry = value::clamp_i16(-(tilt.round() as i64));
    report.set_button(
        X360Buttons::LEFT_THUMB,
        input.joystick_click || input.base.lower_frets_pressed(),
    );

    pickup.update(
        input
            .base
            .buttons()
            .contains(GamepadButtons::LEFT_STICK_PRESS),
    );
    report.left_trigger = value::pickup_switch(pickup.position());
}

pub struct RiffmasterMapper {
    output: Output,
    mode: MappingMode,
    settings: Arc<MappingSettings>,
    pickup: PickupCycle,
}

impl RiffmasterMapper {
    pub fn new(ctx: &MapperContext) -> Result<Self, TargetError> {
        let mode = ctx.settings.mode();
        Ok(Self {
            output: Output::new(mode, ctx.factory.as_ref())?,
            mode,
            settings: ctx.settings.clone(),
            pickup: PickupCycle::default(),
        })
    }

    pub fn output(&self) -> &Output {
        &self.output
    }
}

impl DeviceMapper for RiffmasterMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if command != CommandId::Input {
            return XboxResult::Success;
        }
        let input = match RiffmasterInputReport::read(data) {
            Ok(input) => input,
            Err(e) => {
                log::debug!("Invalid Riffmaster report: {e}");
                return XboxResult::InvalidMessage;
            }
        };

        match &mut self.output {
            Output::Xbox360(controller) if self.mode == MappingMode::ShadPs4 => apply_shadps4(
                controller.report_mut(),
                &input,
                &mut self.pickup,
                self.settings.riffmaster_sensitivity(),
            ),
            Output::Xbox360(controller) => apply_xbox360(
                controller.report_mut(),
                &input,
                TiltRange::for_mode(self.mode),
            ),
            Output::Joystick(joystick) => guitar::apply_joystick(joystick.state_mut(), &input.base),
        }
        self.output.submit()
    }

    fn map_guide_button(&mut self, pressed: bool) {
        self.output.map_guide_button(pressed);
    }

    fn reset_report(&mut self) {
        self.output.reset();
    }
}
