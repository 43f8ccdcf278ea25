//! Mapper for devices whose type is not known up front. Input reports are
//! told apart purely by their length.
use std::sync::Arc;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{
            self, DrumInputReport, GuitarInputReport, Report, DRUM_REPORT_SIZE,
            GUITAR_REPORT_SIZE,
        },
        XboxResult,
    },
    input::{settings::MappingSettings, target::TargetError},
};

#[cfg(debug_assertions)]
use crate::drivers::gip::hid_report::{GamepadInputReport, GAMEPAD_REPORT_SIZE};

use super::{
    drums::DrumTransform,
    ghl,
    guitar::{self, TiltRange},
    DeviceMapper, MapperContext, Output,
};

/// The kind of report an input payload was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Guitar,
    Drums,
    #[cfg(debug_assertions)]
    Gamepad,
}

impl InputKind {
    /// Classify an input payload by its exact length
    pub fn classify(data: &[u8]) -> Option<Self> {
        match data.len() {
            GUITAR_REPORT_SIZE => Some(InputKind::Guitar),
            DRUM_REPORT_SIZE => Some(InputKind::Drums),
            #[cfg(debug_assertions)]
            GAMEPAD_REPORT_SIZE => Some(InputKind::Gamepad),
            _ => None,
        }
    }
}

pub struct FallbackMapper {
    output: Output,
    tilt: TiltRange,
    settings: Arc<MappingSettings>,
    drums: DrumTransform,
    last_kind: Option<InputKind>,
    legacy_id: Option<[u8; 6]>,
}

impl FallbackMapper {
    pub fn new(ctx: &MapperContext) -> Result<Self, TargetError> {
        let mode = ctx.settings.mode();
        Ok(Self {
            output: Output::new(mode, ctx.factory.as_ref())?,
            tilt: TiltRange::for_mode(mode),
            settings: ctx.settings.clone(),
            drums: DrumTransform::default(),
            last_kind: None,
            legacy_id: None,
        })
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Kind of the last input report that was mapped
    pub fn last_kind(&self) -> Option<InputKind> {
        self.last_kind
    }

    /// Legacy auto-detect id of the device, from its first instrument report
    pub fn legacy_id(&self) -> Option<[u8; 6]> {
        self.legacy_id
    }

    fn handle_input(&mut self, data: &[u8]) -> XboxResult {
        let Some(kind) = InputKind::classify(data) else {
            return XboxResult::Success;
        };

        if self.legacy_id.is_none() {
            if let Some(id) = hid_report::legacy_id(data) {
                log::debug!("Instrument legacy id: {id:02x?}");
                self.legacy_id = Some(id);
            }
        }
        if self.last_kind != Some(kind) {
            log::debug!("Mapping input as {kind:?}");
            self.last_kind = Some(kind);
        }

        let mapped = match kind {
            InputKind::Guitar => GuitarInputReport::read(data)
                .map(|input| guitar::apply_output(&mut self.output, &input, self.tilt)),
            InputKind::Drums => DrumInputReport::read(data).map(|input| {
                self.drums
                    .apply(&mut self.output, &input, self.settings.as_ref())
            }),
            #[cfg(debug_assertions)]
            InputKind::Gamepad => GamepadInputReport::read(data)
                .map(|input| super::gamepad::apply_output(&mut self.output, &input)),
        };
        if let Err(e) = mapped {
            log::debug!("Invalid {kind:?} report: {e}");
            return XboxResult::InvalidMessage;
        }
        self.output.submit()
    }
}

impl DeviceMapper for FallbackMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        match command {
            CommandId::Input => self.handle_input(data),
            CommandId::GhlInput => {
                let Some(input) = ghl::read_report(data) else {
                    return XboxResult::InvalidMessage;
                };
                ghl::apply_output(&mut self.output, &input);
                self.output.submit()
            }
            _ => XboxResult::Success,
        }
    }

    fn map_guide_button(&mut self, pressed: bool) {
        self.output.map_guide_button(pressed);
    }

    fn reset_report(&mut self) {
        self.output.reset();
    }
}
