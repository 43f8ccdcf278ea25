//! Translation of decoded instrument reports into virtual controller state.
//! Each kind of device has its own mapper, and every mapper owns exactly one
//! virtual controller for its lifetime.
use std::sync::Arc;

use crate::drivers::gip::{
    command::CommandId,
    hid_report::{Keystroke, GUIDE_KEY_CODE},
    message::Message,
    XboxResult,
};

use super::settings::{MappingMode, MappingSettings};
use super::target::{
    joystick::JoystickController, xb360::Xbox360Controller, TargetError, TargetFactory,
};

pub mod drums;
pub mod fallback;
#[cfg(debug_assertions)]
pub mod gamepad;
pub mod ghl;
pub mod guitar;
pub mod resolver;
pub mod riffmaster;
pub mod value;
pub mod wireless_legacy;

#[cfg(test)]
mod fallback_test;
#[cfg(test)]
mod guitar_test;
#[cfg(test)]
mod resolver_test;

/// Everything needed to construct a mapper
#[derive(Clone)]
pub struct MapperContext {
    pub factory: Arc<dyn TargetFactory>,
    pub settings: Arc<MappingSettings>,
    /// Whether the guide key fires the virtual guide button
    pub map_guide_button: bool,
    /// Whether devices without a recognized interface get the fallback
    /// mapper instead of being rejected
    pub fallback_mapping: bool,
}

impl MapperContext {
    /// Whether another virtual controller for the current mode can be created
    pub fn target_available(&self) -> bool {
        if self.settings.mode().uses_xbox360() {
            self.factory.xbox360_available()
        } else {
            self.factory.joystick_available()
        }
    }
}

/// The virtual controller a mapper writes to
pub enum Output {
    Xbox360(Xbox360Controller),
    Joystick(JoystickController),
}

impl Output {
    /// Create the output matching the given mapping mode
    pub fn new(mode: MappingMode, factory: &dyn TargetFactory) -> Result<Self, TargetError> {
        if mode.uses_xbox360() {
            Ok(Output::Xbox360(Xbox360Controller::new(factory)?))
        } else {
            Ok(Output::Joystick(JoystickController::new(factory)?))
        }
    }

    pub fn submit(&mut self) -> XboxResult {
        match self {
            Output::Xbox360(controller) => controller.submit(),
            Output::Joystick(joystick) => joystick.submit(),
        }
    }

    pub fn map_guide_button(&mut self, pressed: bool) {
        match self {
            Output::Xbox360(controller) => controller.map_guide_button(pressed),
            Output::Joystick(joystick) => joystick.map_guide_button(pressed),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Output::Xbox360(controller) => controller.reset(),
            Output::Joystick(joystick) => joystick.reset(),
        }
    }
}

/// Capabilities every concrete mapper provides
pub trait DeviceMapper: Send {
    /// Handle a complete message from the device
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult;
    fn map_guide_button(&mut self, pressed: bool);
    /// Return the virtual controller to neutral
    fn reset_report(&mut self);
    /// Messages to send to the device once the mapper is bound
    fn initial_messages(&self) -> Vec<Message> {
        Vec::new()
    }
}

/// Every kind of mapper
pub enum MapperKind {
    Guitar(guitar::GuitarMapper),
    Riffmaster(riffmaster::RiffmasterMapper),
    Drums(drums::DrumsMapper),
    Ghl(ghl::GhlMapper),
    Fallback(fallback::FallbackMapper),
    WirelessLegacy(wireless_legacy::WirelessLegacyMapper),
    #[cfg(debug_assertions)]
    Gamepad(gamepad::GamepadMapper),
}

impl MapperKind {
    fn inner(&mut self) -> &mut dyn DeviceMapper {
        match self {
            MapperKind::Guitar(m) => m,
            MapperKind::Riffmaster(m) => m,
            MapperKind::Drums(m) => m,
            MapperKind::Ghl(m) => m,
            MapperKind::Fallback(m) => m,
            MapperKind::WirelessLegacy(m) => m,
            #[cfg(debug_assertions)]
            MapperKind::Gamepad(m) => m,
        }
    }

    fn inner_ref(&self) -> &dyn DeviceMapper {
        match self {
            MapperKind::Guitar(m) => m,
            MapperKind::Riffmaster(m) => m,
            MapperKind::Drums(m) => m,
            MapperKind::Ghl(m) => m,
            MapperKind::Fallback(m) => m,
            MapperKind::WirelessLegacy(m) => m,
            #[cfg(debug_assertions)]
            MapperKind::Gamepad(m) => m,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MapperKind::Guitar(_) => "guitar",
            MapperKind::Riffmaster(_) => "riffmaster",
            MapperKind::Drums(_) => "drums",
            MapperKind::Ghl(_) => "ghl guitar",
            MapperKind::Fallback(_) => "fallback",
            MapperKind::WirelessLegacy(_) => "wireless legacy",
            #[cfg(debug_assertions)]
            MapperKind::Gamepad(_) => "gamepad",
        }
    }
}

/// A bound mapper. Handles the options shared by every kind of mapper and
/// forwards everything else to the concrete mapper.
pub struct Mapper {
    kind: MapperKind,
    map_guide_button: bool,
    inputs_enabled: bool,
}

impl Mapper {
    pub fn new(kind: MapperKind, map_guide_button: bool) -> Self {
        Self {
            kind,
            map_guide_button,
            inputs_enabled: true,
        }
    }

    pub fn kind(&self) -> &MapperKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if !self.inputs_enabled {
            return XboxResult::Success;
        }
        self.kind.inner().handle_message(command, data)
    }

    /// Fire the guide button if the key is the guide key and guide mapping
    /// is enabled for this device
    pub fn handle_keystroke(&mut self, key: &Keystroke) -> XboxResult {
        if !self.inputs_enabled {
            return XboxResult::Success;
        }
        if key.key_code == GUIDE_KEY_CODE && self.map_guide_button {
            self.kind.inner().map_guide_button(key.pressed);
        }
        XboxResult::Success
    }

    pub fn map_guide_button(&mut self, pressed: bool) {
        self.kind.inner().map_guide_button(pressed);
    }

    pub fn reset_report(&mut self) {
        self.kind.inner().reset_report();
    }

    /// Disabling inputs returns the virtual controller to neutral and drops
    /// reports until inputs are enabled again
    pub fn enable_inputs(&mut self, enabled: bool) {
        if self.inputs_enabled == enabled {
            return;
        }
        self.inputs_enabled = enabled;
        if !enabled {
            self.reset_report();
        }
    }

    pub fn inputs_enabled(&self) -> bool {
        self.inputs_enabled
    }

    pub fn initial_messages(&self) -> Vec<Message> {
        self.kind.inner_ref().initial_messages()
    }
}
