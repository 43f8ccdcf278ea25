use bitflags::bitflags;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::drivers::gip::XboxResult;

use super::{TargetError, TargetFactory, Xbox360Backend};

bitflags! {
    /// Xbox 360 button word
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct X360Buttons: u16 {
        const DPAD_UP = 0x0001;
        const DPAD_DOWN = 0x0002;
        const DPAD_LEFT = 0x0004;
        const DPAD_RIGHT = 0x0008;
        const START = 0x0010;
        const BACK = 0x0020;
        const LEFT_THUMB = 0x0040;
        const RIGHT_THUMB = 0x0080;
        const LEFT_SHOULDER = 0x0100;
        const RIGHT_SHOULDER = 0x0200;
        const GUIDE = 0x0400;
        const A = 0x1000;
        const B = 0x2000;
        const X = 0x4000;
        const Y = 0x8000;
    }
}

/// Full state of an Xbox 360 controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct X360Report {
    pub buttons: X360Buttons,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl X360Report {
    pub fn set_button(&mut self, button: X360Buttons, pressed: bool) {
        self.buttons.set(button, pressed);
    }

    pub fn pressed(&self, button: X360Buttons) -> bool {
        self.buttons.contains(button)
    }

    pub fn reset(&mut self) {
        *self = X360Report::default();
    }
}

#[derive(Debug)]
enum ConnectionState {
    /// Waiting for the backend to acknowledge the connection
    Pending(oneshot::Receiver<u8>),
    Connected { user_index: u8 },
}

/// Owns one virtual Xbox 360 controller for its whole lifetime. Reports are
/// only submitted after the backend has acknowledged the connection; until
/// then submitting returns [XboxResult::Pending].
pub struct Xbox360Controller {
    backend: Option<Box<dyn Xbox360Backend>>,
    state: ConnectionState,
    report: X360Report,
}

impl Xbox360Controller {
    pub fn new(factory: &dyn TargetFactory) -> Result<Self, TargetError> {
        let pending = factory.create_xbox360()?;
        Ok(Self {
            backend: Some(pending.backend),
            state: ConnectionState::Pending(pending.connected),
            report: X360Report::default(),
        })
    }

    pub fn report(&self) -> &X360Report {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut X360Report {
        &mut self.report
    }

    /// Checks for a connection acknowledgement without blocking
    pub fn is_connected(&mut self) -> bool {
        let ConnectionState::Pending(rx) = &mut self.state else {
            return true;
        };
        match rx.try_recv() {
            Ok(user_index) => {
                log::debug!("Created new virtual Xbox 360 controller with user index {user_index}");
                self.state = ConnectionState::Connected { user_index };
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                log::trace!("Virtual Xbox 360 controller acknowledgement channel closed");
                false
            }
        }
    }

    pub fn user_index(&self) -> Option<u8> {
        match self.state {
            ConnectionState::Connected { user_index } => Some(user_index),
            ConnectionState::Pending(_) => None,
        }
    }

    /// Write the current report to the virtual device
    pub fn submit(&mut self) -> XboxResult {
        if !self.is_connected() {
            return XboxResult::Pending;
        }
        let Some(backend) = self.backend.as_mut() else {
            return XboxResult::Disconnected;
        };
        if let Err(e) = backend.update(&self.report) {
            log::debug!("Failed to submit Xbox 360 report: {e}");
        }
        XboxResult::Success
    }

    pub fn map_guide_button(&mut self, pressed: bool) {
        self.report.set_button(X360Buttons::GUIDE, pressed);
        self.submit();
    }

    /// Return the report to neutral and submit it
    pub fn reset(&mut self) {
        self.report.reset();
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.update(&self.report) {
                log::debug!("Failed to reset Xbox 360 report: {e}");
            }
        }
    }
}

impl Drop for Xbox360Controller {
    fn drop(&mut self) {
        self.reset();
        if self.backend.take().is_some() {
            log::debug!("Disconnected virtual Xbox 360 controller");
        }
    }
}
