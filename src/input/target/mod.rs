//! Virtual controllers that mapped input is written to. Two kinds of target
//! exist: an Xbox 360 style gamepad and a generic joystick with numbered
//! buttons, a hat and three axes.
use std::{io, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use self::{joystick::JoystickState, xb360::X360Report};

pub mod joystick;
pub mod memory;
pub mod uinput;
pub mod xb360;

#[cfg(test)]
mod target_test;

/// Possible errors creating or updating a virtual controller
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("no {0} devices are available")]
    Unavailable(&'static str),
    #[error("failed to create virtual device: {0}")]
    CreateFailed(io::Error),
    #[error("failed to update virtual device: {0}")]
    UpdateFailed(#[from] io::Error),
}

/// Low level Xbox 360 controller. Dropping the backend disconnects the
/// virtual device.
pub trait Xbox360Backend: Send {
    fn update(&mut self, report: &X360Report) -> Result<(), TargetError>;
}

/// Low level joystick. Dropping the backend releases its device id.
pub trait JoystickBackend: Send {
    fn update(&mut self, state: &JoystickState) -> Result<(), TargetError>;
}

/// A newly created Xbox 360 controller. The backend acknowledges the
/// connection some time later by sending the assigned user index.
pub struct PendingXbox360 {
    pub backend: Box<dyn Xbox360Backend>,
    pub connected: oneshot::Receiver<u8>,
}

/// A newly acquired joystick and its device id
pub struct AcquiredJoystick {
    pub id: u8,
    pub backend: Box<dyn JoystickBackend>,
}

/// Creates virtual controllers
pub trait TargetFactory: Send + Sync {
    fn create_xbox360(&self) -> Result<PendingXbox360, TargetError>;
    fn create_joystick(&self) -> Result<AcquiredJoystick, TargetError>;
    /// Whether another Xbox 360 controller can be created
    fn xbox360_available(&self) -> bool;
    /// Whether another joystick can be acquired
    fn joystick_available(&self) -> bool;
}

/// Fixed set of device slots. Slots are handed out lowest index first and
/// returned when the [Slot] is dropped.
#[derive(Debug)]
pub struct SlotPool {
    slots: Mutex<Vec<bool>>,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(vec![false; capacity]),
        })
    }

    pub fn acquire(self: &Arc<Self>) -> Option<Slot> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|used| !used)?;
        slots[index] = true;
        Some(Slot {
            pool: self.clone(),
            index,
        })
    }

    pub fn available(&self) -> bool {
        self.slots.lock().iter().any(|used| !used)
    }

    pub fn in_use(&self) -> usize {
        self.slots.lock().iter().filter(|used| **used).count()
    }
}

/// An acquired slot of a [SlotPool]
#[derive(Debug)]
pub struct Slot {
    pool: Arc<SlotPool>,
    index: usize,
}

impl Slot {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut slots = self.pool.slots.lock();
        if let Some(used) = slots.get_mut(self.index) {
            *used = false;
        }
    }
}
