//! In-memory virtual controllers. The most recent reports are recorded so the
//! output of the mapping pipeline can be inspected without any kernel
//! devices, e.g. for dry runs.
use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{
    joystick::JoystickState, xb360::X360Report, AcquiredJoystick, JoystickBackend,
    PendingXbox360, Slot, SlotPool, TargetError, TargetFactory, Xbox360Backend,
};

/// Reports kept per controller, oldest dropped first
pub const HISTORY_LIMIT: usize = 256;

type History<T> = Arc<Mutex<VecDeque<T>>>;

fn record<T>(history: &History<T>, value: T) {
    let mut history = history.lock();
    if history.len() == HISTORY_LIMIT {
        history.pop_front();
    }
    history.push_back(value);
}

#[derive(Debug)]
struct Inner {
    xbox360_slots: Arc<SlotPool>,
    joystick_slots: Arc<SlotPool>,
    xbox360_history: Mutex<Vec<History<X360Report>>>,
    joystick_history: Mutex<Vec<History<JoystickState>>>,
    /// When false, connection acknowledgements are held until
    /// [MemoryTargets::acknowledge_all] is called.
    auto_acknowledge: bool,
    pending_acks: Mutex<Vec<(oneshot::Sender<u8>, u8)>>,
}

/// Factory for in-memory virtual controllers
#[derive(Debug, Clone)]
pub struct MemoryTargets {
    inner: Arc<Inner>,
}

impl MemoryTargets {
    pub fn new(max_xbox360: usize, max_joysticks: usize) -> Self {
        Self::with_acknowledge(max_xbox360, max_joysticks, true)
    }

    /// Create a factory whose Xbox 360 controllers stay pending until
    /// explicitly acknowledged
    pub fn manual_acknowledge(max_xbox360: usize, max_joysticks: usize) -> Self {
        Self::with_acknowledge(max_xbox360, max_joysticks, false)
    }

    fn with_acknowledge(max_xbox360: usize, max_joysticks: usize, auto: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                xbox360_slots: SlotPool::new(max_xbox360),
                joystick_slots: SlotPool::new(max_joysticks),
                xbox360_history: Mutex::new(Vec::new()),
                joystick_history: Mutex::new(Vec::new()),
                auto_acknowledge: auto,
                pending_acks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Send every held connection acknowledgement
    pub fn acknowledge_all(&self) {
        let pending: Vec<_> = self.inner.pending_acks.lock().drain(..).collect();
        for (tx, index) in pending {
            let _ = tx.send(index);
        }
    }

    /// Number of Xbox 360 controllers that have ever been created
    pub fn xbox360_created(&self) -> usize {
        self.inner.xbox360_history.lock().len()
    }

    /// Number of Xbox 360 controllers currently connected
    pub fn xbox360_connected(&self) -> usize {
        self.inner.xbox360_slots.in_use()
    }

    pub fn joysticks_created(&self) -> usize {
        self.inner.joystick_history.lock().len()
    }

    pub fn joysticks_acquired(&self) -> usize {
        self.inner.joystick_slots.in_use()
    }

    /// The most recent reports submitted to the nth created Xbox 360
    /// controller, at most [HISTORY_LIMIT]
    pub fn xbox360_reports(&self, nth: usize) -> Vec<X360Report> {
        let history = self.inner.xbox360_history.lock();
        history
            .get(nth)
            .map(|reports| reports.lock().iter().copied().collect())
            .unwrap_or_default()
    }

    /// Last report submitted to the nth created Xbox 360 controller
    pub fn last_xbox360_report(&self, nth: usize) -> Option<X360Report> {
        self.xbox360_reports(nth).last().copied()
    }

    pub fn joystick_states(&self, nth: usize) -> Vec<JoystickState> {
        let history = self.inner.joystick_history.lock();
        history
            .get(nth)
            .map(|states| states.lock().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn last_joystick_state(&self, nth: usize) -> Option<JoystickState> {
        self.joystick_states(nth).last().copied()
    }
}

impl TargetFactory for MemoryTargets {
    fn create_xbox360(&self) -> Result<PendingXbox360, TargetError> {
        let slot = self
            .inner
            .xbox360_slots
            .acquire()
            .ok_or(TargetError::Unavailable("Xbox 360"))?;
        let history: History<X360Report> = Default::default();
        self.inner.xbox360_history.lock().push(history.clone());

        let (tx, rx) = oneshot::channel();
        let user_index = slot.index() as u8;
        if self.inner.auto_acknowledge {
            let _ = tx.send(user_index);
        } else {
            self.inner.pending_acks.lock().push((tx, user_index));
        }

        Ok(PendingXbox360 {
            backend: Box::new(MemoryXbox360 {
                _slot: slot,
                history,
            }),
            connected: rx,
        })
    }

    fn create_joystick(&self) -> Result<AcquiredJoystick, TargetError> {
        let slot = self
            .inner
            .joystick_slots
            .acquire()
            .ok_or(TargetError::Unavailable("joystick"))?;
        let history: History<JoystickState> = Default::default();
        self.inner.joystick_history.lock().push(history.clone());

        Ok(AcquiredJoystick {
            id: slot.index() as u8 + 1,
            backend: Box::new(MemoryJoystick {
                _slot: slot,
                history,
            }),
        })
    }

    fn xbox360_available(&self) -> bool {
        self.inner.xbox360_slots.available()
    }

    fn joystick_available(&self) -> bool {
        self.inner.joystick_slots.available()
    }
}

struct MemoryXbox360 {
    _slot: Slot,
    history: History<X360Report>,
}

impl Xbox360Backend for MemoryXbox360 {
    fn update(&mut self, report: &X360Report) -> Result<(), TargetError> {
        log::trace!("Xbox 360 report: {report:?}");
        record(&self.history, *report);
        Ok(())
    }
}

struct MemoryJoystick {
    _slot: Slot,
    history: History<JoystickState>,
}

impl JoystickBackend for MemoryJoystick {
    fn update(&mut self, state: &JoystickState) -> Result<(), TargetError> {
        log::trace!("Joystick state: {state:?}");
        record(&self.history, *state);
        Ok(())
    }
}
