//! Physical channels that GIP devices are read from. Both transports share
//! the same blocking read loop and the same concurrent device map; they only
//! differ in how devices are discovered and removed.
use std::{
    collections::HashMap,
    hash::Hash,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use nusb::transfer::TransferError;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::{sync::watch, task};

use crate::drivers::gip::{command::PowerMode, message::Message, XboxResult};

use super::{
    device::{Device, PacketSink},
    mapping::MapperContext,
};

pub mod hotplug;
pub mod usb;

#[cfg(test)]
mod hotplug_test;
#[cfg(test)]
mod mod_test;

/// Number of consecutive read errors before a channel is considered failed
pub const READ_RETRIES: usize = 3;

/// Possible errors reading from or writing to a physical channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("failed to access device: {0}")]
    Io(#[from] io::Error),
    #[error("device has no GIP interface")]
    NoInterface,
    #[error("transfer failed: {0}")]
    Transfer(TransferError),
    #[error("device was disconnected")]
    Disconnected,
}

impl From<TransferError> for ChannelError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Disconnected => Self::Disconnected,
            err => Self::Transfer(err),
        }
    }
}

/// The inbound half of a physical channel
pub trait PacketSource: Send {
    /// Blocking read of a single transfer. Returns `None` when the read timed
    /// out without data.
    fn read_packet(&mut self) -> Result<Option<Vec<u8>>, ChannelError>;
}

/// Flags shared between a read loop and the transport that owns it
#[derive(Debug, Default)]
pub struct ReadControl {
    stop_requested: AtomicBool,
    inputs_enabled: AtomicBool,
}

impl ReadControl {
    pub fn new(inputs_enabled: bool) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            inputs_enabled: AtomicBool::new(inputs_enabled),
        }
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Applied by the read loop on its next iteration
    pub fn enable_inputs(&self, enabled: bool) {
        self.inputs_enabled.store(enabled, Ordering::Release);
    }

    pub fn inputs_enabled(&self) -> bool {
        self.inputs_enabled.load(Ordering::Acquire)
    }
}

/// Why a read loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The owning transport asked the loop to stop
    Stopped,
    /// Reads kept failing
    Failed,
    /// The device went away
    Disconnected,
    /// The device itself is not supported
    Unsupported,
}

/// Read one transfer, retrying failed reads in place
fn read_with_retry<R: PacketSource>(
    name: &str,
    source: &mut R,
    control: &ReadControl,
) -> Result<Option<Vec<u8>>, LoopExit> {
    let mut attempt = 0;
    loop {
        match source.read_packet() {
            Ok(data) => return Ok(data),
            Err(ChannelError::Disconnected) => return Err(LoopExit::Disconnected),
            Err(e) => {
                attempt += 1;
                log::debug!("{name}: read failed (attempt {attempt}/{READ_RETRIES}): {e}");
                if attempt >= READ_RETRIES {
                    log::error!("{name}: giving up after {READ_RETRIES} failed reads");
                    return Err(LoopExit::Failed);
                }
                if control.stop_requested() {
                    return Err(LoopExit::Stopped);
                }
            }
        }
    }
}

/// Feed transfers from `source` into `device` until the transport stops the
/// loop, the channel fails or the device turns out to be unsupported.
pub fn run_read_loop<S: PacketSink, R: PacketSource>(
    device: &mut Device<S>,
    source: &mut R,
    control: &ReadControl,
) -> LoopExit {
    while !control.stop_requested() {
        let data = match read_with_retry(device.name(), source, control) {
            Ok(data) => data,
            Err(exit) => return exit,
        };

        let enabled = control.inputs_enabled();
        if enabled != device.inputs_enabled() {
            device.enable_inputs(enabled);
        }

        let Some(data) = data else {
            continue;
        };
        if device.handle_raw(&data) == XboxResult::UnsupportedDevice {
            return LoopExit::Unsupported;
        }
    }

    LoopExit::Stopped
}

/// Run a device over an opened channel until its read loop exits. The device
/// is told to reset when the transport stops it, and to power off when it is
/// not supported.
pub fn run_device<R: PacketSource, S: PacketSink>(
    name: &str,
    source: &mut R,
    sink: S,
    ctx: MapperContext,
    control: &ReadControl,
) -> LoopExit {
    let mut device = Device::new(name, sink, ctx);
    device.enable_inputs(control.inputs_enabled());

    let exit = run_read_loop(&mut device, source, control);
    match exit {
        LoopExit::Stopped => {
            device.send(Message::power_mode(PowerMode::Reset));
        }
        LoopExit::Unsupported => {
            log::info!("{name}: device is not supported, powering it off");
            device.send(Message::power_mode(PowerMode::Off));
        }
        LoopExit::Failed | LoopExit::Disconnected => {}
    }
    exit
}

/// How a running reader is joined
#[derive(Debug)]
enum ReaderJoin {
    Thread(thread::JoinHandle<()>),
    Task(task::JoinHandle<()>),
}

/// A running read loop and the flags controlling it
#[derive(Debug)]
pub struct Reader {
    control: Arc<ReadControl>,
    join: ReaderJoin,
}

impl Reader {
    pub fn thread(control: Arc<ReadControl>, handle: thread::JoinHandle<()>) -> Self {
        Self {
            control,
            join: ReaderJoin::Thread(handle),
        }
    }

    pub fn task(control: Arc<ReadControl>, handle: task::JoinHandle<()>) -> Self {
        Self {
            control,
            join: ReaderJoin::Task(handle),
        }
    }

    pub fn control(&self) -> &ReadControl {
        &self.control
    }

    /// Stop the read loop and wait for it to exit
    pub async fn stop(self) {
        self.control.request_stop();
        let result = match self.join {
            ReaderJoin::Thread(handle) => task::spawn_blocking(move || handle.join().is_ok())
                .await
                .unwrap_or(false),
            ReaderJoin::Task(handle) => handle.await.is_ok(),
        };
        if !result {
            log::error!("Device reader exited abnormally");
        }
    }
}

/// Devices owned by a transport. Every mutation is a single locked
/// operation, and the shared device count is updated as part of it.
#[derive(Debug)]
pub struct DeviceMap<K, V> {
    devices: Mutex<HashMap<K, V>>,
    count: watch::Sender<usize>,
}

impl<K: Eq + Hash, V> DeviceMap<K, V> {
    /// Create a map contributing to the given device count
    pub fn new(count: watch::Sender<usize>) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            count,
        }
    }

    /// Insert the value produced by `create` unless the key is already
    /// present. `create` runs with the map locked and may decline by
    /// returning `None`. Returns whether a value was inserted.
    pub fn insert_with<F>(&self, key: K, create: F) -> bool
    where
        F: FnOnce() -> Option<V>,
    {
        let mut devices = self.devices.lock();
        if devices.contains_key(&key) {
            return false;
        }
        let Some(value) = create() else {
            return false;
        };
        devices.insert(key, value);
        self.count.send_modify(|count| *count += 1);
        true
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.devices.lock().remove(key);
        if removed.is_some() {
            self.count.send_modify(|count| *count = count.saturating_sub(1));
        }
        removed
    }

    /// Remove every device
    pub fn drain(&self) -> Vec<V> {
        let drained: Vec<V> = self.devices.lock().drain().map(|(_, v)| v).collect();
        if !drained.is_empty() {
            let n = drained.len();
            self.count.send_modify(|count| *count = count.saturating_sub(n));
        }
        drained
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.devices.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }

    /// Run `f` on every device while the map is locked
    pub fn for_each<F: FnMut(&V)>(&self, f: F) {
        self.devices.lock().values().for_each(f);
    }
}
