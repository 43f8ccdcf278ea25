//! GIP devices discovered through hotplug notifications. Arrivals are
//! handled as they are delivered; removals, including readers that failed,
//! go through a queue and are handled by a separate task.
use std::{
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{Stream, StreamExt};
use nusb::{hotplug::HotplugEvent, DeviceId, DeviceInfo};
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::{self, JoinHandle},
};

use crate::input::mapping::MapperContext;

use super::{
    usb::{device_name, is_gip_device, run_channel, UsbChannel},
    ChannelError, DeviceMap, LoopExit, ReadControl, Reader,
};

/// Start the task stopping readers whose key arrives on the returned queue.
/// The task ends once every sender is gone.
pub(super) fn spawn_removals<K>(
    devices: Arc<DeviceMap<K, Reader>>,
) -> (mpsc::UnboundedSender<K>, JoinHandle<()>)
where
    K: Eq + Hash + Debug + Send + 'static,
{
    let (removals, mut removal_rx) = mpsc::unbounded_channel::<K>();
    let task = tokio::spawn(async move {
        while let Some(key) = removal_rx.recv().await {
            // Both the reader and the disconnect event may queue a device
            let Some(reader) = devices.remove(&key) else {
                continue;
            };
            reader.stop().await;
            log::info!("Hotplug device {key:?} disconnected");
        }
        log::debug!("Hotplug removal queue closed");
    });
    (removals, task)
}

/// Stop every reader still in `devices`, then wait for the removal task.
/// Readers hold queue senders, so the queue only closes after the last
/// reader has exited.
pub(super) async fn release<K: Eq + Hash>(
    devices: &DeviceMap<K, Reader>,
    removal_task: Option<JoinHandle<()>>,
) {
    for reader in devices.drain() {
        reader.stop().await;
    }
    if let Some(task) = removal_task {
        let _ = task.await;
    }
}

/// Everything the watch task needs to start readers
#[derive(Clone)]
struct Spawner {
    ctx: MapperContext,
    read_timeout: Duration,
    devices: Arc<DeviceMap<DeviceId, Reader>>,
    inputs_enabled: Arc<AtomicBool>,
    removals: mpsc::UnboundedSender<DeviceId>,
}

impl Spawner {
    fn arrived(&self, info: DeviceInfo) {
        if !is_gip_device(&info) {
            return;
        }
        let id = info.id();
        let inserted = self.devices.insert_with(id, || {
            let info = info.clone();
            let control = Arc::new(ReadControl::new(self.inputs_enabled.load(Ordering::Acquire)));
            let reader_control = control.clone();
            let ctx = self.ctx.clone();
            let read_timeout = self.read_timeout;
            let removals = self.removals.clone();
            let runtime = Handle::current();

            let handle = task::spawn_blocking(move || {
                let name = device_name(&info);
                let exit = match UsbChannel::open(&info) {
                    Ok(channel) => {
                        run_channel(&name, channel, ctx, runtime, read_timeout, &reader_control)
                    }
                    Err(e) => {
                        log::error!("{name}: failed to open device: {e}");
                        LoopExit::Failed
                    }
                };
                log::debug!("{name}: reader exited ({exit:?})");
                if exit != LoopExit::Stopped {
                    let _ = removals.send(id);
                }
            });
            Some(Reader::task(control, handle))
        });
        if inserted {
            log::info!("Hotplug device {} connected", device_name(&info));
        }
    }
}

/// Transport following USB hotplug notifications
pub struct HotplugTransport {
    ctx: MapperContext,
    read_timeout: Duration,
    devices: Arc<DeviceMap<DeviceId, Reader>>,
    inputs_enabled: Arc<AtomicBool>,
    watch_task: Option<JoinHandle<()>>,
    removal_task: Option<JoinHandle<()>>,
}

impl HotplugTransport {
    pub fn new(ctx: MapperContext, read_timeout: Duration, count: watch::Sender<usize>) -> Self {
        Self {
            ctx,
            read_timeout,
            devices: Arc::new(DeviceMap::new(count)),
            inputs_enabled: Arc::new(AtomicBool::new(false)),
            watch_task: None,
            removal_task: None,
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Whether either task is alive
    pub fn is_running(&self) -> bool {
        self.watch_task.is_some() || self.removal_task.is_some()
    }

    /// Start following hotplug notifications. Devices already present are
    /// added right away.
    pub fn start(&mut self) -> Result<(), ChannelError> {
        if self.is_running() {
            return Ok(());
        }
        // Watch before listing so no arrival falls in between
        let watch = nusb::watch_devices()?;
        self.start_with(watch, || Ok(nusb::list_devices()?))
    }

    /// Start from a stream of events and the devices listed by `list`.
    /// Nothing is spawned unless listing succeeds.
    pub(super) fn start_with<W, L, I>(&mut self, mut watch: W, list: L) -> Result<(), ChannelError>
    where
        W: Stream<Item = HotplugEvent> + Send + Unpin + 'static,
        L: FnOnce() -> Result<I, ChannelError>,
        I: IntoIterator<Item = DeviceInfo>,
    {
        let present = list()?;

        let (removals, removal_task) = spawn_removals(self.devices.clone());
        self.removal_task = Some(removal_task);

        let spawner = Spawner {
            ctx: self.ctx.clone(),
            read_timeout: self.read_timeout,
            devices: self.devices.clone(),
            inputs_enabled: self.inputs_enabled.clone(),
            removals,
        };
        for info in present {
            spawner.arrived(info);
        }

        self.watch_task = Some(tokio::spawn(async move {
            while let Some(event) = watch.next().await {
                match event {
                    HotplugEvent::Connected(info) => spawner.arrived(info),
                    // Never removed from here, the reader may still be
                    // using the device
                    HotplugEvent::Disconnected(id) => {
                        let _ = spawner.removals.send(id);
                    }
                }
            }
            log::debug!("Hotplug watch ended");
        }));

        Ok(())
    }

    pub fn enable_inputs(&self, enabled: bool) {
        self.inputs_enabled.store(enabled, Ordering::Release);
        self.devices
            .for_each(|reader| reader.control().enable_inputs(enabled));
    }

    /// Stop following notifications, wait for in-flight work to finish and
    /// release every device
    pub async fn stop(&mut self) {
        if let Some(task) = self.watch_task.take() {
            task.abort();
            let _ = task.await;
        }
        release(&self.devices, self.removal_task.take()).await;
    }
}
