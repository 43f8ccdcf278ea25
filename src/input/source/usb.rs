//! GIP devices on the USB bus. Devices are found by enumerating the bus and
//! by following arrivals, and every device is read on its own OS thread.
use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use futures::StreamExt;
use nusb::{
    hotplug::HotplugEvent,
    transfer::{Direction, EndpointType, RequestBuffer, TransferError},
    DeviceInfo, Interface,
};
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};

use crate::{
    drivers::gip::XboxResult,
    input::{device::PacketSink, mapping::MapperContext},
};

use super::{run_device, ChannelError, DeviceMap, LoopExit, PacketSource, ReadControl, Reader};

/// Interface class, subclass and protocol of the GIP interface
const GIP_CLASS: u8 = 0xFF;
const GIP_SUBCLASS: u8 = 0x47;
const GIP_PROTOCOL: u8 = 0xD0;

/// Number of attempts made for each outbound transfer
const WRITE_RETRIES: usize = 3;

/// Whether the device exposes a GIP interface
pub fn is_gip_device(info: &DeviceInfo) -> bool {
    info.interfaces().any(|iface| {
        iface.class() == GIP_CLASS
            && iface.subclass() == GIP_SUBCLASS
            && iface.protocol() == GIP_PROTOCOL
    })
}

/// Name used for the device in logs, e.g. "usb:001/004"
pub fn device_name(info: &DeviceInfo) -> String {
    format!(
        "usb:{:03}/{:03}",
        info.bus_number(),
        info.device_address()
    )
}

/// A claimed GIP interface and its interrupt endpoints
pub struct UsbChannel {
    interface: Interface,
    in_endpoint: u8,
    in_packet_size: usize,
    out_endpoint: u8,
    out_packet_size: usize,
}

/// Endpoint addresses and sizes found in the active configuration
struct Endpoints {
    interface: u8,
    in_endpoint: (u8, usize),
    out_endpoint: (u8, usize),
}

impl UsbChannel {
    pub fn open(info: &DeviceInfo) -> Result<Self, ChannelError> {
        let device = info.open()?;
        let endpoints = {
            let config = device
                .active_configuration()
                .map_err(|e| io::Error::other(e.to_string()))?;
            config
                .interface_alt_settings()
                .filter(|alt| {
                    alt.alternate_setting() == 0
                        && alt.class() == GIP_CLASS
                        && alt.subclass() == GIP_SUBCLASS
                        && alt.protocol() == GIP_PROTOCOL
                })
                .find_map(|alt| {
                    // The main interface uses interrupt transfers both ways
                    let find = |direction: Direction| {
                        alt.endpoints()
                            .find(|ep| {
                                ep.transfer_type() == EndpointType::Interrupt
                                    && ep.direction() == direction
                            })
                            .map(|ep| (ep.address(), ep.max_packet_size()))
                    };
                    Some(Endpoints {
                        interface: alt.interface_number(),
                        in_endpoint: find(Direction::In)?,
                        out_endpoint: find(Direction::Out)?,
                    })
                })
                .ok_or(ChannelError::NoInterface)?
        };

        let interface = device.claim_interface(endpoints.interface)?;
        log::debug!(
            "Claimed GIP interface {} (in 0x{:02x}, out 0x{:02x})",
            endpoints.interface,
            endpoints.in_endpoint.0,
            endpoints.out_endpoint.0
        );

        Ok(Self {
            interface,
            in_endpoint: endpoints.in_endpoint.0,
            in_packet_size: endpoints.in_endpoint.1,
            out_endpoint: endpoints.out_endpoint.0,
            out_packet_size: endpoints.out_endpoint.1,
        })
    }

    /// Split into blocking halves. Transfers are driven on `runtime`, so the
    /// halves must only be used outside of an async context.
    pub fn split(self, runtime: Handle, read_timeout: Duration) -> (UsbReader, UsbWriter) {
        let reader = UsbReader {
            interface: self.interface.clone(),
            endpoint: self.in_endpoint,
            packet_size: self.in_packet_size,
            timeout: read_timeout,
            runtime: runtime.clone(),
        };
        let writer = UsbWriter {
            interface: self.interface,
            endpoint: self.out_endpoint,
            packet_size: self.out_packet_size,
            runtime,
        };
        (reader, writer)
    }
}

pub struct UsbReader {
    interface: Interface,
    endpoint: u8,
    packet_size: usize,
    timeout: Duration,
    runtime: Handle,
}

impl PacketSource for UsbReader {
    fn read_packet(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        let transfer = self
            .interface
            .interrupt_in(self.endpoint, RequestBuffer::new(self.packet_size));
        let timeout = self.timeout;
        let result = self
            .runtime
            .block_on(async move { tokio::time::timeout(timeout, transfer).await });

        // Dropping the timed out transfer cancels it
        let Ok(completion) = result else {
            return Ok(None);
        };
        let data = completion.into_result()?;
        Ok(Some(data))
    }
}

pub struct UsbWriter {
    interface: Interface,
    endpoint: u8,
    packet_size: usize,
    runtime: Handle,
}

impl PacketSink for UsbWriter {
    fn max_packet_size(&self) -> usize {
        self.packet_size
    }

    fn send_packet(&mut self, data: &[u8]) -> XboxResult {
        for attempt in 1..=WRITE_RETRIES {
            let transfer = self.interface.interrupt_out(self.endpoint, data.to_vec());
            match self.runtime.block_on(transfer).into_result() {
                Ok(_) => return XboxResult::Success,
                Err(TransferError::Disconnected) => return XboxResult::Disconnected,
                Err(e) => {
                    log::debug!("Failed to send packet (attempt {attempt}/{WRITE_RETRIES}): {e}");
                }
            }
        }
        XboxResult::Disconnected
    }
}

/// Run the read loop of an opened channel
pub fn run_channel(
    name: &str,
    channel: UsbChannel,
    ctx: MapperContext,
    runtime: Handle,
    read_timeout: Duration,
    control: &ReadControl,
) -> LoopExit {
    let (mut reader, writer) = channel.split(runtime, read_timeout);
    run_device(name, &mut reader, writer, ctx, control)
}

/// Everything needed to start a read thread, shared with the watch task
#[derive(Clone)]
struct ThreadSpawner {
    ctx: MapperContext,
    read_timeout: Duration,
    runtime: Handle,
    devices: Arc<DeviceMap<String, Reader>>,
    inputs_enabled: Arc<AtomicBool>,
}

impl ThreadSpawner {
    fn spawn_reader(&self, info: DeviceInfo) -> bool {
        let name = device_name(&info);
        self.devices.insert_with(name.clone(), || {
            let control = Arc::new(ReadControl::new(self.inputs_enabled.load(Ordering::Acquire)));
            let thread_control = control.clone();
            let devices = self.devices.clone();
            let ctx = self.ctx.clone();
            let runtime = self.runtime.clone();
            let read_timeout = self.read_timeout;
            let thread_name = name.clone();

            let result = thread::Builder::new().name(name.clone()).spawn(move || {
                let name = thread_name;
                log::info!("USB device {name} connected");
                let exit = match UsbChannel::open(&info) {
                    Ok(channel) => {
                        run_channel(&name, channel, ctx, runtime, read_timeout, &thread_control)
                    }
                    Err(e) => {
                        log::error!("{name}: failed to open device: {e}");
                        LoopExit::Failed
                    }
                };
                // Already gone if the transport stopped this reader
                if devices.remove(&name).is_some() {
                    log::info!("USB device {name} disconnected ({exit:?})");
                }
            });

            match result {
                Ok(handle) => Some(Reader::thread(control, handle)),
                Err(e) => {
                    log::error!("{name}: failed to start read thread: {e}");
                    None
                }
            }
        })
    }
}

/// Transport reading every GIP device found on the USB bus. Once started,
/// devices plugged in later are picked up as they arrive. A reader removes
/// its own device when the device goes away.
pub struct UsbTransport {
    spawner: ThreadSpawner,
    watch_task: Option<JoinHandle<()>>,
}

impl UsbTransport {
    pub fn new(
        ctx: MapperContext,
        read_timeout: Duration,
        runtime: Handle,
        count: watch::Sender<usize>,
    ) -> Self {
        Self {
            spawner: ThreadSpawner {
                ctx,
                read_timeout,
                runtime,
                devices: Arc::new(DeviceMap::new(count)),
                inputs_enabled: Arc::new(AtomicBool::new(false)),
            },
            watch_task: None,
        }
    }

    pub fn device_count(&self) -> usize {
        self.spawner.devices.len()
    }

    pub fn is_watching(&self) -> bool {
        self.watch_task.is_some()
    }

    /// Read every GIP device on the bus and follow arrivals from now on.
    /// Returns the number of devices added.
    pub fn start(&mut self) -> Result<usize, ChannelError> {
        if self.is_watching() {
            return self.refresh();
        }

        // Watch before listing so no arrival falls in between
        let mut watch = nusb::watch_devices()?;
        let added = self.refresh()?;

        let spawner = self.spawner.clone();
        self.watch_task = Some(self.spawner.runtime.spawn(async move {
            while let Some(event) = watch.next().await {
                if let HotplugEvent::Connected(info) = event {
                    if is_gip_device(&info) {
                        spawner.spawn_reader(info);
                    }
                }
            }
            log::debug!("USB device watch ended");
        }));
        Ok(added)
    }

    /// Enumerate the bus and start reading any GIP device not read yet.
    /// Returns the number of devices added.
    pub fn refresh(&self) -> Result<usize, ChannelError> {
        let mut added = 0;
        for info in nusb::list_devices()? {
            if is_gip_device(&info) && self.spawner.spawn_reader(info) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn enable_inputs(&self, enabled: bool) {
        self.spawner.inputs_enabled.store(enabled, Ordering::Release);
        self.spawner
            .devices
            .for_each(|reader| reader.control().enable_inputs(enabled));
    }

    /// Stop following arrivals, then stop every read thread and wait for
    /// them to exit
    pub async fn stop(&mut self) {
        if let Some(task) = self.watch_task.take() {
            task.abort();
            let _ = task.await;
        }
        for reader in self.spawner.devices.drain() {
            reader.stop().await;
        }
    }
}
