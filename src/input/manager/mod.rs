//! The [Manager] owns the transports and the live mapping settings. It is
//! driven by [ManagerCommand]s sent through a [ManagerClient], e.g. by the
//! DBus interface.
use std::{error::Error, sync::Arc};

use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
};

use crate::config::Config;

use super::{
    mapping::MapperContext,
    settings::{MappingMode, MappingSettings},
    source::{hotplug::HotplugTransport, usb::UsbTransport, ChannelError},
    target::TargetFactory,
};

pub mod client;


pub use client::{ClientError, ManagerClient};

const BUFFER_SIZE: usize = 64;

/// Manager commands define all the different ways to interact with [Manager]
/// over a channel. These commands are processed in an asyncronous thread and
/// dispatched as they come in.
#[derive(Debug)]
pub enum ManagerCommand {
    StartCapture {
        sender: mpsc::Sender<Result<(), String>>,
    },
    StopCapture {
        sender: mpsc::Sender<()>,
    },
    /// Release every device and capture again, giving each device a new
    /// chance to be mapped
    Refresh {
        sender: mpsc::Sender<Result<usize, String>>,
    },
    IsCapturing {
        sender: mpsc::Sender<bool>,
    },
    SetMappingMode {
        mode: MappingMode,
    },
    GetMappingMode {
        sender: mpsc::Sender<MappingMode>,
    },
    SetAccurateDrumMappings {
        enabled: bool,
    },
    GetAccurateDrumMappings {
        sender: mpsc::Sender<bool>,
    },
    GetDeviceCount {
        sender: mpsc::Sender<usize>,
    },
    /// Stop capturing and exit the command loop
    Stop,
}

/// Manages instrument capture
pub struct Manager {
    config: Config,
    settings: Arc<MappingSettings>,
    factory: Arc<dyn TargetFactory>,
    /// The transmit side of the [rx] channel, cloned into every client
    tx: mpsc::Sender<ManagerCommand>,
    rx: mpsc::Receiver<ManagerCommand>,
    /// Number of devices read by all transports together
    device_count: watch::Sender<usize>,
    usb: Option<UsbTransport>,
    hotplug: Option<HotplugTransport>,
    capturing: bool,
}

impl Manager {
    pub fn new(config: Config, factory: Arc<dyn TargetFactory>) -> Self {
        let (tx, rx) = mpsc::channel(BUFFER_SIZE);
        let (device_count, _) = watch::channel(0);
        let settings = Arc::new(config.settings());
        Self {
            config,
            settings,
            factory,
            tx,
            rx,
            device_count,
            usb: None,
            hotplug: None,
            capturing: false,
        }
    }

    /// Returns a client that can be used to send commands to the manager
    pub fn client(&self) -> ManagerClient {
        ManagerClient::new(self.tx.clone(), self.device_count.subscribe())
    }

    pub fn settings(&self) -> Arc<MappingSettings> {
        self.settings.clone()
    }

    /// Listen for [ManagerCommand]s until told to stop. Capture is stopped
    /// before returning so every virtual controller is released.
    pub async fn run(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::debug!("Starting manager command loop");
        while let Some(cmd) = self.rx.recv().await {
            log::debug!("Received command: {cmd:?}");
            match cmd {
                ManagerCommand::StartCapture { sender } => {
                    let result = self.start_capture().map_err(|e| e.to_string());
                    if let Err(e) = sender.send(result).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::StopCapture { sender } => {
                    self.stop_capture().await;
                    if let Err(e) = sender.send(()).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::Refresh { sender } => {
                    let result = self.refresh().await.map_err(|e| e.to_string());
                    if let Err(e) = sender.send(result).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::IsCapturing { sender } => {
                    if let Err(e) = sender.send(self.capturing).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::SetMappingMode { mode } => {
                    log::info!("Setting mapping mode to {mode}");
                    self.settings.set_mode(mode);
                }
                ManagerCommand::GetMappingMode { sender } => {
                    if let Err(e) = sender.send(self.settings.mode()).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::SetAccurateDrumMappings { enabled } => {
                    log::info!("Setting accurate drum mappings to {enabled}");
                    self.settings.set_accurate_drums(enabled);
                }
                ManagerCommand::GetAccurateDrumMappings { sender } => {
                    if let Err(e) = sender.send(self.settings.accurate_drums()).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::GetDeviceCount { sender } => {
                    let count = *self.device_count.borrow();
                    if let Err(e) = sender.send(count).await {
                        log::error!("Failed to send response: {e:?}");
                    }
                }
                ManagerCommand::Stop => break,
            }
        }

        self.stop_capture().await;
        log::info!("Manager stopped");
        Ok(())
    }

    fn context(&self, map_guide_button: bool, fallback_mapping: bool) -> MapperContext {
        MapperContext {
            factory: self.factory.clone(),
            settings: self.settings.clone(),
            map_guide_button,
            fallback_mapping,
        }
    }

    /// Start every enabled transport and let input through
    fn start_capture(&mut self) -> Result<(), ChannelError> {
        if self.capturing {
            return Ok(());
        }
        log::info!("Starting capture");

        let usb_config = &self.config.backends.usb;
        if usb_config.enabled && self.usb.is_none() {
            let ctx = self.context(usb_config.map_guide_button, false);
            self.usb = Some(UsbTransport::new(
                ctx,
                usb_config.read_timeout(),
                Handle::current(),
                self.device_count.clone(),
            ));
        }
        let hotplug_config = &self.config.backends.hotplug;
        if hotplug_config.enabled && self.hotplug.is_none() {
            let ctx = self.context(
                hotplug_config.map_guide_button,
                hotplug_config.fallback_mapping,
            );
            self.hotplug = Some(HotplugTransport::new(
                ctx,
                hotplug_config.read_timeout(),
                self.device_count.clone(),
            ));
        }

        // Set before any reader exists so new readers start enabled
        self.capturing = true;
        let mut result = Ok(());
        if let Some(usb) = self.usb.as_mut() {
            usb.enable_inputs(true);
            match usb.start() {
                Ok(added) => log::info!("Found {added} USB device(s)"),
                Err(e) => {
                    log::error!("Failed to enumerate USB devices: {e}");
                    result = Err(e);
                }
            }
        }
        if let Some(hotplug) = self.hotplug.as_mut() {
            hotplug.enable_inputs(true);
            if let Err(e) = hotplug.start() {
                log::error!("Failed to watch for USB devices: {e}");
                result = Err(e);
            }
        }
        result
    }

    /// Stop every transport. Read threads are joined and every virtual
    /// controller is released before this returns.
    async fn stop_capture(&mut self) {
        if !self.capturing {
            return;
        }
        log::info!("Stopping capture");
        self.capturing = false;
        if let Some(usb) = self.usb.as_mut() {
            usb.enable_inputs(false);
            usb.stop().await;
        }
        if let Some(hotplug) = self.hotplug.as_mut() {
            hotplug.enable_inputs(false);
            hotplug.stop().await;
        }
    }

    /// Restart capture from scratch. Returns the number of devices found.
    async fn refresh(&mut self) -> Result<usize, ChannelError> {
        if !self.capturing {
            return Ok(0);
        }
        self.stop_capture().await;
        self.start_capture()?;
        Ok(*self.device_count.borrow())
    }
}
