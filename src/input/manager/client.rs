use std::time::Duration;

use thiserror::Error;
use tokio::{
    sync::{
        mpsc::{self, error::SendTimeoutError, Receiver, Sender},
        watch,
    },
    time::timeout,
};

use crate::input::settings::MappingMode;

use super::ManagerCommand;

/// Maximum duration to wait for a response from a command. If this timeout
/// is reached, that typically indicates a deadlock somewhere in the code.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Stopping capture joins every read thread, which may each wait out a read
/// timeout
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Possible errors for a manager client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("timed out waiting for the manager")]
    Timeout,
    #[error("service encountered an error processing the request: {0}")]
    ServiceError(String),
    #[error("manager no longer exists")]
    ChannelClosed,
}

/// A client for the [super::Manager]
#[derive(Debug, Clone)]
pub struct ManagerClient {
    tx: Sender<ManagerCommand>,
    device_count: watch::Receiver<usize>,
}

impl ManagerClient {
    pub fn new(tx: Sender<ManagerCommand>, device_count: watch::Receiver<usize>) -> Self {
        Self { tx, device_count }
    }

    /// Send the given command to the manager. This method uses a timeout
    /// to detect potential deadlocks.
    async fn send(&self, cmd: ManagerCommand) -> Result<(), ClientError> {
        let result = self.tx.send_timeout(cmd, DEFAULT_TIMEOUT).await;
        let Err(err) = result else {
            return Ok(());
        };
        match err {
            SendTimeoutError::Timeout(cmd) => {
                log::error!("POSSIBLE DEADLOCK: timed out after {DEFAULT_TIMEOUT:?} sending command to manager: {cmd:?}");
                Err(ClientError::Timeout)
            }
            SendTimeoutError::Closed(_) => Err(ClientError::ChannelClosed),
        }
    }

    /// Wait for the response to a command
    async fn recv<T>(mut rx: Receiver<T>, duration: Duration) -> Result<T, ClientError> {
        match timeout(duration, rx.recv()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(ClientError::ChannelClosed),
            Err(_) => {
                log::error!("POSSIBLE DEADLOCK: timed out after {duration:?} waiting for response from manager");
                Err(ClientError::Timeout)
            }
        }
    }

    /// Start reading every instrument and mapping its input
    pub async fn start_capture(&self) -> Result<(), ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::StartCapture { sender }).await?;
        Self::recv(rx, DEFAULT_TIMEOUT)
            .await?
            .map_err(ClientError::ServiceError)
    }

    /// Stop reading and release every virtual controller
    pub async fn stop_capture(&self) -> Result<(), ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::StopCapture { sender }).await?;
        Self::recv(rx, STOP_TIMEOUT).await
    }

    /// Restart capture so every device gets mapped again. Returns the
    /// number of devices found.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::Refresh { sender }).await?;
        Self::recv(rx, STOP_TIMEOUT)
            .await?
            .map_err(ClientError::ServiceError)
    }

    pub async fn is_capturing(&self) -> Result<bool, ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::IsCapturing { sender }).await?;
        Self::recv(rx, DEFAULT_TIMEOUT).await
    }

    /// Set the mapping mode used by devices mapped from now on
    pub async fn set_mapping_mode(&self, mode: MappingMode) -> Result<(), ClientError> {
        self.send(ManagerCommand::SetMappingMode { mode }).await
    }

    pub async fn mapping_mode(&self) -> Result<MappingMode, ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::GetMappingMode { sender }).await?;
        Self::recv(rx, DEFAULT_TIMEOUT).await
    }

    pub async fn set_accurate_drum_mappings(&self, enabled: bool) -> Result<(), ClientError> {
        self.send(ManagerCommand::SetAccurateDrumMappings { enabled })
            .await
    }

    pub async fn accurate_drum_mappings(&self) -> Result<bool, ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::GetAccurateDrumMappings { sender })
            .await?;
        Self::recv(rx, DEFAULT_TIMEOUT).await
    }

    pub async fn device_count(&self) -> Result<usize, ClientError> {
        let (sender, rx) = mpsc::channel(1);
        self.send(ManagerCommand::GetDeviceCount { sender }).await?;
        Self::recv(rx, DEFAULT_TIMEOUT).await
    }

    /// Returns a receiver notified every time the device count changes
    pub fn device_count_changed(&self) -> watch::Receiver<usize> {
        self.device_count.clone()
    }

    /// Stop capture and shut the manager down
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.send(ManagerCommand::Stop).await
    }
}
