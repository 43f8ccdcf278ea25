use tokio::{sync::watch, task::JoinHandle};
use zbus::{fdo, object_server::SignalEmitter, Connection};
use zbus_macros::interface;

use crate::{
    constants::BUS_PREFIX,
    input::{
        manager::{ClientError, ManagerClient},
        settings::MappingMode,
    },
};

/// The [ManagerInterface] provides a DBus interface that can be exposed for managing
/// a [crate::input::manager::Manager]. It works by forwarding every call to a
/// [ManagerClient].
pub struct ManagerInterface {
    client: ManagerClient,
    device_count: watch::Receiver<usize>,
}

impl ManagerInterface {
    pub fn new(client: ManagerClient) -> ManagerInterface {
        let device_count = client.device_count_changed();
        ManagerInterface {
            client,
            device_count,
        }
    }

    /// Returns the DBus path of the manager interface
    pub fn path() -> String {
        format!("{BUS_PREFIX}/Manager")
    }
}

fn to_fdo(err: ClientError) -> fdo::Error {
    fdo::Error::Failed(err.to_string())
}

#[interface(
    name = "org.instrumentmapper.Manager",
    proxy(
        default_service = "org.instrumentmapper",
        default_path = "/org/instrumentmapper/Manager"
    )
)]
impl ManagerInterface {
    #[zbus(property)]
    async fn version(&self) -> fdo::Result<String> {
        const VERSION: &str = env!("CARGO_PKG_VERSION");
        Ok(VERSION.to_string())
    }

    /// One of "vigem", "vjoy", "rpcs3" or "shadps4". Applies to devices
    /// mapped after it is changed.
    #[zbus(property)]
    async fn mapping_mode(&self) -> fdo::Result<String> {
        let mode = self.client.mapping_mode().await.map_err(to_fdo)?;
        Ok(mode.to_string())
    }

    #[zbus(property)]
    async fn set_mapping_mode(&mut self, mode: String) -> fdo::Result<()> {
        let mode: MappingMode = mode.parse().map_err(fdo::Error::InvalidArgs)?;
        self.client.set_mapping_mode(mode).await.map_err(to_fdo)
    }

    #[zbus(property)]
    async fn accurate_drum_mappings(&self) -> fdo::Result<bool> {
        self.client.accurate_drum_mappings().await.map_err(to_fdo)
    }

    #[zbus(property)]
    async fn set_accurate_drum_mappings(&mut self, enabled: bool) -> fdo::Result<()> {
        self.client
            .set_accurate_drum_mappings(enabled)
            .await
            .map_err(to_fdo)
    }

    /// Number of instruments currently read
    #[zbus(property)]
    async fn connected_devices(&self) -> fdo::Result<u32> {
        Ok(*self.device_count.borrow() as u32)
    }

    #[zbus(property)]
    async fn capturing(&self) -> fdo::Result<bool> {
        self.client.is_capturing().await.map_err(to_fdo)
    }

    async fn start_capture(&self) -> fdo::Result<()> {
        self.client.start_capture().await.map_err(to_fdo)
    }

    async fn stop_capture(&self) -> fdo::Result<()> {
        self.client.stop_capture().await.map_err(to_fdo)
    }

    /// Release every device and read them again. Devices that could not be
    /// mapped get another chance.
    async fn refresh(&self) -> fdo::Result<u32> {
        let count = self.client.refresh().await.map_err(to_fdo)?;
        Ok(count as u32)
    }

    #[zbus(signal)]
    async fn device_count_changed(emitter: &SignalEmitter<'_>, count: u32) -> zbus::Result<()>;
}

impl ManagerInterface {
    /// Emit [ManagerInterface::device_count_changed] and a property change
    /// every time the device count changes. The task ends once the manager
    /// is gone.
    pub fn watch_device_count(conn: &Connection, client: &ManagerClient) -> JoinHandle<()> {
        let conn = conn.clone();
        let mut device_count = client.device_count_changed();
        tokio::task::spawn(async move {
            let path = Self::path();
            while device_count.changed().await.is_ok() {
                let count = *device_count.borrow_and_update() as u32;
                log::debug!("Device count changed to {count}");

                // Get the object instance at the given path so we can send DBus signal
                // updates
                let iface_ref = match conn
                    .object_server()
                    .interface::<_, Self>(path.as_str())
                    .await
                {
                    Ok(iface) => iface,
                    Err(e) => {
                        log::error!("Failed to get DBus interface {path}: {e}");
                        continue;
                    }
                };

                let iface = iface_ref.get().await;
                let result = iface
                    .connected_devices_changed(iface_ref.signal_emitter())
                    .await;
                if let Err(e) = result {
                    log::error!("Failed to signal property changed: {e}");
                }
                let result =
                    Self::device_count_changed(iface_ref.signal_emitter(), count).await;
                if let Err(e) = result {
                    log::error!("Failed to signal device count changed: {e}");
                }
            }
            log::debug!("Device count watch ended");
        })
    }
}
