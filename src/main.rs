use std::env;
use std::error::Error;
use std::sync::Arc;

use zbus::fdo::ObjectManager;
use zbus::Connection;

use instrumentmapper::config::{Config, TargetBackend};
use instrumentmapper::constants::{BUS_NAME, BUS_PREFIX};
use instrumentmapper::dbus::interface::manager::ManagerInterface;
use instrumentmapper::input::manager::Manager;
use instrumentmapper::input::target::{memory::MemoryTargets, uinput::UinputTargets, TargetFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let log_level = match env::var("LOG_LEVEL") {
        Ok(value) => value,
        Err(_) => "info".to_string(),
    };
    env::set_var("RUST_LOG", log_level);
    env_logger::init();
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    log::info!("Starting InstrumentMapper v{}", VERSION);

    let config = Config::load()?;
    let targets = &config.targets;
    let factory: Arc<dyn TargetFactory> = match targets.backend {
        TargetBackend::Uinput => Arc::new(UinputTargets::new(
            targets.max_xbox360,
            targets.max_joysticks,
        )),
        TargetBackend::Memory => {
            log::warn!("Using in-memory virtual controllers, no input will reach games");
            Arc::new(MemoryTargets::new(targets.max_xbox360, targets.max_joysticks))
        }
    };

    let mut manager = Manager::new(config, factory);
    let client = manager.client();

    // Configure the DBus connection
    let connection = Connection::system().await?;

    // Create an ObjectManager to signal when objects are added/removed
    let object_manager = ObjectManager {};
    let object_manager_path = String::from(BUS_PREFIX);
    connection
        .object_server()
        .at(object_manager_path, object_manager)
        .await?;

    let iface = ManagerInterface::new(client.clone());
    connection
        .object_server()
        .at(ManagerInterface::path(), iface)
        .await?;
    ManagerInterface::watch_device_count(&connection, &client);
    connection.request_name(BUS_NAME).await?;

    // Setup CTRL+C handler. Stopping the manager releases every virtual
    // controller before the process exits.
    let signal_client = client.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Unable to listen for shutdown signal: {e}");
            return;
        }
        log::info!("Shutting down");
        if let Err(e) = signal_client.stop().await {
            log::error!("Unable to stop the manager: {e}");
        }
    });

    let capture_client = client.clone();
    tokio::spawn(async move {
        if let Err(e) = capture_client.start_capture().await {
            log::error!("Unable to start capture: {e}");
        }
    });

    if let Err(e) = manager.run().await {
        log::error!("Error running the manager: {e}");
        return Err(e);
    }
    log::info!("The manager has exited");

    Ok(())
}
