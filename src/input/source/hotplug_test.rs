use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use futures::stream;
use nusb::{hotplug::HotplugEvent, DeviceInfo};
use tokio::{
    sync::{mpsc, watch},
    task,
};

use crate::input::{
    mapping::MapperContext, settings::MappingSettings, target::memory::MemoryTargets,
};

use super::{
    hotplug::{release, spawn_removals, HotplugTransport},
    ChannelError, DeviceMap, ReadControl, Reader,
};

const WAIT: Duration = Duration::from_secs(5);

/// Reader standing in for a device read loop. It queues its own removal
/// when its device is unplugged before the transport stops it.
fn fake_reader(
    key: u32,
    removals: mpsc::UnboundedSender<u32>,
    unplugged: Arc<AtomicBool>,
) -> Reader {
    let control = Arc::new(ReadControl::new(false));
    let loop_control = control.clone();
    let handle = task::spawn_blocking(move || loop {
        if loop_control.stop_requested() {
            return;
        }
        if unplugged.load(Ordering::Acquire) {
            let _ = removals.send(key);
            return;
        }
        thread::sleep(Duration::from_millis(1));
    });
    Reader::task(control, handle)
}

fn transport() -> HotplugTransport {
    let targets = MemoryTargets::new(1, 0);
    let ctx = MapperContext {
        factory: Arc::new(targets),
        settings: Arc::new(MappingSettings::default()),
        map_guide_button: false,
        fallback_mapping: true,
    };
    let (count, _) = watch::channel(0);
    HotplugTransport::new(ctx, Duration::from_millis(10), count)
}

#[tokio::test]
async fn test_unplugged_reader_is_removed_through_queue() {
    let (count, mut count_rx) = watch::channel(0);
    let devices: Arc<DeviceMap<u32, Reader>> = Arc::new(DeviceMap::new(count));
    let (removals, removal_task) = spawn_removals(devices.clone());

    let unplugged = Arc::new(AtomicBool::new(false));
    let plugged = Arc::new(AtomicBool::new(false));
    assert!(devices.insert_with(1, || Some(fake_reader(1, removals.clone(), unplugged.clone()))));
    assert!(devices.insert_with(2, || Some(fake_reader(2, removals.clone(), plugged.clone()))));
    assert_eq!(*count_rx.borrow(), 2);

    // The disconnect event and the exiting reader both queue device 1
    unplugged.store(true, Ordering::Release);
    removals.send(1).expect("queue should be open");
    // Keys that were never added are ignored
    removals.send(9).expect("queue should be open");

    tokio::time::timeout(WAIT, count_rx.wait_for(|count| *count == 1))
        .await
        .expect("removal should finish")
        .expect("count should still be published");
    assert_eq!(devices.len(), 1);

    drop(removals);
    tokio::time::timeout(WAIT, release(&devices, Some(removal_task)))
        .await
        .expect("release should finish");
    assert!(devices.is_empty());
    assert_eq!(*count_rx.borrow(), 0);
}

#[tokio::test]
async fn test_queue_stays_open_until_readers_are_stopped() {
    let (count, count_rx) = watch::channel(0);
    let devices: Arc<DeviceMap<u32, Reader>> = Arc::new(DeviceMap::new(count));
    let (removals, removal_task) = spawn_removals(devices.clone());

    let plugged = Arc::new(AtomicBool::new(false));
    for key in 0..3 {
        let reader = || Some(fake_reader(key, removals.clone(), plugged.clone()));
        assert!(devices.insert_with(key, reader));
    }
    drop(removals);

    // Every reader still holds a sender
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!removal_task.is_finished());

    tokio::time::timeout(WAIT, release(&devices, Some(removal_task)))
        .await
        .expect("release should finish once readers are stopped");
    assert!(devices.is_empty());
    assert_eq!(*count_rx.borrow(), 0);
}

#[tokio::test]
async fn test_failed_listing_starts_nothing() {
    let mut transport = transport();

    let result = transport.start_with(
        stream::pending::<HotplugEvent>(),
        || -> Result<Vec<DeviceInfo>, ChannelError> {
            Err(io::Error::other("enumeration failed").into())
        },
    );
    assert!(matches!(result, Err(ChannelError::Io(_))));
    assert!(!transport.is_running());

    tokio::time::timeout(WAIT, transport.stop())
        .await
        .expect("stop should not wait on anything");
}

#[tokio::test]
async fn test_stop_ends_watch_and_removal_tasks() {
    let mut transport = transport();

    transport
        .start_with(stream::pending::<HotplugEvent>(), || {
            Ok(Vec::<DeviceInfo>::new())
        })
        .expect("start should succeed");
    assert!(transport.is_running());
    // Already running
    assert!(transport.start().is_ok());

    tokio::time::timeout(WAIT, transport.stop())
        .await
        .expect("stop should close the removal queue");
    assert!(!transport.is_running());
    assert_eq!(transport.device_count(), 0);
}
