//! Interface GUIDs advertised in device descriptors. These decide which
//! report format a device speaks.
use uuid::{uuid, Uuid};

pub const XBOX_GAMEPAD: Uuid = uuid!("082e402c-07df-45e1-a5ab-a3127af197b5");

pub const MADCATZ_GUITAR: Uuid = uuid!("0d2ae438-7f7d-4933-9693-30fc55018e77");
pub const PDP_GUITAR: Uuid = uuid!("1a266af6-3a46-45e3-b9b6-0f2c0b2c1ebe");

pub const MADCATZ_DRUMKIT: Uuid = uuid!("06182893-cce0-4b85-9271-0a10dbab7e07");
pub const PDP_DRUMKIT: Uuid = uuid!("a503f9b6-bc9a-4a14-97e7-2d3bcb255aa6");

pub const GHL_GUITAR: Uuid = uuid!("ecddd2fe-d387-4294-bd96-1a712e3dc77d");

pub const MADCATZ_LEGACY_WIRELESS: Uuid = uuid!("af259d5b-8ae0-4f5d-a9a1-4a6f4f9a43f7");

/// Kind of device implied by an interface GUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Guitar,
    Drums,
    GhlGuitar,
    WirelessLegacy,
    Gamepad,
}

/// Every recognized interface and the device kind it implies
pub const KNOWN_INTERFACES: &[(Uuid, DeviceKind)] = &[
    (MADCATZ_GUITAR, DeviceKind::Guitar),
    (PDP_GUITAR, DeviceKind::Guitar),
    (MADCATZ_DRUMKIT, DeviceKind::Drums),
    (PDP_DRUMKIT, DeviceKind::Drums),
    (GHL_GUITAR, DeviceKind::GhlGuitar),
    (MADCATZ_LEGACY_WIRELESS, DeviceKind::WirelessLegacy),
    (XBOX_GAMEPAD, DeviceKind::Gamepad),
];

/// Look up the device kind for the given interface GUID
pub fn device_kind(guid: &Uuid) -> Option<DeviceKind> {
    KNOWN_INTERFACES
        .iter()
        .find(|(known, _)| known == guid)
        .map(|(_, kind)| *kind)
}

/// Interfaces that may be advertised alongside another recognized interface
/// without making the device ambiguous. The GHL guitar also reports itself as
/// a gamepad.
pub const BENIGN_OVERLAP: &[Uuid] = &[XBOX_GAMEPAD];

/// Riffmaster guitars share the PDP guitar interface and are told apart by
/// vendor/product id.
pub const RIFFMASTER_VENDOR_ID: u16 = 0x0E6F;
pub const RIFFMASTER_PRODUCT_ID: u16 = 0x0248;
