//! Picks a mapper for a client from the interfaces its descriptor lists
use thiserror::Error;
use uuid::Uuid;

use crate::{
    drivers::gip::guids::{self, DeviceKind, RIFFMASTER_PRODUCT_ID, RIFFMASTER_VENDOR_ID},
    input::target::TargetError,
};

use super::{
    drums::DrumsMapper, fallback::FallbackMapper, ghl::GhlMapper, guitar::GuitarMapper,
    riffmaster::RiffmasterMapper, wireless_legacy::WirelessLegacyMapper, Mapper, MapperContext,
    MapperKind,
};

/// Possible errors resolving a mapper
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("more than one recognized interface found")]
    Ambiguous(Vec<Uuid>),
    #[error("no supported interface found")]
    Unsupported(Vec<Uuid>),
    #[error("failed to create mapper: {0}")]
    CreateFailed(#[from] TargetError),
}

/// Vendor and product id reported in the arrival message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    fn is_riffmaster(&self) -> bool {
        self.vendor_id == RIFFMASTER_VENDOR_ID && self.product_id == RIFFMASTER_PRODUCT_ID
    }
}

/// A newly created mapper
pub struct Resolution {
    pub mapper: Mapper,
    /// No further virtual controllers can be created for the current mode
    pub capacity_exhausted: bool,
}

/// Whether mappers for this kind of device are built into this binary
fn kind_supported(kind: DeviceKind) -> bool {
    match kind {
        DeviceKind::Gamepad => cfg!(debug_assertions),
        _ => true,
    }
}

/// Find the one recognized interface in the given list. Interfaces in the
/// benign overlap set give way to any other recognized interface.
pub fn find_interface(interfaces: &[Uuid]) -> Result<(Uuid, DeviceKind), ResolveError> {
    let mut found: Option<(Uuid, DeviceKind)> = None;
    for guid in interfaces {
        let Some(kind) = guids::device_kind(guid) else {
            continue;
        };
        found = match found {
            None => Some((*guid, kind)),
            Some((current, _)) if current == *guid => found,
            Some(_) if guids::BENIGN_OVERLAP.contains(guid) => found,
            Some((current, _)) if guids::BENIGN_OVERLAP.contains(&current) => Some((*guid, kind)),
            Some(_) => return Err(ResolveError::Ambiguous(interfaces.to_vec())),
        };
    }

    match found {
        Some((guid, kind)) if kind_supported(kind) => Ok((guid, kind)),
        Some((guid, kind)) => {
            log::warn!("Mapping for {kind:?} interface {guid} is not available in this build");
            Err(ResolveError::Unsupported(interfaces.to_vec()))
        }
        None => Err(ResolveError::Unsupported(interfaces.to_vec())),
    }
}

fn create(
    kind: DeviceKind,
    identity: Option<DeviceIdentity>,
    ctx: &MapperContext,
) -> Result<MapperKind, TargetError> {
    let mapper = match kind {
        DeviceKind::Guitar if identity.is_some_and(|id| id.is_riffmaster()) => {
            MapperKind::Riffmaster(RiffmasterMapper::new(ctx)?)
        }
        DeviceKind::Guitar => MapperKind::Guitar(GuitarMapper::new(ctx)?),
        DeviceKind::Drums => MapperKind::Drums(DrumsMapper::new(ctx)?),
        DeviceKind::GhlGuitar => MapperKind::Ghl(GhlMapper::new(ctx)?),
        DeviceKind::WirelessLegacy => MapperKind::WirelessLegacy(WirelessLegacyMapper::new(ctx)),
        #[cfg(debug_assertions)]
        DeviceKind::Gamepad => MapperKind::Gamepad(super::gamepad::GamepadMapper::new(ctx)?),
        #[cfg(not(debug_assertions))]
        DeviceKind::Gamepad => MapperKind::Fallback(FallbackMapper::new(ctx)?),
    };
    Ok(mapper)
}

fn log_interfaces(interfaces: &[Uuid]) {
    log::info!("Consider reporting the interfaces below if this device should be supported:");
    for guid in interfaces {
        log::info!("- {guid}");
    }
}

enum Choice {
    Known(DeviceKind),
    Fallback,
}

/// Create the mapper for a client with the given interfaces
pub fn resolve(
    interfaces: &[Uuid],
    identity: Option<DeviceIdentity>,
    ctx: &MapperContext,
) -> Result<Resolution, ResolveError> {
    let kind = match find_interface(interfaces) {
        Ok((guid, kind)) => {
            log::debug!("Resolved interface {guid} as {kind:?}");
            Choice::Known(kind)
        }
        Err(ResolveError::Unsupported(_)) if ctx.fallback_mapping => {
            log::info!("No supported interface found, mapping device by report length");
            Choice::Fallback
        }
        Err(e) => {
            match &e {
                ResolveError::Ambiguous(_) => log::info!(
                    "More than one recognized interface found, device will not be mapped"
                ),
                _ => log::info!("No supported interface found, device will not be mapped"),
            }
            log_interfaces(interfaces);
            return Err(e);
        }
    };

    let mapper = match kind {
        Choice::Known(kind) => create(kind, identity, ctx)?,
        Choice::Fallback => MapperKind::Fallback(FallbackMapper::new(ctx)?),
    };
    log::debug!("Created new {} mapper", mapper.name());

    Ok(Resolution {
        mapper: Mapper::new(mapper, ctx.map_guide_button),
        capacity_exhausted: !ctx.target_available(),
    })
}
