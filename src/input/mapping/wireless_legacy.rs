//! Mad Catz wireless legacy adapters. One adapter forwards the input of up
//! to four legacy instruments, each prefixed by a header naming the user
//! slot and the kind of instrument in it.
use std::collections::HashMap;

use crate::{
    drivers::gip::{
        command::CommandId,
        hid_report::{LegacyDeviceType, Report, WirelessLegacyInputHeader},
        message::Message,
        XboxResult,
    },
    input::target::TargetError,
};

use super::{drums::DrumsMapper, guitar::GuitarMapper, DeviceMapper, MapperContext};

enum UserMapper {
    Guitar(GuitarMapper),
    Drums(DrumsMapper),
}

impl UserMapper {
    fn new(kind: LegacyDeviceType, ctx: &MapperContext) -> Result<Option<Self>, TargetError> {
        match kind {
            LegacyDeviceType::Guitar => Ok(Some(UserMapper::Guitar(GuitarMapper::new(ctx)?))),
            LegacyDeviceType::Drums => Ok(Some(UserMapper::Drums(DrumsMapper::new(ctx)?))),
            LegacyDeviceType::None | LegacyDeviceType::Unknown(_) => Ok(None),
        }
    }

    fn inner(&mut self) -> &mut dyn DeviceMapper {
        match self {
            UserMapper::Guitar(m) => m,
            UserMapper::Drums(m) => m,
        }
    }
}

struct User {
    kind: LegacyDeviceType,
    mapper: UserMapper,
}

pub struct WirelessLegacyMapper {
    ctx: MapperContext,
    users: HashMap<u8, User>,
    /// Device kind left without a mapper per user slot, because it has none
    /// or creating it failed. Not retried until the slot advertises another
    /// kind.
    unmapped: HashMap<u8, LegacyDeviceType>,
}

impl WirelessLegacyMapper {
    pub fn new(ctx: &MapperContext) -> Self {
        Self {
            ctx: ctx.clone(),
            users: HashMap::new(),
            unmapped: HashMap::new(),
        }
    }

    /// Number of user slots that currently have a mapper
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn user_kind(&self, user_index: u8) -> Option<LegacyDeviceType> {
        self.users.get(&user_index).map(|user| user.kind)
    }

    /// Make sure the user slot is mapped for the advertised kind of device,
    /// replacing the old mapper if the kind changed
    fn update_user(&mut self, user_index: u8, kind: LegacyDeviceType) -> Option<&mut User> {
        let mapped = self.users.get(&user_index).map(|user| user.kind) == Some(kind);
        let unmapped = self.unmapped.get(&user_index) == Some(&kind);
        if !mapped && !unmapped {
            if self.users.remove(&user_index).is_some() {
                log::debug!("Removed wireless legacy user {user_index}");
            }
            self.unmapped.remove(&user_index);
            match UserMapper::new(kind, &self.ctx) {
                Ok(Some(mapper)) => {
                    log::info!("Wireless legacy user {user_index} connected as {kind:?}");
                    self.users.insert(user_index, User { kind, mapper });
                }
                Ok(None) => {
                    if let LegacyDeviceType::Unknown(value) = kind {
                        log::debug!("Unknown wireless legacy device type {value}");
                    }
                    self.unmapped.insert(user_index, kind);
                }
                Err(e) => {
                    log::error!("Failed to create mapper for wireless legacy user {user_index}: {e}");
                    self.unmapped.insert(user_index, kind);
                }
            }
        }
        self.users.get_mut(&user_index)
    }
}

impl DeviceMapper for WirelessLegacyMapper {
    fn handle_message(&mut self, command: CommandId, data: &[u8]) -> XboxResult {
        if command != CommandId::Input {
            return XboxResult::Success;
        }
        let header = match WirelessLegacyInputHeader::read(data) {
            Ok(header) => header,
            Err(e) => {
                log::debug!("Invalid wireless legacy report: {e}");
                return XboxResult::InvalidMessage;
            }
        };

        let Some(user) = self.update_user(header.user_index, header.device_type()) else {
            return XboxResult::Success;
        };
        let report = &data[WirelessLegacyInputHeader::SIZE..];
        user.mapper.inner().handle_message(command, report)
    }

    fn map_guide_button(&mut self, pressed: bool) {
        for user in self.users.values_mut() {
            user.mapper.inner().map_guide_button(pressed);
        }
    }

    fn reset_report(&mut self) {
        for user in self.users.values_mut() {
            user.mapper.inner().reset_report();
        }
    }

    fn initial_messages(&self) -> Vec<Message> {
        vec![Message::request_devices()]
    }
}
