//! Gaming Input Protocol (GIP) used by Xbox One accessories. Frames are a
//! small variable-length header followed by a payload, and large messages
//! may be split into chunks.
pub mod command;
pub mod descriptor;
pub mod guids;
pub mod header;
pub mod hid_report;
pub mod message;

#[cfg(test)]
mod hid_report_test;

/// Outcome of handling a frame or message. These are protocol outcomes and
/// not errors: only [XboxResult::Success] lets the caller continue without
/// further action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XboxResult {
    Success,
    /// More setup is needed before the message can be acted on
    Pending,
    Disconnected,
    InvalidMessage,
    UnsupportedDevice,
}

impl XboxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, XboxResult::Success)
    }
}
