//! Fixed-layout payloads carried by GIP messages. All multi-byte fields are
//! little-endian.
use bitflags::bitflags;
use packed_struct::prelude::*;
use thiserror::Error;

/// Size of an instrument report that identifies a guitar
pub const GUITAR_REPORT_SIZE: usize = 40;
/// Size of an instrument report that identifies a drum kit
pub const DRUM_REPORT_SIZE: usize = 36;
pub const GAMEPAD_REPORT_SIZE: usize = 14;
pub const RIFFMASTER_REPORT_SIZE: usize = 48;
pub const GHL_REPORT_SIZE: usize = 8;
pub const KEYSTROKE_SIZE: usize = 2;
pub const STATUS_SIZE: usize = 4;
pub const ARRIVAL_SIZE: usize = 28;
pub const WIRELESS_LEGACY_HEADER_SIZE: usize = 4;

/// Key code the controller reports for its guide button
pub const GUIDE_KEY_CODE: u8 = 0x5B;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report requires {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("failed to unpack report: {0}")]
    Unpack(#[from] PackingError),
}

/// A report with a fixed wire size
pub trait Report: PackedStruct + Sized {
    const SIZE: usize;

    /// Unpack the report from the start of the given payload. Longer
    /// payloads are accepted.
    fn read(data: &[u8]) -> Result<Self, ReportError> {
        if data.len() < Self::SIZE {
            return Err(ReportError::InvalidLength {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        Ok(Self::unpack_from_slice(&data[..Self::SIZE])?)
    }

    /// Unpack the report only if the payload is exactly its size
    fn read_exact(data: &[u8]) -> Result<Self, ReportError> {
        if data.len() != Self::SIZE {
            return Err(ReportError::InvalidLength {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        Ok(Self::unpack_from_slice(data)?)
    }
}

bitflags! {
    /// Button word shared by gamepads and instruments
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GamepadButtons: u16 {
        const SYNC = 0x0001;
        const MENU = 0x0004;
        const OPTIONS = 0x0008;
        const A = 0x0010;
        const B = 0x0020;
        const X = 0x0040;
        const Y = 0x0080;
        const DPAD_UP = 0x0100;
        const DPAD_DOWN = 0x0200;
        const DPAD_LEFT = 0x0400;
        const DPAD_RIGHT = 0x0800;
        const LEFT_BUMPER = 0x1000;
        const RIGHT_BUMPER = 0x2000;
        const LEFT_STICK_PRESS = 0x4000;
        const RIGHT_STICK_PRESS = 0x8000;
    }
}

impl GamepadButtons {
    /// First kick pedal on drum kits
    pub const KICK_ONE: GamepadButtons = GamepadButtons::LEFT_BUMPER;
    /// Second kick pedal on drum kits
    pub const KICK_TWO: GamepadButtons = GamepadButtons::RIGHT_BUMPER;
}

bitflags! {
    /// Fret bits used by both fret bytes of a guitar report
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Frets: u8 {
        const GREEN = 0x01;
        const RED = 0x02;
        const YELLOW = 0x04;
        const BLUE = 0x08;
        const ORANGE = 0x10;
    }
}

bitflags! {
    /// Fret bits of a Guitar Hero Live guitar
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GhlFrets: u8 {
        const BLACK_1 = 0x01;
        const BLACK_2 = 0x02;
        const BLACK_3 = 0x04;
        const WHITE_1 = 0x08;
        const WHITE_2 = 0x10;
        const WHITE_3 = 0x20;
    }
}

/// Rock Band 4 guitar input (command 0x20)
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "40")]
pub struct GuitarInputReport {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub buttons: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "2")]
    pub tilt: u8,
    #[packed_field(bytes = "3")]
    pub whammy: u8,
    /// Reported as 0x00, 0x10, 0x20, 0x30 or 0x40
    #[packed_field(bytes = "4")]
    pub pickup_switch: u8,
    #[packed_field(bytes = "5")]
    pub upper_frets: u8,
    #[packed_field(bytes = "6")]
    pub lower_frets: u8,
    #[packed_field(bytes = "7..=9")]
    pub unknown: [u8; 3],
    #[packed_field(bytes = "10..=15")]
    pub legacy_id: [u8; 6],
    #[packed_field(bytes = "16..=39")]
    pub reserved: [u8; 24],
}

impl Report for GuitarInputReport {
    const SIZE: usize = GUITAR_REPORT_SIZE;
}

impl GuitarInputReport {
    pub fn buttons(&self) -> GamepadButtons {
        GamepadButtons::from_bits_retain(self.buttons.to_primitive())
    }

    /// Frets held on either fret set
    pub fn frets(&self) -> Frets {
        Frets::from_bits_retain(self.upper_frets | self.lower_frets)
    }

    pub fn lower_frets_pressed(&self) -> bool {
        self.lower_frets != 0
    }

    /// Pickup switch position from 0 to 4
    pub fn pickup_position(&self) -> u8 {
        self.pickup_switch >> 4
    }
}

/// Rock Band 4 drum kit input (command 0x20). Pad and cymbal velocities are
/// 4-bit values.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "36")]
pub struct DrumInputReport {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub buttons: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bits = "16..=19")]
    pub red_pad: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "20..=23")]
    pub yellow_pad: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "24..=27")]
    pub blue_pad: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "28..=31")]
    pub green_pad: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "32..=35")]
    pub yellow_cymbal: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "36..=39")]
    pub blue_cymbal: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "40..=43")]
    pub green_cymbal: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "44..=47")]
    pub unused: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bytes = "6..=9")]
    pub unknown: [u8; 4],
    #[packed_field(bytes = "10..=15")]
    pub legacy_id: [u8; 6],
    #[packed_field(bytes = "16..=35")]
    pub reserved: [u8; 20],
}

impl Report for DrumInputReport {
    const SIZE: usize = DRUM_REPORT_SIZE;
}

impl DrumInputReport {
    pub fn buttons(&self) -> GamepadButtons {
        GamepadButtons::from_bits_retain(self.buttons.to_primitive())
    }
}

/// Standard Xbox One gamepad input (command 0x20)
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "14")]
pub struct GamepadInputReport {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub buttons: Integer<u16, packed_bits::Bits<16>>,
    /// Ranges from 0 to 1023
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub left_trigger: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "4..=5", endian = "lsb")]
    pub right_trigger: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub left_stick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub left_stick_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "10..=11", endian = "lsb")]
    pub right_stick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "12..=13", endian = "lsb")]
    pub right_stick_y: Integer<i16, packed_bits::Bits<16>>,
}

impl Report for GamepadInputReport {
    const SIZE: usize = GAMEPAD_REPORT_SIZE;
}

impl GamepadInputReport {
    pub fn buttons(&self) -> GamepadButtons {
        GamepadButtons::from_bits_retain(self.buttons.to_primitive())
    }
}

/// PDP Riffmaster guitar input: a regular guitar report followed by an
/// analog joystick.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "48")]
pub struct RiffmasterInputReport {
    #[packed_field(bytes = "0..=39")]
    pub base: GuitarInputReport,
    #[packed_field(bytes = "40..=41", endian = "lsb")]
    pub joystick_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "42..=43", endian = "lsb")]
    pub joystick_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bits = "359")]
    pub joystick_click: bool,
    #[packed_field(bits = "352..=358")]
    pub unused: Integer<u8, packed_bits::Bits<7>>,
    #[packed_field(bytes = "45..=47")]
    pub reserved: [u8; 3],
}

impl Report for RiffmasterInputReport {
    const SIZE: usize = RIFFMASTER_REPORT_SIZE;
}

/// Guitar Hero Live guitar input (command 0x21)
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8")]
pub struct GhlInputReport {
    #[packed_field(bytes = "0")]
    pub frets: u8,
    #[packed_field(bytes = "1")]
    pub unknown1: u8,
    /// 0x00 is strum up, 0xFF strum down, 0x80 centered
    #[packed_field(bytes = "2")]
    pub strum_bar: u8,
    #[packed_field(bytes = "3")]
    pub unknown2: u8,
    #[packed_field(bytes = "4")]
    pub whammy: u8,
    #[packed_field(bytes = "5")]
    pub tilt: u8,
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub buttons: Integer<u16, packed_bits::Bits<16>>,
}

impl Report for GhlInputReport {
    const SIZE: usize = GHL_REPORT_SIZE;
}

impl GhlInputReport {
    pub fn buttons(&self) -> GamepadButtons {
        GamepadButtons::from_bits_retain(self.buttons.to_primitive())
    }

    pub fn frets(&self) -> GhlFrets {
        GhlFrets::from_bits_retain(self.frets)
    }

    pub fn strum_up(&self) -> bool {
        self.strum_bar == 0x00
    }

    pub fn strum_down(&self) -> bool {
        self.strum_bar == 0xFF
    }
}

/// One key event of a keystroke message (command 0x07)
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "2")]
pub struct Keystroke {
    #[packed_field(bits = "7")]
    pub pressed: bool,
    #[packed_field(bits = "0..=6")]
    pub unused: Integer<u8, packed_bits::Bits<7>>,
    #[packed_field(bytes = "1")]
    pub key_code: u8,
}

impl Report for Keystroke {
    const SIZE: usize = KEYSTROKE_SIZE;
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug, Default)]
pub enum BatteryType {
    #[default]
    Wired = 0,
    Standard = 1,
    ChargeKit = 2,
    Unknown = 3,
}

/// Wired devices always report [BatteryLevel::Low]
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Debug, Default)]
pub enum BatteryLevel {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Full = 3,
}

/// Device status (command 0x03)
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct DeviceStatus {
    #[packed_field(bits = "0..=1")]
    pub connection: Integer<u8, packed_bits::Bits<2>>,
    #[packed_field(bits = "2..=3")]
    pub unused: Integer<u8, packed_bits::Bits<2>>,
    #[packed_field(bits = "4..=5", ty = "enum")]
    pub battery_type: BatteryType,
    #[packed_field(bits = "6..=7", ty = "enum")]
    pub battery_level: BatteryLevel,
    #[packed_field(bytes = "1..=3")]
    pub unknown: [u8; 3],
}

impl Report for DeviceStatus {
    const SIZE: usize = STATUS_SIZE;
}

impl DeviceStatus {
    pub fn connected(&self) -> bool {
        self.connection.to_primitive() != 0
    }
}

/// Four-part version number
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "8")]
pub struct Version {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub major: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub minor: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "4..=5", endian = "lsb")]
    pub build: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub revision: Integer<u16, packed_bits::Bits<16>>,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major.to_primitive(),
            self.minor.to_primitive(),
            self.build.to_primitive(),
            self.revision.to_primitive()
        )
    }
}

/// Device arrival (command 0x02)
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "28")]
pub struct Arrival {
    #[packed_field(bytes = "0..=5")]
    pub serial_number: [u8; 6],
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub unknown: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub vendor_id: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "10..=11", endian = "lsb")]
    pub product_id: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "12..=19")]
    pub firmware_version: Version,
    #[packed_field(bytes = "20..=27")]
    pub hardware_version: Version,
}

impl Report for Arrival {
    const SIZE: usize = ARRIVAL_SIZE;
}

impl Arrival {
    /// Serial number formatted as hex, most significant byte first
    pub fn serial_string(&self) -> String {
        self.serial_number
            .iter()
            .rev()
            .map(|b| format!("{b:02X}"))
            .collect()
    }
}

/// Kind of device seated in a wireless legacy adapter slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyDeviceType {
    None,
    Guitar,
    Drums,
    Unknown(u8),
}

impl From<u8> for LegacyDeviceType {
    fn from(value: u8) -> Self {
        match value {
            0 => LegacyDeviceType::None,
            1 => LegacyDeviceType::Guitar,
            2 => LegacyDeviceType::Drums,
            value => LegacyDeviceType::Unknown(value),
        }
    }
}

/// Header prefixed to input reports forwarded by a wireless legacy adapter
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct WirelessLegacyInputHeader {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub buttons: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "2")]
    pub user_index: u8,
    #[packed_field(bytes = "3")]
    pub device_type: u8,
}

impl Report for WirelessLegacyInputHeader {
    const SIZE: usize = WIRELESS_LEGACY_HEADER_SIZE;
}

impl WirelessLegacyInputHeader {
    pub fn device_type(&self) -> LegacyDeviceType {
        LegacyDeviceType::from(self.device_type)
    }
}

/// Byte offsets of the legacy auto-detect id inside 40-byte guitar and
/// 36-byte drum reports. Only verified against one historical firmware
/// revision.
pub const LEGACY_ID_OFFSETS: [usize; 6] = [10, 11, 12, 13, 14, 15];

/// Read the legacy auto-detect id from an instrument report
pub fn legacy_id(data: &[u8]) -> Option<[u8; 6]> {
    if data.len() != GUITAR_REPORT_SIZE && data.len() != DRUM_REPORT_SIZE {
        return None;
    }
    let mut id = [0u8; 6];
    for (dst, offset) in id.iter_mut().zip(LEGACY_ID_OFFSETS) {
        *dst = data[offset];
    }
    Some(id)
}
