//! Conversions from raw report values to virtual controller ranges

/// Width of one pickup switch position when the byte range is split in five
const PICKUP_RANGE: u8 = u8::MAX / 5;

/// Scale a byte to fill the full u16 range
pub fn scale_to_u16(value: u8) -> u16 {
    value as u16 * 0x0101
}

/// Scale a byte to the full i16 range, 0 mapping to the minimum
pub fn scale_to_i16(value: u8) -> i16 {
    (scale_to_u16(value) ^ 0x8000) as i16
}

/// Scale a byte to the positive half of the i16 range
pub fn scale_to_i16_positive(value: u8) -> i16 {
    (scale_to_u16(value) >> 1) as i16
}

/// Requantize a pickup switch position (0 to 4) to the midpoint of one of
/// five equal byte ranges
pub fn pickup_switch(position: u8) -> u8 {
    PICKUP_RANGE * position.min(4) + PICKUP_RANGE / 2
}

/// Clamp a wide value to the i16 range
pub fn clamp_i16(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Inverted drum velocity on the positive half of an axis. Velocities are
/// 4-bit values, so they are first stretched to fill a byte.
pub fn drum_velocity(velocity: u8) -> i16 {
    // Inverted as a u16, so the shift always leaves the sign bit clear and
    // the value stays on the positive half
    let scaled = !scale_to_u16(velocity.wrapping_mul(0x11));
    (scaled >> 1) as i16
}

/// Inverted drum velocity on the negative half of an axis
pub fn drum_velocity_negative(velocity: u8) -> i16 {
    let scaled = !scale_to_u16(velocity.wrapping_mul(0x11));
    ((scaled >> 1) | 0x8000) as i16
}

/// Joystick axis from a byte, 0 to 0x8000
pub fn joystick_axis(value: u8) -> i32 {
    (value as i32 * 0x0101) >> 1
}

/// Joystick axis from a signed value, 0 to 0x8000
pub fn joystick_axis_signed(value: i16) -> i32 {
    ((value as u16 ^ 0x8000) as i32) >> 1
}

pub fn joystick_axis_inverted(value: i16) -> i32 {
    0x8000 - joystick_axis_signed(value)
}
