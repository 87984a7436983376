//! Conversion of winch speed into the PLC output register value.
//!
//! The winch speed is bipolar (`-speed_range..=speed_range`, negative values
//! pay out, positive values haul in) while the analog output word is
//! unipolar (`0..=max_out`). The speed range is shifted onto the register so
//! that full reverse maps to 0, stop maps to the midpoint and full forward
//! maps to `max_out`.
//!
//! Fractional results are rounded half away from zero, then clamped. Non-finite
//! speeds never reach the PLC: NaN and -inf produce 0, +inf produces `max_out`.
//!
//! # Example
//!
//! ```
//! use winch_link::SpeedScale;
//!
//! let scale = SpeedScale::default();
//! assert_eq!(scale.to_output(0.0), 13734);
//! assert_eq!(scale.to_output(1.0), 20601);
//! assert_eq!(scale.to_output(-100.0), 0);
//! ```

/// Output register value written for full forward speed.
pub const DEFAULT_MAX_OUT: u16 = 27468;

/// Speed magnitude that maps to the ends of the output range.
pub const DEFAULT_SPEED_RANGE: f64 = 2.0;

/// Maps `speed` in `[-speed_range, speed_range]` onto `[0, max_out]`.
///
/// Out-of-range and non-finite speeds are clamped, so the result is always a
/// valid register value. A non-positive or non-finite `speed_range` yields the
/// midpoint regardless of speed.
pub fn map_speed(speed: f64, speed_range: f64, max_out: u16) -> u16 {
    let max = f64::from(max_out);
    if !(speed_range.is_finite() && speed_range > 0.0) {
        return (max / 2.0).round() as u16;
    }
    if speed.is_nan() {
        return 0;
    }

    let raw = ((speed / speed_range + 1.0) / 2.0 * max).round();
    if raw < 0.0 {
        0
    } else if raw > max {
        max_out
    } else {
        raw as u16
    }
}

/// Fixed scaling constants of one winch drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedScale {
    /// Speed magnitude mapped to the register ends.
    pub speed_range: f64,
    /// Register value for full forward speed.
    pub max_out: u16,
}

impl SpeedScale {
    /// Creates a scale with custom constants.
    pub const fn new(speed_range: f64, max_out: u16) -> Self {
        Self {
            speed_range,
            max_out,
        }
    }

    /// Converts a speed to the register value written to the PLC.
    #[inline]
    pub fn to_output(&self, speed: f64) -> u16 {
        map_speed(speed, self.speed_range, self.max_out)
    }

    /// Register value that holds the winch still.
    #[inline]
    pub fn stop_output(&self) -> u16 {
        self.to_output(0.0)
    }
}

impl Default for SpeedScale {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_RANGE, DEFAULT_MAX_OUT)
    }
}
