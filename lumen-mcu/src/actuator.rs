//! Brightness Actuator Trait

/// Output stage driven by the control engine
///
/// MCU-specific crates implement this with a PWM peripheral; `level` is the
/// duty cycle in `[0.0, 1.0]`.
pub trait Actuator {
    /// Error type for actuator operations
    type Error: core::fmt::Display;

    /// Drive the output at the given level
    fn set_level(&mut self, level: f32) -> Result<(), Self::Error>;
}
