//! Host actuators

use std::fs;
use std::io;
use std::path::PathBuf;

use log::*;
use lumen_mcu::Actuator;

/// Logs levels instead of driving hardware
#[derive(Debug, Default)]
pub struct LogActuator;

impl Actuator for LogActuator {
    type Error = io::Error;

    fn set_level(&mut self, level: f32) -> Result<(), io::Error> {
        info!("[DIMMER] Level {:.0}%", level * 100.0);
        Ok(())
    }
}

/// Linux sysfs PWM channel, e.g. `/sys/class/pwm/pwmchip0/pwm0`
#[derive(Debug)]
pub struct SysfsPwm {
    channel: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    /// Program the period and enable the (already exported) channel
    pub fn open(channel: impl Into<PathBuf>, period_ns: u64) -> io::Result<Self> {
        let channel = channel.into();
        if period_ns == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "PWM period must be non-zero"));
        }
        fs::write(channel.join("period"), period_ns.to_string())?;
        fs::write(channel.join("enable"), "1")?;
        info!("PWM {} enabled, period {period_ns} ns", channel.display());
        Ok(Self { channel, period_ns })
    }
}

impl Actuator for SysfsPwm {
    type Error = io::Error;

    fn set_level(&mut self, level: f32) -> Result<(), io::Error> {
        let duty = (f64::from(level.clamp(0.0, 1.0)) * self.period_ns as f64).round() as u64;
        fs::write(self.channel.join("duty_cycle"), duty.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_cycle_follows_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut pwm = SysfsPwm::open(dir.path(), 1_000_000).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("period")).unwrap(), "1000000");
        assert_eq!(fs::read_to_string(dir.path().join("enable")).unwrap(), "1");

        pwm.set_level(0.25).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("duty_cycle")).unwrap(), "250000");
        pwm.set_level(1.0).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("duty_cycle")).unwrap(), "1000000");
    }

    #[test]
    fn zero_period_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SysfsPwm::open(dir.path(), 0).is_err());
    }
}
