//! Cooldown filter for re-broadcast beacon presses

use std::time::Duration;

/// Admits at most one event per cooldown window.
///
/// Timestamps are a free-running 32-bit millisecond tick counter; differences
/// are taken with wrapping arithmetic so the counter may overflow.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown_ms: u32,
    last_admitted: Option<u32>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: u32::try_from(cooldown.as_millis()).unwrap_or(u32::MAX),
            last_admitted: None,
        }
    }

    pub fn admit(&mut self, now_ms: u32) -> bool {
        if let Some(last) = self.last_admitted {
            if now_ms.wrapping_sub(last) < self.cooldown_ms {
                return false;
            }
        }
        self.last_admitted = Some(now_ms);
        true
    }
}
