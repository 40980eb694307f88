//! Device-removed detection
//!
//! Loss is only reported, never recovered. The monitor logs the first
//! transition to a lost device and stays quiet afterwards.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceHealth {
    Healthy,
    Lost { reason: String },
}

impl DeviceHealth {
    pub fn is_lost(&self) -> bool {
        matches!(self, DeviceHealth::Lost { .. })
    }
}

#[derive(Debug, Default)]
pub struct DeviceHealthMonitor {
    reported: bool,
    checks: u64,
}

impl DeviceHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this observation is the first sign of loss
    pub fn observe(&mut self, health: &DeviceHealth) -> bool {
        self.checks += 1;
        match health {
            DeviceHealth::Healthy => false,
            DeviceHealth::Lost { reason } if !self.reported => {
                self.reported = true;
                log::error!("[DeviceHealthMonitor] GPU device removed: {}", reason);
                log::error!("[DeviceHealthMonitor] Device-loss recovery is not supported; rendering output is undefined from here on");
                true
            }
            DeviceHealth::Lost { .. } => false,
        }
    }

    pub fn has_reported_loss(&self) -> bool {
        self.reported
    }

    pub fn checks(&self) -> u64 {
        self.checks
    }
}
