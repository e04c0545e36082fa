use std::time::Duration;

/// Values the booking engine consumes, read once at startup. The fine
/// fallback covers bookings persisted without a frozen daily rate.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub default_daily_fine: f64,
    pub sweep_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let default_daily_fine = std::env::var("DEFAULT_DAILY_FINE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10.0);

        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        AppConfig {
            default_daily_fine,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        }
    }
}
