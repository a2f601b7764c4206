use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            multiplier: 2.0,
            max_attempts: 30,
        }
    }
}

/// Polls `check` with exponential backoff until it returns `Some`, or gives
/// up after `config.max_attempts` and returns `None`.
pub async fn wait_for<F, Fut, T>(context: &str, config: &BackoffConfig, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let mut delay = config.initial_delay;
    for attempt in 0..config.max_attempts {
        if let Some(value) = check().await {
            return Some(value);
        }
        debug!(context, attempt, ?delay, "condition not yet met, backing off");
        sleep(delay).await;
        delay = Duration::from_secs_f64((delay.as_secs_f64() * config.multiplier).min(config.max_delay.as_secs_f64()));
    }
    None
}
