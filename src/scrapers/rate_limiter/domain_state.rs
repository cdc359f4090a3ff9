//! Per-host request timing state.

use std::time::Duration;

use tokio::time::Instant;

/// State for a single host.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Start time of the latest request; may be in the future while a
    /// reserved slot is pending.
    pub last_request: Option<Instant>,
    /// Total requests made.
    pub total_requests: u64,
}

impl DomainState {
    pub fn new() -> Self {
        Self {
            last_request: None,
            total_requests: 0,
        }
    }

    /// Time remaining before the next request may start.
    pub fn time_until_ready(&self, min_interval: Duration) -> Duration {
        match self.last_request {
            Some(last) => (last + min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}

impl Default for DomainState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_domain_is_ready() {
        let state = DomainState::new();
        assert_eq!(
            state.time_until_ready(Duration::from_millis(500)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_ready_counts_down() {
        let mut state = DomainState::new();
        state.last_request = Some(Instant::now());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(
            state.time_until_ready(Duration::from_millis(500)),
            Duration::from_millis(300)
        );

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(
            state.time_until_ready(Duration::from_millis(500)),
            Duration::ZERO
        );
    }
}
