use serde::{Deserialize, Serialize};

/// Longest wait between two relaunch attempts (seconds).
pub const MAX_COOLDOWN_SECS: f64 = 30.0;
/// Cooldown growth per failed attempt.
pub const COOLDOWN_GROWTH: f64 = 1.5;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RelaunchConfig {
    pub max_attempts: u32,
    pub base_cooldown_secs: f64,
}

impl Default for RelaunchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_cooldown_secs: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RelaunchStatus {
    Ok,
    Pending { wait_secs: f64, attempt: u32 },
    Ready { attempt: u32 },
    Exhausted,
}

/// Relaunch bookkeeping for the visual-tracking session.
///
/// Time is the event timestamp carried by session inputs, so replays behave
/// the same as live sessions.
#[derive(Clone, Debug)]
pub struct RelaunchState {
    pub name: String,
    pub relaunch_needed: bool,
    pub next_retry_at: f64,
    pub attempts: u32,
    pub total_relaunches: u32,
    pub max_attempts: u32,
    pub base_cooldown: f64,
    pub current_cooldown: f64,
}

impl RelaunchState {
    pub fn new(name: &str, config: &RelaunchConfig) -> Self {
        let base_cooldown = config.base_cooldown_secs.max(0.0);
        RelaunchState {
            name: name.to_string(),
            relaunch_needed: false,
            next_retry_at: f64::NEG_INFINITY,
            attempts: 0,
            total_relaunches: 0,
            max_attempts: config.max_attempts,
            base_cooldown,
            current_cooldown: base_cooldown,
        }
    }

    pub fn signal_relaunch(&mut self) {
        if !self.relaunch_needed {
            log::info!("[RELAUNCH] {} relaunch requested", self.name);
        }
        self.relaunch_needed = true;
    }

    pub fn can_retry(&self, now: f64) -> bool {
        self.relaunch_needed && now >= self.next_retry_at
    }

    pub fn can_relaunch(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.relaunch_needed && !self.can_relaunch()
    }

    /// Issue one attempt and schedule the earliest next one.
    ///
    /// The cooldown grows by 1.5x per attempt until tracking recovers, capped
    /// at 30 s.
    pub fn begin_attempt(&mut self, now: f64) {
        self.attempts += 1;
        self.total_relaunches += 1;
        self.next_retry_at = now + self.current_cooldown;

        log::warn!(
            "[RELAUNCH] {} attempt {}/{}, next retry no earlier than {:.1}s",
            self.name,
            self.attempts,
            self.max_attempts,
            self.current_cooldown
        );

        self.current_cooldown = (self.current_cooldown * COOLDOWN_GROWTH).min(MAX_COOLDOWN_SECS);
    }

    /// Tracking is healthy again.
    pub fn record_success(&mut self) {
        if self.relaunch_needed {
            log::info!(
                "[RELAUNCH] {} recovered after {} attempt(s)",
                self.name,
                self.attempts
            );
        }
        self.relaunch_needed = false;
        self.attempts = 0;
        self.current_cooldown = self.base_cooldown;
        self.next_retry_at = f64::NEG_INFINITY;
    }

    pub fn status(&self, now: f64) -> RelaunchStatus {
        if !self.relaunch_needed {
            return RelaunchStatus::Ok;
        }
        if !self.can_relaunch() {
            return RelaunchStatus::Exhausted;
        }
        if !self.can_retry(now) {
            return RelaunchStatus::Pending {
                wait_secs: self.next_retry_at - now,
                attempt: self.attempts,
            };
        }
        RelaunchStatus::Ready {
            attempt: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state(max_attempts: u32) -> RelaunchState {
        RelaunchState::new(
            "tracking",
            &RelaunchConfig {
                max_attempts,
                base_cooldown_secs: 2.0,
            },
        )
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut s = state(50);
        s.signal_relaunch();
        assert!(s.can_retry(0.0));

        s.begin_attempt(0.0);
        assert_eq!(s.attempts, 1);
        assert!(!s.can_retry(1.9));
        assert!(s.can_retry(2.0));
        assert_relative_eq!(s.current_cooldown, 3.0);

        s.begin_attempt(2.0);
        assert_relative_eq!(s.next_retry_at, 5.0);
        assert_relative_eq!(s.current_cooldown, 4.5);

        for i in 0..20 {
            s.begin_attempt(10.0 * i as f64);
        }
        assert_relative_eq!(s.current_cooldown, MAX_COOLDOWN_SECS);
    }

    #[test]
    fn test_max_attempts() {
        let mut s = state(2);
        s.signal_relaunch();
        s.begin_attempt(0.0);
        assert!(s.can_relaunch());
        s.begin_attempt(5.0);
        assert!(!s.can_relaunch());
        assert!(s.is_exhausted());
        assert_eq!(s.status(100.0), RelaunchStatus::Exhausted);
    }

    #[test]
    fn test_success_resets() {
        let mut s = state(10);
        assert_eq!(s.status(0.0), RelaunchStatus::Ok);

        s.signal_relaunch();
        s.begin_attempt(0.0);
        s.begin_attempt(2.0);
        assert_eq!(s.status(3.0), RelaunchStatus::Pending { wait_secs: 2.0, attempt: 2 });

        s.record_success();
        assert_eq!(s.attempts, 0);
        assert_eq!(s.total_relaunches, 2);
        assert_relative_eq!(s.current_cooldown, 2.0);
        assert!(!s.can_retry(3.0));

        s.signal_relaunch();
        assert_eq!(s.status(3.0), RelaunchStatus::Ready { attempt: 0 });
    }
}
