use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownParts {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl CountdownParts {
    pub fn from_secs(total: u64) -> Self {
        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
            seconds: total % 60,
        }
    }
}

/// Time lock in front of the mint action. `Unlocked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownGate {
    Waiting { go_live: i64 },
    Unlocked,
}

impl CountdownGate {
    pub fn new(go_live: Option<i64>, now: i64) -> Self {
        match go_live {
            Some(go_live) if go_live > now => Self::Waiting { go_live },
            _ => Self::Unlocked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked)
    }

    /// Returns true only on the call that performs the unlock.
    pub fn poll(&mut self, now: i64) -> bool {
        match *self {
            Self::Waiting { go_live } if now >= go_live => {
                *self = Self::Unlocked;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self, now: i64) -> Option<CountdownParts> {
        match *self {
            Self::Waiting { go_live } => Some(CountdownParts::from_secs((go_live - now).max(0) as u64)),
            Self::Unlocked => None,
        }
    }

    /// Sleeps until `clock` reaches go-live, then unlocks.
    pub async fn wait<C: Fn() -> i64>(&mut self, clock: C) {
        loop {
            let now = clock();
            if self.poll(now) {
                info!(now, "countdown reached go-live");
                return;
            }
            let Self::Waiting { go_live } = *self else { return };
            let secs = (go_live - now).max(1) as u64;
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_initial_state() {
        assert_eq!(CountdownGate::new(None, 100), CountdownGate::Unlocked);
        assert_eq!(CountdownGate::new(Some(100), 100), CountdownGate::Unlocked);
        assert_eq!(CountdownGate::new(Some(50), 100), CountdownGate::Unlocked);
        assert_eq!(CountdownGate::new(Some(101), 100), CountdownGate::Waiting { go_live: 101 });
    }

    #[test]
    fn test_unlock_is_terminal_and_fires_once() {
        let mut gate = CountdownGate::new(Some(200), 100);
        assert!(!gate.poll(199));
        assert!(gate.poll(200));
        assert!(!gate.poll(201));
        assert!(!gate.poll(0), "clock going backwards must not relock");
        assert!(gate.is_unlocked());
    }

    #[test]
    fn test_remaining_parts() {
        let gate = CountdownGate::new(Some(90_061 + 10), 10);
        assert_eq!(
            gate.remaining(10),
            Some(CountdownParts { days: 1, hours: 1, minutes: 1, seconds: 1 })
        );
        assert_eq!(CountdownGate::Unlocked.remaining(10), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_unlocks_at_go_live() {
        let start = Instant::now();
        let clock = move || 1_000 + start.elapsed().as_secs() as i64;

        let mut gate = CountdownGate::new(Some(1_090), clock());
        gate.wait(clock).await;

        assert!(gate.is_unlocked());
        assert_eq!(start.elapsed().as_secs(), 90);
    }
}
