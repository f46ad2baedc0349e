//! Deferred deletion of empty rooms
//!
//! Each emptied room gets one cancellable one-shot timer. When it fires the
//! expiry callback receives the pin and the token it was armed with; the
//! owner then calls [`LifecycleScheduler::complete`] to find out whether
//! that timer is still the live one.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::types::Pin;

/// Default delay before an empty room is destroyed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(30_000);

/// Identifies one arming of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug)]
struct Timer {
    token: TimerToken,
    handle: JoinHandle<()>,
}

/// At most one pending deletion timer per pin
#[derive(Debug, Default)]
pub struct LifecycleScheduler {
    timers: HashMap<Pin, Timer>,
    next_token: u64,
}

impl LifecycleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for `pin`, replacing any pending one
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, pin: Pin, grace: Duration, on_expire: F) -> TimerToken
    where
        F: FnOnce(Pin, TimerToken) + Send + 'static,
    {
        self.cancel(&pin);

        self.next_token += 1;
        let token = TimerToken(self.next_token);

        let timer_pin = pin.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            on_expire(timer_pin, token);
        });

        debug!("Deletion timer armed for room {} ({:?})", pin, grace);
        self.timers.insert(pin, Timer { token, handle });
        token
    }

    /// Cancel the pending timer for `pin`, if any
    pub fn cancel(&mut self, pin: &Pin) -> bool {
        match self.timers.remove(pin) {
            Some(timer) => {
                timer.handle.abort();
                debug!("Deletion timer cancelled for room {}", pin);
                true
            }
            None => false,
        }
    }

    /// Settle a fired timer
    ///
    /// Returns true and clears the slot only if `token` is the timer
    /// currently armed for `pin`. An expiry that raced with `cancel` or a
    /// re-arm returns false and must be ignored.
    pub fn complete(&mut self, pin: &Pin, token: TimerToken) -> bool {
        match self.timers.get(pin) {
            Some(timer) if timer.token == token => {
                self.timers.remove(pin);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, pin: &Pin) -> bool {
        self.timers.contains_key(pin)
    }

    /// Abort every pending timer
    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for LifecycleScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    type Fired = mpsc::UnboundedReceiver<(Pin, TimerToken)>;

    fn arm(
        scheduler: &mut LifecycleScheduler,
        pin: &Pin,
        grace: Duration,
    ) -> (TimerToken, Fired) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = scheduler.arm(pin.clone(), grace, move |pin, token| {
            let _ = tx.send((pin, token));
        });
        (token, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_grace() {
        let mut scheduler = LifecycleScheduler::new();
        let pin = Pin::from_number(1);
        let (token, mut fired) = arm(&mut scheduler, &pin, DEFAULT_GRACE_PERIOD);

        tokio::time::sleep(Duration::from_millis(29_000)).await;
        assert!(fired.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(fired.try_recv().unwrap(), (pin.clone(), token));

        assert!(scheduler.complete(&pin, token));
        assert!(!scheduler.is_armed(&pin));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut scheduler = LifecycleScheduler::new();
        let pin = Pin::from_number(2);
        let (_, mut fired) = arm(&mut scheduler, &pin, Duration::from_secs(5));

        assert!(scheduler.cancel(&pin));
        assert!(!scheduler.cancel(&pin));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(fired.try_recv().is_err());
        assert!(scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_timer() {
        let mut scheduler = LifecycleScheduler::new();
        let pin = Pin::from_number(3);
        let (first, mut first_fired) = arm(&mut scheduler, &pin, Duration::from_secs(5));
        let (second, mut second_fired) = arm(&mut scheduler, &pin, Duration::from_secs(5));

        assert_ne!(first, second);
        assert_eq!(scheduler.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(first_fired.try_recv().is_err());
        assert_eq!(second_fired.try_recv().unwrap().1, second);
    }

    #[tokio::test]
    async fn test_stale_token_rejected() {
        let mut scheduler = LifecycleScheduler::new();
        let pin = Pin::from_number(4);
        let (first, _fired) = arm(&mut scheduler, &pin, Duration::from_secs(60));
        let (second, _fired2) = arm(&mut scheduler, &pin, Duration::from_secs(60));

        assert!(!scheduler.complete(&pin, first));
        assert!(scheduler.is_armed(&pin));
        assert!(scheduler.complete(&pin, second));
        assert!(!scheduler.complete(&pin, second));
    }

    #[tokio::test]
    async fn test_cancel_without_timer_is_noop() {
        let mut scheduler = LifecycleScheduler::new();
        assert!(!scheduler.cancel(&Pin::from_number(5)));
    }
}
