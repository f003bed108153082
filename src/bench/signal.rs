//! One-shot broadcast signal.
//!
//! A `Trigger` releases every `Listener` at once. `fire` consumes the
//! trigger, so a signal can never be raised twice. Listeners that start
//! waiting after the signal fired return immediately.

use tokio::sync::watch;

/// Create a connected trigger/listener pair.
pub fn signal() -> (Trigger, Listener) {
    let (tx, rx) = watch::channel(false);
    (Trigger { tx }, Listener { rx })
}

/// Sending half of a one-shot signal.
#[derive(Debug)]
pub struct Trigger {
    tx: watch::Sender<bool>,
}

impl Trigger {
    /// Release all listeners.
    pub fn fire(self) {
        // send_replace stores the value even when no listener is left.
        self.tx.send_replace(true);
    }
}

/// The trigger was dropped without firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalDropped;

/// Receiving half of a one-shot signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Listener {
    rx: watch::Receiver<bool>,
}

impl Listener {
    /// Wait until the signal fires.
    ///
    /// Returns `Err(SignalDropped)` if the trigger goes away unfired.
    pub async fn wait(&mut self) -> Result<(), SignalDropped> {
        self.rx
            .wait_for(|fired| *fired)
            .await
            .map(|_| ())
            .map_err(|_| SignalDropped)
    }

    /// Wait until the signal fires, pending forever if it never will.
    pub async fn fired(&mut self) {
        if self.wait().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    #[test]
    fn test_fire_wakes_all_listeners() {
        let (trigger, listener) = signal();
        let mut first = listener.clone();
        let mut second = listener;

        let mut a = task::spawn(first.wait());
        let mut b = task::spawn(second.wait());
        assert_pending!(a.poll());
        assert_pending!(b.poll());

        trigger.fire();

        assert!(a.is_woken());
        assert!(b.is_woken());
        assert_ready_eq!(a.poll(), Ok(()));
        assert_ready_eq!(b.poll(), Ok(()));
    }

    #[test]
    fn test_late_listener_sees_fired() {
        let (trigger, mut listener) = signal();
        trigger.fire();

        let mut wait = task::spawn(listener.wait());
        assert_ready_eq!(wait.poll(), Ok(()));
    }

    #[test]
    fn test_dropped_trigger() {
        let (trigger, mut listener) = signal();
        let mut wait = task::spawn(listener.wait());
        assert_pending!(wait.poll());

        drop(trigger);

        assert_ready_eq!(wait.poll(), Err(SignalDropped));
    }

    #[test]
    fn test_fired_pends_when_dropped() {
        let (trigger, mut listener) = signal();
        drop(trigger);

        let mut fired = task::spawn(listener.fired());
        assert_pending!(fired.poll());
    }

    #[test]
    fn test_fired_resolves() {
        let (trigger, mut listener) = signal();
        trigger.fire();

        let mut fired = task::spawn(listener.fired());
        assert_ready!(fired.poll());
    }
}
