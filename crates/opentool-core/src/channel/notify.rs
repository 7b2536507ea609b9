//! Broadcast of tool list changes

use tokio::sync::broadcast;

/// Capacity of the broadcast buffer; slow subscribers see `Lagged` and
/// should treat it as a single change.
const LIST_CHANGED_CAPACITY: usize = 16;

/// Zero-payload signal that the set of available tools changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListChanged;

pub type ListChangedReceiver = broadcast::Receiver<ListChanged>;

/// Fan-out of list-changed notifications to every subscriber
#[derive(Debug, Clone)]
pub struct ListChangedNotifier {
    sender: broadcast::Sender<ListChanged>,
}

impl Default for ListChangedNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ListChangedNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIST_CHANGED_CAPACITY);
        Self { sender }
    }

    /// Subscribe to future notifications
    pub fn subscribe(&self) -> ListChangedReceiver {
        self.sender.subscribe()
    }

    /// Broadcast a notification; returns how many subscribers it reached
    pub fn notify(&self) -> usize {
        // No subscribers is not an error
        self.sender.send(ListChanged).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = ListChangedNotifier::new();
        assert_eq!(notifier.notify(), 0);
    }

    #[test]
    fn test_every_subscriber_receives() {
        let notifier = ListChangedNotifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        assert_eq!(notifier.notify(), 2);
        assert_eq!(a.try_recv(), Ok(ListChanged));
        assert_eq!(b.try_recv(), Ok(ListChanged));
        assert_eq!(a.try_recv(), Err(TryRecvError::Empty));
    }
}
