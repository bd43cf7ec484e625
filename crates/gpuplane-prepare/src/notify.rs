//! Channel-backed resources-changed notifier.

use crate::ports::ResourcesChangedNotifier;
use tokio::sync::mpsc;

/// Notifier that nudges the inventory republisher over a channel. Signals
/// coalesce: a pending nudge absorbs later ones until it is consumed.
pub struct ChannelNotifier {
    tx: mpsc::Sender<()>,
}

impl ChannelNotifier {
    /// Create the notifier and the receiving end the republisher selects on.
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }
}

impl ResourcesChangedNotifier for ChannelNotifier {
    fn notify(&self) {
        // A full channel already carries a pending nudge.
        let _ = self.tx.try_send(());
    }
}
