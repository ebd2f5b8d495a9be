use tokio::sync::mpsc;

use crate::action::Action;

/// Fire-and-forget user notifications owned by the host view.
pub trait Notifier: Send + Sync {
    fn notify_error(&self, message: &str);
    fn notify_success(&self, message: &str);
}

/// Routes notifications into the app's action channel so they show up in the
/// status bar on the next update.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Action>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_error(&self, message: &str) {
        self.tx.send(Action::Error(message.to_string())).ok();
    }

    fn notify_success(&self, message: &str) {
        self.tx.send(Action::Notice(message.to_string())).ok();
    }
}
