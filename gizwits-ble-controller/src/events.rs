use gizwits_link::Listener;
use log::debug;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A whole payload was written
    Sent(Vec<u8>),
    /// A notification arrived
    Received(String),
}

/// Forwards engine callbacks onto a channel
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: LinkEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

impl Listener for ChannelListener {
    fn on_data_sent(&mut self, payload: &[u8]) {
        self.emit(LinkEvent::Sent(payload.to_vec()));
    }

    fn on_data_received(&mut self, message: String) {
        self.emit(LinkEvent::Received(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_in_order() {
        let (mut listener, mut rx) = ChannelListener::new();
        listener.on_data_sent(b"ping");
        listener.on_data_received("pong".to_string());

        assert_eq!(rx.recv().await, Some(LinkEvent::Sent(b"ping".to_vec())));
        assert_eq!(rx.recv().await, Some(LinkEvent::Received("pong".to_string())));
    }

    #[test]
    fn dropped_receiver_is_harmless() {
        let (mut listener, rx) = ChannelListener::new();
        drop(rx);
        listener.on_data_received("ignored".to_string());
    }
}
