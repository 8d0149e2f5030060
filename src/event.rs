use tokio::sync::mpsc;

/// Lifecycle events delivered to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
  /// Pre-cache the manifest for the current version
  Install,
  /// Evict stale generations and start intercepting
  Activate,
  /// Payload received on the control channel
  Message(String),
}

/// Queue of lifecycle events, drained one at a time by the lifecycle loop
pub struct EventHandler {
  tx: mpsc::UnboundedSender<WorkerEvent>,
  rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl EventHandler {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self { tx, rx }
  }

  /// Sender for producers (HTTP control route, activation waiter)
  pub fn sender(&self) -> mpsc::UnboundedSender<WorkerEvent> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<WorkerEvent> {
    self.rx.recv().await
  }
}

impl Default for EventHandler {
  fn default() -> Self {
    Self::new()
  }
}
