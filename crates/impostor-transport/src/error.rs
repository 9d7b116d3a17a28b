/// Errors raised by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer went away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or upgrading a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
