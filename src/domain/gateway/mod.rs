//! Signaling gateway port
//!
//! The gateway performs negotiation and media transport on our behalf; the
//! controller only decides when to invoke it and how to read its results.
//! The trait is defined here and implemented in the infrastructure layer.

pub mod notification;
pub mod transport;

pub use notification::{GatewayErrorCode, GatewayNotification, Jsep};
pub use transport::{
    ControlRequest, NegotiationHandle, NotificationStream, SignalingTransport, TransportError,
};

#[cfg(test)]
pub use transport::MockSignalingTransport;
