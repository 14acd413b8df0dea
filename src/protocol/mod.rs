//! Peer wire protocol: message classification and typed payload views.
//!
//! The schema is JSON with a `type` tag. Inbound payloads are parsed
//! once at this boundary into typed structures; everything past it
//! operates on typed fields.

pub mod message;

pub use message::{
    detection_request, received_ack, InboundMessage, JoinedNotification, MessageKind,
    MetricsUpdate,
};
