//! photobox protocol - wire format for hub communication
//!
//! Clients and the hub exchange JSON text frames over WebSocket:
//! - inbound `ActionRequest`s tagged by `action`
//! - outbound `Event`s tagged by `event`, broadcast to every client

pub mod error;
pub mod message;
pub mod parse;

pub use error::ProtocolError;
pub use message::{ActionRequest, Event};
pub use parse::{decode_action, decode_image_payload};
