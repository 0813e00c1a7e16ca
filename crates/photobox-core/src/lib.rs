//! photobox core - shared types for the photo station hub
//!
//! This crate provides the domain types shared between the hub daemon
//! (photoboxd) and the wire protocol:
//! - `SessionId` - identity of one connected client
//! - `InterruptSignal` - hardware button notifications
//! - `ImageStore` / `ImageName` - the sequentially numbered image directory
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod session;
pub mod signal;
pub mod store;

// Re-exports for convenience
pub use error::{StoreError, StoreResult};
pub use session::SessionId;
pub use signal::InterruptSignal;
pub use store::{ImageName, ImageStore, IMAGE_EXTENSION};
