//! photobox hub - sessions, device operations and event broadcast
//!
//! This crate provides the core infrastructure for the photo station hub:
//! - `registry` - Session registry and the broadcaster fanning events out
//! - `server` - WebSocket hub accepting clients and dispatching actions
//! - `device` - Capture, list and print against camera, store and printer
//! - `interrupt` - Bridge from hardware button callbacks into the hub
//! - `config` - TOML configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       photoboxd hub                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │       Hub       │────▶│      SessionRegistry        │   │
//! │  │   (WebSocket)   │     │   (connected sessions)      │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │                             │ snapshot          │
//! │           │ connections                 │                   │
//! │           ▼                             │                   │
//! │  ┌─────────────────┐     ┌──────────────┴──────────────┐   │
//! │  │ConnectionHandler│────▶│  event queue + Broadcaster  │   │
//! │  │  (per session)  │     │   (single dispatch task)    │   │
//! │  └─────────────────┘     └──────────────▲──────────────┘   │
//! │                                         │                   │
//! │                          ┌──────────────┴──────────────┐   │
//! │       GPIO callbacks ───▶│  InterruptBridge + poller   │   │
//! │                          └─────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod device;
pub mod interrupt;
pub mod registry;
pub mod server;
