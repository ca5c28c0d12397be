//! `binos-status` – The Status Publisher
//!
//! Boots a lightweight HTTP + WebSocket server (default port `8080`) that:
//!
//! 1. **Renders** controller state as API responses:
//!    - `GET /api/status` → the current [`StatusSnapshot`] as JSON.
//!    - `GET /` → a minimal HTML landing page.
//!
//! 2. **Pushes** every snapshot change to connected WebSocket clients, so
//!    live dashboards track the bin without polling.
//!
//! 3. **Accepts** manual commands and forwards them to the controller's
//!    next tick:
//!    - `POST /api/open` / `POST /api/close` with a `bin` parameter
//!      (`organic` | `non_organic`).
//!    - `POST /api/maintenance` → toggles maintenance mode.
//!    - WebSocket frames `{"command": "open_organic" | "open_non_organic" |
//!      "close_organic" | "close_non_organic" | "get_status"}`.
//!
//! The server holds only a [`ControllerHandle`]: read-only snapshots out,
//! queued commands in.  Rejected commands answer with their reason code —
//! never a silent no-op.
//!
//! [`StatusSnapshot`]: binos_types::StatusSnapshot
//! [`ControllerHandle`]: binos_controller::ControllerHandle

pub mod server;

pub use server::{StatusServer, DEFAULT_PORT};
