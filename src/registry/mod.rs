// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Language client registry.
//!
//! The registry owns every [`ClientSession`] and is the only component that
//! creates or destroys them. Collaborators (the command layer, the test
//! controller) use its read-only routing API and listen for changes.
//!
//! # Session lifecycle
//!
//! ```text
//!  absent ──open──▶ Pending ──start ok──▶ Ready ──restart──▶ Pending ─┐
//!                      │                    ▲                         │
//!                      └──start err──▶ Failed ◀────restart err────────┘
//!
//!  any state ──folder removed / deactivate──▶ absent
//! ```
//!
//! Teardown never stops a client whose start is still pending: it waits for
//! the attempt to settle first.

mod client_registry;
mod factory;
mod notifier;
mod session;

pub use client_registry::{ClientRegistry, RegistryOptions};
pub use factory::{ClientFactory, ProcessClientFactory, SessionSpec};
pub use notifier::{ChangeNotifier, Subscription};
pub use session::{ClientSession, RoutingKey, SessionState};
