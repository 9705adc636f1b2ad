//! # erogo-notify — Notification Dispatch
//!
//! Maps realized lifecycle transitions to at most one notification payload
//! for the owning collaborator, filtered by per-event delivery settings.
//!
//! The crate is a synchronous library: it decides *whether* and *what* to
//! notify. The asynchronous delivery boundary (background email worker,
//! fire-and-forget semantics) lives in the service crate — delivery
//! failures there are logged and counted, never surfaced to the caller
//! whose transition already committed.
//!
//! ## Allowlist
//!
//! | Event                    | Notifies owner |
//! |--------------------------|----------------|
//! | compensation reject      | yes            |
//! | compensation liquidation | yes            |
//! | compensation approve     | no             |
//! | reimbursement approve    | yes            |
//! | reimbursement reject     | yes            |
//! | reimbursement liquidation| yes            |
//! | submit / reopen (both)   | no             |

pub mod dispatch;
pub mod event;
pub mod settings;
pub mod sink;

pub use dispatch::{dispatch, NotificationPayload};
pub use event::NotificationEvent;
pub use settings::{
    plan_delivery, AllowAllSettings, DeliveryChannel, DeliverySettingsLookup,
    InMemoryDeliverySettings,
};
pub use sink::{InMemorySink, LoggingSink, NotificationSink, SinkError};
