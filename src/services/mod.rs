//! Service layer.
//!
//! The notification service owns routing, rendering and fan-out; the
//! platform adapters it drives live alongside it.

pub mod notifications;

pub use notifications::NotificationService;
