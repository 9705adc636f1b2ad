//! # Delivery Settings
//!
//! The per-`(event, recipient role)` channel flags consulted before any
//! payload is handed to a sink. The settings store is externally owned;
//! the engine only asks boolean questions through the lookup trait.

use std::collections::HashMap;

use erogo_core::Role;
use serde::{Deserialize, Serialize};

use crate::event::NotificationEvent;

/// A delivery channel for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    /// In-app notification, delivered synchronously to the sink.
    InApp,
    /// E-mail, delivered fire-and-forget by the background worker.
    Email,
}

impl DeliveryChannel {
    /// The wire name of the channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::Email => "email",
        }
    }
}

/// Read-only lookup of delivery preferences.
pub trait DeliverySettingsLookup {
    /// Whether `channel` is enabled for `event` notifications to `role`.
    fn enabled(&self, event: NotificationEvent, role: Role, channel: DeliveryChannel) -> bool;
}

/// Settings lookup that enables every channel for every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllSettings;

impl DeliverySettingsLookup for AllowAllSettings {
    fn enabled(&self, _: NotificationEvent, _: Role, _: DeliveryChannel) -> bool {
        true
    }
}

/// In-memory settings with per-key overrides, enabled by default.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDeliverySettings {
    overrides: HashMap<(NotificationEvent, Role, DeliveryChannel), bool>,
}

impl InMemoryDeliverySettings {
    /// Create settings with everything enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a single `(event, role, channel)` flag.
    pub fn set(
        &mut self,
        event: NotificationEvent,
        role: Role,
        channel: DeliveryChannel,
        enabled: bool,
    ) {
        self.overrides.insert((event, role, channel), enabled);
    }
}

impl DeliverySettingsLookup for InMemoryDeliverySettings {
    fn enabled(&self, event: NotificationEvent, role: Role, channel: DeliveryChannel) -> bool {
        *self.overrides.get(&(event, role, channel)).unwrap_or(&true)
    }
}

/// The channels an allowlisted event should actually go out on.
pub fn plan_delivery(
    event: NotificationEvent,
    recipient_role: Role,
    settings: &dyn DeliverySettingsLookup,
) -> Vec<DeliveryChannel> {
    [DeliveryChannel::InApp, DeliveryChannel::Email]
        .into_iter()
        .filter(|channel| settings.enabled(event, recipient_role, *channel))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_plans_both_channels() {
        let channels = plan_delivery(
            NotificationEvent::CompensationRejected,
            Role::Collaborator,
            &AllowAllSettings,
        );
        assert_eq!(channels, vec![DeliveryChannel::InApp, DeliveryChannel::Email]);
    }

    #[test]
    fn disabled_channel_is_skipped() {
        let mut settings = InMemoryDeliverySettings::new();
        settings.set(
            NotificationEvent::CompensationRejected,
            Role::Collaborator,
            DeliveryChannel::InApp,
            false,
        );
        let channels = plan_delivery(
            NotificationEvent::CompensationRejected,
            Role::Collaborator,
            &settings,
        );
        assert_eq!(channels, vec![DeliveryChannel::Email]);
    }

    #[test]
    fn overrides_are_scoped_to_their_event() {
        let mut settings = InMemoryDeliverySettings::new();
        settings.set(
            NotificationEvent::CompensationRejected,
            Role::Collaborator,
            DeliveryChannel::Email,
            false,
        );
        // A different event is unaffected.
        assert!(settings.enabled(
            NotificationEvent::ReimbursementApproved,
            Role::Collaborator,
            DeliveryChannel::Email
        ));
    }

    #[test]
    fn disabling_everything_plans_nothing() {
        let mut settings = InMemoryDeliverySettings::new();
        for channel in [DeliveryChannel::InApp, DeliveryChannel::Email] {
            settings.set(
                NotificationEvent::ReimbursementLiquidated,
                Role::Collaborator,
                channel,
                false,
            );
        }
        assert!(plan_delivery(
            NotificationEvent::ReimbursementLiquidated,
            Role::Collaborator,
            &settings
        )
        .is_empty());
    }
}
