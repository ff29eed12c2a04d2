// ABOUTME: Best-effort in-app notification delivery
// ABOUTME: Failures are logged and never fail the request that triggered them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use cpoint_core::models::NewNotification;
use tracing::warn;

use crate::database::Database;

/// Store one notification, logging instead of failing
pub async fn notify(database: &Database, notification: NewNotification) {
    if let Err(e) = database.notifications().create(&notification).await {
        warn!(
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            "Failed to store notification: {e}"
        );
    }
}

/// Store a batch of notifications, one recipient each
///
/// Takes an owned batch so handler futures hold no borrowing iterator
/// across the awaits.
pub async fn notify_all(database: &Database, notifications: Vec<NewNotification>) {
    for notification in notifications {
        notify(database, notification).await;
    }
}
