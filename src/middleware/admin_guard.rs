// ABOUTME: Authorization guard for superuser-only routes
// ABOUTME: Returns 403 Forbidden unless the caller is the global app admin
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::User;

use crate::logging::AppLogger;

/// Require the global superuser flag
///
/// # Errors
///
/// Returns `PermissionDenied` when the user is not a superuser
pub fn require_admin(user: &User) -> AppResult<()> {
    if user.is_admin {
        Ok(())
    } else {
        AppLogger::log_security_event(
            "admin_denied",
            "Admin privileges required",
            Some(&user.username),
        );
        Err(AppError::permission_denied("Admin privileges required"))
    }
}
