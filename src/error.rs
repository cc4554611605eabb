//! Error handling with context wrappers for grammers errors.
//!
//! This module provides helpful error context for Telegram API operations.

use anyhow::{Context, Result};

/// Extension trait to add Telegram-specific context to errors.
pub trait TgErrorContext<T> {
    /// Add context for connection operations.
    fn context_connect(self) -> Result<T>;

    /// Add context for authorization check.
    fn context_auth_check(self) -> Result<T>;

    /// Add context for sending a login code request.
    fn context_login_code(self, phone: &str) -> Result<T>;

    /// Add context for 2FA password check.
    fn context_2fa(self) -> Result<T>;

    /// Add context for sign-out operations.
    fn context_sign_out(self) -> Result<T>;

    /// Add context for dialog iteration.
    fn context_dialogs(self) -> Result<T>;

    /// Add context for history page fetches.
    fn context_history(self, channel: &str) -> Result<T>;

    /// Add context for reply-thread fetches.
    fn context_replies(self, channel: &str, msg_id: i32) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> TgErrorContext<T>
    for std::result::Result<T, E>
{
    fn context_connect(self) -> Result<T> {
        self.context("Failed to open the Telegram session database")
    }

    fn context_auth_check(self) -> Result<T> {
        self.context("Failed to check authorization status")
    }

    fn context_login_code(self, phone: &str) -> Result<T> {
        self.with_context(|| {
            format!(
                "Failed to request login code for {}. Verify the phone number is correct.",
                phone
            )
        })
    }

    fn context_2fa(self) -> Result<T> {
        self.context("Two-factor authentication failed. Check your password.")
    }

    fn context_sign_out(self) -> Result<T> {
        self.context("Failed to sign out from Telegram")
    }

    fn context_dialogs(self) -> Result<T> {
        self.context("Failed to fetch dialogs from Telegram")
    }

    fn context_history(self, channel: &str) -> Result<T> {
        self.with_context(|| format!("Failed to fetch history for channel {}", channel))
    }

    fn context_replies(self, channel: &str, msg_id: i32) -> Result<T> {
        self.with_context(|| {
            format!(
                "Failed to fetch reply thread of message {} in channel {}",
                msg_id, channel
            )
        })
    }
}
