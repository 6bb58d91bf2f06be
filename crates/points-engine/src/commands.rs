//! Validated ledger commands.
//!
//! Commands are checked on construction, so the ledger never opens a unit of
//! work for a malformed request.

use points_core::UserId;

use crate::error::{LedgerError, Result};

/// Register a new user, optionally referred by another user's code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUser {
    name: String,
    email: String,
    referral_code: Option<String>,
}

impl RegisterUser {
    /// Build a registration command.
    ///
    /// Surrounding whitespace is trimmed. A blank referral code counts as
    /// no referral code.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::MissingField` if `name` or `email` is blank.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        referral_code: Option<String>,
    ) -> Result<Self> {
        let name = required("name", name.into())?;
        let email = required("email", email.into())?;
        let referral_code = referral_code
            .map(|code| code.trim().to_owned())
            .filter(|code| !code.is_empty());

        Ok(Self {
            name,
            email,
            referral_code,
        })
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contact email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Referral code of the inviting user, if any.
    #[must_use]
    pub fn referral_code(&self) -> Option<&str> {
        self.referral_code.as_deref()
    }
}

fn required(field: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::MissingField(field));
    }
    Ok(trimmed.to_owned())
}

/// Move points from one user to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPoints {
    sender: UserId,
    recipient: UserId,
    points: i64,
}

impl TransferPoints {
    /// Build a transfer command.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `points` is not positive and
    /// `LedgerError::SelfTransfer` if sender and recipient are the same.
    pub fn new(sender: UserId, recipient: UserId, points: i64) -> Result<Self> {
        if points <= 0 {
            return Err(LedgerError::InvalidAmount(points));
        }
        if sender == recipient {
            return Err(LedgerError::SelfTransfer);
        }

        Ok(Self {
            sender,
            recipient,
            points,
        })
    }

    /// Paying user.
    #[must_use]
    pub const fn sender(&self) -> UserId {
        self.sender
    }

    /// Receiving user.
    #[must_use]
    pub const fn recipient(&self) -> UserId {
        self.recipient
    }

    /// Points moved.
    #[must_use]
    pub const fn points(&self) -> i64 {
        self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_trims_fields() {
        let cmd = RegisterUser::new("  Ada ", "ada@example.com\n", Some(" abc123 ".into())).unwrap();
        assert_eq!(cmd.name(), "Ada");
        assert_eq!(cmd.email(), "ada@example.com");
        assert_eq!(cmd.referral_code(), Some("abc123"));
    }

    #[test]
    fn register_requires_name_and_email() {
        assert!(matches!(
            RegisterUser::new(" ", "a@example.com", None),
            Err(LedgerError::MissingField("name"))
        ));
        assert!(matches!(
            RegisterUser::new("Ada", "", None),
            Err(LedgerError::MissingField("email"))
        ));
    }

    #[test]
    fn blank_referral_code_is_ignored() {
        let cmd = RegisterUser::new("Ada", "a@example.com", Some("   ".into())).unwrap();
        assert_eq!(cmd.referral_code(), None);
    }

    #[test]
    fn transfer_rejects_non_positive_points() {
        let (a, b) = (UserId::generate(), UserId::generate());
        assert!(matches!(
            TransferPoints::new(a, b, 0),
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            TransferPoints::new(a, b, -10),
            Err(LedgerError::InvalidAmount(-10))
        ));
    }

    #[test]
    fn transfer_rejects_self_transfer() {
        let a = UserId::generate();
        assert!(matches!(
            TransferPoints::new(a, a, 10),
            Err(LedgerError::SelfTransfer)
        ));
    }

    #[test]
    fn transfer_accessors() {
        let (a, b) = (UserId::generate(), UserId::generate());
        let cmd = TransferPoints::new(a, b, 25).unwrap();
        assert_eq!(cmd.sender(), a);
        assert_eq!(cmd.recipient(), b);
        assert_eq!(cmd.points(), 25);
    }
}
