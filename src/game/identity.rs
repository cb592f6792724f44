//! Identity as seen by the store.
//!
//! The identity provider owns sign-in; the store only reads the current uid
//! to pick storage keys and decide whether remote sync applies. It does so
//! through `IdentityAccessor`, so tests can drive identity by hand.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::CredentialError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// A signed-in user: stable uid plus an optional display string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub display: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, display: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            display,
        }
    }
}

/// Read-only view of "who is signed in right now".
pub trait IdentityAccessor {
    fn current(&self) -> Option<Identity>;

    fn uid(&self) -> Option<String> {
        self.current().map(|i| i.uid)
    }
}

/// Shared, settable identity slot. The page's auth listener writes it, the
/// store reads it.
#[derive(Debug, Clone, Default)]
pub struct IdentityCell {
    inner: Rc<RefCell<Option<Identity>>>,
}

impl IdentityCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, identity: Option<Identity>) {
        *self.inner.borrow_mut() = identity;
    }
}

impl IdentityAccessor for IdentityCell {
    fn current(&self) -> Option<Identity> {
        self.inner.borrow().clone()
    }
}

/// Check sign-in form input before handing it to the identity provider.
/// Returns the trimmed email.
pub fn validate_sign_in(email: &str, password: &str) -> Result<String, CredentialError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || password.is_empty() {
        return Err(CredentialError::Missing);
    }
    Ok(trimmed.to_string())
}

/// Same as `validate_sign_in`, plus the minimum password length.
pub fn validate_sign_up(email: &str, password: &str) -> Result<String, CredentialError> {
    let trimmed = validate_sign_in(email, password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CredentialError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(trimmed)
}
