//! Verifier port for message format and content checks.

use crate::endpoint::domain::{Message, VerificationError};

/// Checks that a message matches an expected format.
///
/// Implementations should be stateless and thread-safe; the same verifier
/// may serve several endpoints.
pub trait MessageVerifier: Send + Sync {
    /// Verifies a message.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] when the message fails the check.
    fn verify(&self, message: &Message) -> Result<(), VerificationError>;
}

impl<F> MessageVerifier for F
where
    F: Fn(&Message) -> Result<(), VerificationError> + Send + Sync,
{
    fn verify(&self, message: &Message) -> Result<(), VerificationError> {
        self(message)
    }
}
