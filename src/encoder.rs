//! Identity encoder
//!
//! Turns a display name into an [`IdentityToken`] and the payload that
//! will be printed into its scannable code. The only non-deterministic
//! input is the numeral drawn from the supplied RNG.

use chrono::{DateTime, SubsecRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_core::RngCore;

use crate::error::{Error, Result};
use crate::token::{IdentityToken, Payload, PayloadFormat, TokenId, NUMERAL_MAX, NUMERAL_MIN};

/// A freshly issued token together with its encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedIdentity {
    pub token: IdentityToken,
    pub payload: Payload,
}

/// Check and normalize a display name.
///
/// Surrounding whitespace is dropped. Blank names and names containing
/// control characters (which would break the one-payload-per-line
/// registry) are rejected.
pub fn validate_display_name(display_name: &str) -> Result<&str> {
    let name = display_name.trim();
    if name.is_empty() {
        return Err(Error::invalid_input("display name is blank"));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::invalid_input(
            "display name contains control characters",
        ));
    }
    Ok(name)
}

pub struct IdentityEncoder<R> {
    rng: R,
    format: PayloadFormat,
}

impl IdentityEncoder<StdRng> {
    /// Encoder seeded from the operating system.
    pub fn from_entropy(format: PayloadFormat) -> Self {
        Self::new(StdRng::from_entropy(), format)
    }
}

impl<R: RngCore> IdentityEncoder<R> {
    pub fn new(rng: R, format: PayloadFormat) -> Self {
        Self { rng, format }
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    /// Issue a token for `display_name` at `issued_at`.
    ///
    /// The issue time is truncated to whole seconds so that the canonical
    /// payload parses back to the same token.
    pub fn issue(&mut self, display_name: &str, issued_at: DateTime<Utc>) -> Result<IssuedIdentity> {
        let name = validate_display_name(display_name)?;
        let numeral = self.rng.gen_range(NUMERAL_MIN..=NUMERAL_MAX);
        let id = TokenId::from_name(name, numeral)
            .ok_or_else(|| Error::invalid_input("display name has no ASCII letter for initials"))?;

        let token = IdentityToken::new(name.to_owned(), id, issued_at.trunc_subsecs(0));
        let payload = token.payload(self.format);
        Ok(IssuedIdentity { token, payload })
    }
}
