//! Identity tokens and their payload encodings
//!
//! A token is the immutable triple (display name, id, issue time). What
//! actually gets printed into the scannable code is its *payload*, the
//! string that the registry stores and the scanner compares byte for byte.
//!
//! Two payload encodings exist:
//! - [`PayloadFormat::Canonical`]: `ROLLCALL/1 id=<id> issued=<rfc3339> name=<name>`.
//!   Fields appear in a fixed order and the name comes last, so any
//!   printable name parses back unambiguously.
//! - [`PayloadFormat::Legacy`]: the confirmation sentence itself, kept for
//!   registries written before the canonical form existed.
//!
//! Both encodings produce the same human-readable [`IdentityToken::confirmation`].

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Marker that opens every canonical payload.
const CANONICAL_PREFIX: &str = "ROLLCALL/1 ";

/// Sentence appended to every confirmation message.
pub const CONFIRMATION_PHRASE: &str = "Your attendance has been taken successfully.";

/// Second initial used when only one word of a name carries a letter.
pub const FILLER_INITIAL: char = 'X';

/// Inclusive bounds of the random part of an id.
pub const NUMERAL_MIN: u32 = 10_000;
pub const NUMERAL_MAX: u32 = 99_999;

const NUMERAL_DIGITS: usize = 5;

/// Bytes reserved for initials: two chars of up to four UTF-8 bytes each.
const INITIALS_CAPACITY: usize = 8;

/// How a token is turned into the string stored in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Field-ordered, parseable key.
    #[default]
    Canonical,
    /// The confirmation sentence doubles as the key.
    Legacy,
}

/// Two initials followed by a five-digit numeral, e.g. `AL48213`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenId {
    initials: heapless::String<INITIALS_CAPACITY>,
    numeral: u32,
}

impl TokenId {
    /// Build an id from a display name's initials and a numeral.
    ///
    /// Each initial is the first ASCII letter of a word, uppercased. Words
    /// without one are skipped, so `3rd Street` gives `RS` and `élodie
    /// ørsted` gives `LR`. Returns `None` if no word has an ASCII letter or
    /// the numeral is out of range.
    pub fn from_name(display_name: &str, numeral: u32) -> Option<Self> {
        let mut letters = display_name.split_whitespace().filter_map(first_ascii_letter);
        let first = letters.next()?;
        let second = letters.next().unwrap_or(FILLER_INITIAL);

        let mut initials = heapless::String::new();
        initials.push(first).ok()?;
        initials.push(second).ok()?;
        Self::new(initials, numeral)
    }

    fn new(initials: heapless::String<INITIALS_CAPACITY>, numeral: u32) -> Option<Self> {
        if initials.is_empty() || !(NUMERAL_MIN..=NUMERAL_MAX).contains(&numeral) {
            return None;
        }
        Some(Self { initials, numeral })
    }

    /// Parse an id previously produced by [`Display`](fmt::Display).
    pub fn parse(s: &str) -> Option<Self> {
        let split = s.len().checked_sub(NUMERAL_DIGITS)?;
        if !s.is_char_boundary(split) {
            return None;
        }
        let (initials, digits) = s.split_at(split);
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let initials = heapless::String::try_from(initials).ok()?;
        Self::new(initials, digits.parse().ok()?)
    }

    pub fn initials(&self) -> &str {
        &self.initials
    }

    pub fn numeral(&self) -> u32 {
        self.numeral
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.initials, self.numeral)
    }
}

fn first_ascii_letter(word: &str) -> Option<char> {
    word.chars()
        .find(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
}

/// An issued identity. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    display_name: String,
    id: TokenId,
    issued_at: DateTime<Utc>,
}

impl IdentityToken {
    pub(crate) fn new(display_name: String, id: TokenId, issued_at: DateTime<Utc>) -> Self {
        Self {
            display_name,
            id,
            issued_at,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn id(&self) -> &TokenId {
        &self.id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Encode the token as a registry key.
    pub fn payload(&self, format: PayloadFormat) -> Payload {
        match format {
            PayloadFormat::Canonical => Payload(format!(
                "{CANONICAL_PREFIX}id={} issued={} name={}",
                self.id,
                self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                self.display_name
            )),
            PayloadFormat::Legacy => Payload(self.confirmation()),
        }
    }

    /// Human-readable message shown to the holder.
    pub fn confirmation(&self) -> String {
        format!(
            "Name: {} | ID: {} | {CONFIRMATION_PHRASE}",
            self.display_name, self.id
        )
    }
}

/// The exact string carried by a scannable code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for Payload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Payload {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields recovered from a payload string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFields {
    pub display_name: String,
    pub id: Option<TokenId>,
    /// Only canonical payloads carry the issue time.
    pub issued_at: Option<DateTime<Utc>>,
    pub format: PayloadFormat,
}

impl TokenFields {
    /// Read either payload encoding. Returns `None` for foreign strings.
    pub fn parse(payload: &str) -> Option<Self> {
        if let Some(rest) = payload.strip_prefix(CANONICAL_PREFIX) {
            let rest = rest.strip_prefix("id=")?;
            let (id, rest) = rest.split_once(" issued=")?;
            let (issued, name) = rest.split_once(" name=")?;
            return Some(Self {
                display_name: name.to_owned(),
                id: TokenId::parse(id),
                issued_at: DateTime::parse_from_rfc3339(issued)
                    .ok()
                    .map(|t| t.with_timezone(&Utc)),
                format: PayloadFormat::Canonical,
            });
        }

        let rest = payload.strip_prefix("Name:")?;
        // Older payloads may not end with the phrase; the name always
        // precedes the first " | ".
        let (name, id) = match rest
            .strip_suffix(CONFIRMATION_PHRASE)
            .and_then(|r| r.strip_suffix(" | "))
            .and_then(|r| r.rsplit_once(" | ID: "))
        {
            Some((name, id)) => (name, TokenId::parse(id.trim())),
            None => (rest.split('|').next().unwrap_or(rest), None),
        };
        Some(Self {
            display_name: name.trim().to_owned(),
            id,
            issued_at: None,
            format: PayloadFormat::Legacy,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ada() -> IdentityToken {
        let id = TokenId::from_name("Ada Lovelace", 48213).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        IdentityToken::new("Ada Lovelace".into(), id, at)
    }

    #[test]
    fn test_initials_from_two_words() {
        let id = TokenId::from_name("ada  lovelace byron", 12345).unwrap();
        assert_eq!(id.initials(), "AL");
        assert_eq!(id.to_string(), "AL12345");
    }

    #[test]
    fn test_single_word_uses_filler() {
        let id = TokenId::from_name("Plato", 99999).unwrap();
        assert_eq!(id.to_string(), "PX99999");
    }

    #[test]
    fn test_initials_are_ascii_letters() {
        for (name, initials) in [
            ("3rd Street", "RS"),
            ("@dmin", "DX"),
            ("élodie ørsted", "LR"),
            ("李 Lei", "LX"),
            ("Ada 3 Lovelace", "AL"),
        ] {
            let id = TokenId::from_name(name, 10000).unwrap();
            assert_eq!(id.initials(), initials, "{name}");
            assert_eq!(TokenId::parse(&id.to_string()), Some(id));
        }
    }

    #[test]
    fn test_name_without_ascii_letters_has_no_initials() {
        assert!(TokenId::from_name("李 雷", 12345).is_none());
        assert!(TokenId::from_name("42 @@", 12345).is_none());
    }

    #[test]
    fn test_numeral_out_of_range_rejected() {
        assert!(TokenId::from_name("Ada Lovelace", 9999).is_none());
        assert!(TokenId::from_name("Ada Lovelace", 100_000).is_none());
        assert!(TokenId::from_name("   ", 12345).is_none());
    }

    #[test]
    fn test_id_parse_rejects_garbage() {
        assert!(TokenId::parse("AL1234").is_none());
        assert!(TokenId::parse("12345").is_none());
        assert!(TokenId::parse("ALabcde").is_none());
        assert_eq!(TokenId::parse("AL12345").unwrap().numeral(), 12345);
    }

    #[test]
    fn test_canonical_payload_layout() {
        let payload = ada().payload(PayloadFormat::Canonical);
        assert_eq!(
            payload.as_str(),
            "ROLLCALL/1 id=AL48213 issued=2026-03-01T09:30:00Z name=Ada Lovelace"
        );
    }

    #[test]
    fn test_legacy_payload_is_confirmation() {
        let token = ada();
        assert_eq!(
            token.payload(PayloadFormat::Legacy).as_str(),
            "Name: Ada Lovelace | ID: AL48213 | Your attendance has been taken successfully."
        );
        assert_eq!(token.payload(PayloadFormat::Legacy).as_str(), token.confirmation());
    }

    #[test]
    fn test_parse_canonical() {
        let token = ada();
        let fields = TokenFields::parse(token.payload(PayloadFormat::Canonical).as_str()).unwrap();
        assert_eq!(fields.display_name, "Ada Lovelace");
        assert_eq!(fields.id.as_ref(), Some(token.id()));
        assert_eq!(fields.issued_at, Some(token.issued_at()));
        assert_eq!(fields.format, PayloadFormat::Canonical);
    }

    #[test]
    fn test_parse_canonical_name_with_delimiters() {
        let id = TokenId::from_name("Jo | name=x", 11111).unwrap();
        let token = IdentityToken::new("Jo | name=x".into(), id, Utc::now());
        let fields = TokenFields::parse(token.payload(PayloadFormat::Canonical).as_str()).unwrap();
        assert_eq!(fields.display_name, "Jo | name=x");
    }

    #[test]
    fn test_parse_legacy() {
        let token = ada();
        let fields = TokenFields::parse(&token.confirmation()).unwrap();
        assert_eq!(fields.display_name, "Ada Lovelace");
        assert_eq!(fields.id.unwrap().to_string(), "AL48213");
        assert_eq!(fields.issued_at, None);
    }

    #[test]
    fn test_parse_truncated_legacy_falls_back_to_first_field() {
        let fields = TokenFields::parse("Name: Grace Hopper | something else").unwrap();
        assert_eq!(fields.display_name, "Grace Hopper");
        assert!(fields.id.is_none());
    }

    #[test]
    fn test_parse_foreign_payload() {
        assert!(TokenFields::parse("https://example.com").is_none());
    }
}
