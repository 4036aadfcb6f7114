use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Base-62 alphabet in ASCII order, so that string order matches numeric order.
const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Every TUID renders to exactly this many characters (zero padded).
pub const TUID_LENGTH: usize = 22;

/// Last timestamp handed out by `Tuid::new`, used to keep generation strictly monotonic.
static LAST_NANOS: AtomicU64 = AtomicU64::new(0);

/// TuidError
///
/// Describes why a string could not be parsed as a TUID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TuidError {
    #[error("parse error: expected 22 characters, found {0}")]
    InvalidLength(usize),
    #[error("parse error: invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("parse error: value overflows 128 bits")]
    Overflow,
}

/// Tuid
///
/// A time-ordered unique identifier. The high 64 bits hold nanoseconds since the Unix
/// epoch and the low 64 bits hold random entropy. The text form is a fixed-width base-62
/// string, so sorting TUID strings lexicographically sorts them by creation time.
/// Entity IDs, version IDs and bearer tokens are all TUIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tuid(u128);

impl Tuid {
    /// Generates a new TUID. Within a process, each call returns a strictly greater value.
    pub fn new() -> Self {
        let (_, entropy) = Uuid::new_v4().as_u64_pair();
        Self::from_parts(next_nanos(), entropy)
    }

    pub fn from_parts(nanos: u64, entropy: u64) -> Self {
        Self((u128::from(nanos) << 64) | u128::from(entropy))
    }

    /// Nanoseconds since the Unix epoch encoded in the high half.
    pub fn nanos(&self) -> u64 {
        (self.0 >> 64) as u64
    }

    pub fn entropy(&self) -> u64 {
        self.0 as u64
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(i64::try_from(self.nanos()).unwrap_or(i64::MAX))
    }

    pub fn info(&self) -> TuidInfo {
        TuidInfo {
            id: self.to_string(),
            timestamp: self.timestamp(),
            entropy: format!("{:016x}", self.entropy()),
        }
    }
}

impl Default for Tuid {
    fn default() -> Self {
        Self::new()
    }
}

fn next_nanos() -> u64 {
    let now = Utc::now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or(0);

    let mut last = LAST_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last.saturating_add(1));
        match LAST_NANOS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

impl fmt::Display for Tuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [b'0'; TUID_LENGTH];
        let mut value = self.0;
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(value % 62) as usize];
            value /= 62;
        }
        // The alphabet is ASCII, so the buffer is always valid UTF-8.
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

impl FromStr for Tuid {
    type Err = TuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let length = s.chars().count();
        if length != TUID_LENGTH {
            return Err(TuidError::InvalidLength(length));
        }

        let mut value: u128 = 0;
        for c in s.chars() {
            let digit = digit_value(c).ok_or(TuidError::InvalidCharacter(c))?;
            value = value
                .checked_mul(62)
                .and_then(|v| v.checked_add(digit))
                .ok_or(TuidError::Overflow)?;
        }
        Ok(Self(value))
    }
}

fn digit_value(c: char) -> Option<u128> {
    let digit = match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A'..='Z' => c as u32 - 'A' as u32 + 10,
        'a'..='z' => c as u32 - 'a' as u32 + 36,
        _ => return None,
    };
    Some(u128::from(digit))
}

/// Returns true if `s` is a syntactically valid TUID.
pub fn is_valid(s: &str) -> bool {
    s.parse::<Tuid>().is_ok()
}

/// TuidInfo
///
/// Decoded view of a TUID returned by the `/v1/tuids` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TuidInfo {
    pub id: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    /// Random half of the identifier, hex encoded.
    pub entropy: String,
}
