use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_TIME: &str = "Unknown time";

/// Serialized markup for one chat entry, as surfaced by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment(String);

impl RawFragment {
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for RawFragment {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RawFragment {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One rendered chat message. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    display_time: String,
    author: String,
    body: String,
}

impl ChatRecord {
    pub fn new(
        display_time: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            display_time: display_time.into(),
            author: author.into(),
            body: body.into(),
        }
    }

    pub fn display_time(&self) -> &str {
        &self.display_time
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn fingerprint(&self, mode: FingerprintMode) -> Fingerprint {
        let mut hasher = Sha256::new();
        hash_field(&mut hasher, &self.display_time);
        if mode == FingerprintMode::TimeAuthorBody {
            hash_field(&mut hasher, &self.author);
        }
        hash_field(&mut hasher, &self.body);
        Fingerprint(hasher.finalize().into())
    }
}

impl fmt::Display for ChatRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ {} ] ( {} ) : {}",
            self.display_time, self.author, self.body
        )
    }
}

// Length prefix keeps ("a-b", "c") and ("a", "b-c") apart.
fn hash_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn short_hex(&self) -> String {
        self.0[..6].iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Which record fields identify a logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// Timestamp and body only. Two authors posting the same text in the
    /// same second collapse into one message.
    TimeBody,
    #[default]
    TimeAuthorBody,
}

impl FingerprintMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintMode::TimeBody => "time-body",
            FingerprintMode::TimeAuthorBody => "time-author-body",
        }
    }
}

impl FromStr for FingerprintMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "time-body" => Ok(FingerprintMode::TimeBody),
            "time-author-body" => Ok(FingerprintMode::TimeAuthorBody),
            other => Err(format!("unknown fingerprint mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_fixed_line_shape() {
        let record = ChatRecord::new("10:00:00", "alice", "HELLO world");
        assert_eq!(record.to_string(), "[ 10:00:00 ] ( alice ) : HELLO world");
    }

    #[test]
    fn time_body_mode_ignores_author() {
        let a = ChatRecord::new("10:00:00", "alice", "hi");
        let b = ChatRecord::new("10:00:00", "bob", "hi");
        assert_eq!(
            a.fingerprint(FingerprintMode::TimeBody),
            b.fingerprint(FingerprintMode::TimeBody)
        );
        assert_ne!(
            a.fingerprint(FingerprintMode::TimeAuthorBody),
            b.fingerprint(FingerprintMode::TimeAuthorBody)
        );
    }

    #[test]
    fn field_boundaries_do_not_alias() {
        let a = ChatRecord::new("10:00:00-x", "", "y");
        let b = ChatRecord::new("10:00:00", "", "x-y");
        assert_ne!(
            a.fingerprint(FingerprintMode::TimeBody),
            b.fingerprint(FingerprintMode::TimeBody)
        );
    }

    #[test]
    fn fingerprint_mode_parses_cli_values() {
        assert_eq!(
            "time-body".parse::<FingerprintMode>(),
            Ok(FingerprintMode::TimeBody)
        );
        assert_eq!(
            " Time-Author-Body ".parse::<FingerprintMode>(),
            Ok(FingerprintMode::TimeAuthorBody)
        );
        assert!("author".parse::<FingerprintMode>().is_err());
    }
}
