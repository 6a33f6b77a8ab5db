use serde::{Deserialize, Serialize};
use std::fmt;

//
// ─── OPAQUE ID ─────────────────────────────────────────────────────────────────
//

/// Identifier issued by the remote authority whose shape the client does not own.
///
/// The server may hand out numbers or strings; the value is echoed back in the
/// same JSON form it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpaqueId {
    Int(i64),
    Text(String),
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpaqueId::Int(v) => write!(f, "{v}"),
            OpaqueId::Text(v) => f.write_str(v),
        }
    }
}

//
// ─── ATTEMPT / OPTION IDS ──────────────────────────────────────────────────────
//

/// Identifier of one run, issued by `start_attempt`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(OpaqueId);

impl AttemptId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(OpaqueId::Text(id.into()))
    }

    #[must_use]
    pub fn from_int(id: i64) -> Self {
        Self(OpaqueId::Int(id))
    }

    #[must_use]
    pub fn as_opaque(&self) -> &OpaqueId {
        &self.0
    }
}

/// Identifier of one answer option within a question.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(OpaqueId);

impl OptionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(OpaqueId::Text(id.into()))
    }

    #[must_use]
    pub fn from_int(id: i64) -> Self {
        Self(OpaqueId::Int(id))
    }

    #[must_use]
    pub fn as_opaque(&self) -> &OpaqueId {
        &self.0
    }
}

//
// ─── QUESTION ID ───────────────────────────────────────────────────────────────
//

/// Integer identifier of a question in the server's bank.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(i64);

impl QuestionId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Parse a textual id, tolerating surrounding whitespace.
    ///
    /// Returns `None` for anything that is not a base-10 integer.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().map(Self)
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", self.0)
    }
}

impl fmt::Debug for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
