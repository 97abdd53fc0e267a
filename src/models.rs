use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SigninError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// Category of a recorded sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SigninType {
    Meeting,
    Event,
    Workshop,
    Competition,
    Volunteer,
    Other,
}

impl SigninType {
    pub const ALL: [SigninType; 6] = [
        SigninType::Meeting,
        SigninType::Event,
        SigninType::Workshop,
        SigninType::Competition,
        SigninType::Volunteer,
        SigninType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SigninType::Meeting => "Meeting",
            SigninType::Event => "Event",
            SigninType::Workshop => "Workshop",
            SigninType::Competition => "Competition",
            SigninType::Volunteer => "Volunteer",
            SigninType::Other => "Other",
        }
    }
}

impl fmt::Display for SigninType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigninType {
    type Err = SigninError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SigninType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| SigninError::UnknownType(value.to_string()))
    }
}

/// Type predicate for queries. `All` is never stored on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(SigninType),
}

impl TypeFilter {
    pub fn signin_type(&self) -> Option<SigninType> {
        match self {
            TypeFilter::All => None,
            TypeFilter::Only(kind) => Some(*kind),
        }
    }
}

impl From<SigninType> for TypeFilter {
    fn from(kind: SigninType) -> Self {
        TypeFilter::Only(kind)
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::All => f.write_str("All"),
            TypeFilter::Only(kind) => kind.fmt(f),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = SigninError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            Ok(TypeFilter::All)
        } else {
            value.parse().map(TypeFilter::Only)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigninEvent {
    pub id: Uuid,
    pub user_id: String,
    pub signin_type: SigninType,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair<K> {
    pub key: K,
    pub value: usize,
}

/// Leaderboard ordering of per-key counts, highest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RankedList<K>(Vec<Pair<K>>);

impl<K> RankedList<K> {
    pub(crate) fn from_sorted(pairs: Vec<Pair<K>>) -> Self {
        RankedList(pairs)
    }

    pub fn as_slice(&self) -> &[Pair<K>] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pair<K>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Pair<K>> {
        self.0
    }
}

impl<'a, K> IntoIterator for &'a RankedList<K> {
    type Item = &'a Pair<K>;
    type IntoIter = std::slice::Iter<'a, Pair<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
