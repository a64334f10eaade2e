// ABOUTME: Defines pages, audit-log transactions, and the opaque keys that identify them.
// ABOUTME: Field names serialize in PascalCase to match the wiki's JSON wire format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// A key string that could not be decoded into a store identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed key: {0:?}")]
pub struct InvalidKey(pub String);

/// Store-assigned identifier of a page. Stable for the page's whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(Ulid);

impl PageKey {
    pub fn new(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl FromStr for PageKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| InvalidKey(s.to_string()))
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Store-assigned identifier of a transaction. Keys are generated monotonically,
/// so later transactions sort after earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionKey(Ulid);

impl TransactionKey {
    pub fn new(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl FromStr for TransactionKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| InvalidKey(s.to_string()))
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The current state of a page as held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Page {
    pub key: PageKey,
    pub title: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

/// The client-supplied content of a page, before the store assigns a key and
/// the engine assigns a date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDraft {
    pub title: String,
    pub body: String,
}

impl PageDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// The page state recorded inside a transaction. Delete transactions carry
/// only the key; the other fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PageSnapshot {
    pub key: PageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl PageSnapshot {
    /// A snapshot holding nothing but the page key.
    pub fn key_only(key: PageKey) -> Self {
        Self {
            key,
            title: None,
            body: None,
            date: None,
        }
    }
}

impl From<Page> for PageSnapshot {
    fn from(page: Page) -> Self {
        Self {
            key: page.key,
            title: Some(page.title),
            body: Some(page.body),
            date: Some(page.date),
        }
    }
}

/// What a transaction did to its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Insert,
    Update,
    Delete,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Insert => "insert",
            TransactionKind::Update => "update",
            TransactionKind::Delete => "delete",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(TransactionKind::Insert),
            "update" => Ok(TransactionKind::Update),
            "delete" => Ok(TransactionKind::Delete),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit-log entry recording one mutation of one page.
///
/// `date` is copied from the mutation that produced the entry and is the
/// primary sort key of the log. `sequence` is assigned by the store in commit
/// order and breaks ties between entries sharing a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    pub key: TransactionKey,
    #[serde(rename = "Type")]
    pub kind: TransactionKind,
    pub page: PageSnapshot,
    pub date: DateTime<Utc>,
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_key_parses_its_own_display() {
        let key = PageKey::new(Ulid::new());
        let parsed: PageKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(
            "not-a-key".parse::<PageKey>(),
            Err(InvalidKey("not-a-key".to_string()))
        );
        assert!("".parse::<TransactionKey>().is_err());
    }

    #[test]
    fn page_serializes_with_wire_field_names() {
        let page = Page {
            key: PageKey::new(Ulid::new()),
            title: "Red".to_string(),
            body: "#0".to_string(),
            date: Utc::now(),
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["Key"], page.key.to_string());
        assert_eq!(json["Title"], "Red");
        assert_eq!(json["Body"], "#0");
        assert!(json["Date"].is_string());
    }

    #[test]
    fn delete_snapshot_serializes_only_the_key() {
        let key = PageKey::new(Ulid::new());
        let json = serde_json::to_value(PageSnapshot::key_only(key)).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["Key"], key.to_string());
    }

    #[test]
    fn transaction_kind_uses_type_field_in_lowercase() {
        let txn = Transaction {
            key: TransactionKey::new(Ulid::new()),
            kind: TransactionKind::Update,
            page: PageSnapshot::key_only(PageKey::new(Ulid::new())),
            date: Utc::now(),
            sequence: 7,
        };
        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["Type"], "update");
        assert_eq!(json["Sequence"], 7);

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, txn);
    }

    #[test]
    fn transaction_kind_from_str_matches_as_str() {
        for kind in [
            TransactionKind::Insert,
            TransactionKind::Update,
            TransactionKind::Delete,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("upsert".parse::<TransactionKind>().is_err());
    }
}
