use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(ScheduleId);

/// Opaque identifier of the movable unit (a staff member).
///
/// The scheduling service may key staff by integer or by string. The form an
/// id arrived in is kept so it goes back on the wire the same way; equality,
/// hashing and ordering look at the text only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "WireId", into = "WireId")]
pub struct EntityId {
    text: String,
    numeric: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(i64),
    Text(String),
}

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            text: raw.into(),
            numeric: false,
        }
    }

    pub fn numeric(raw: i64) -> Self {
        Self {
            text: raw.to_string(),
            numeric: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }
}

impl From<WireId> for EntityId {
    fn from(value: WireId) -> Self {
        match value {
            WireId::Int(raw) => Self::numeric(raw),
            WireId::Text(raw) => Self::new(raw),
        }
    }
}

impl From<EntityId> for WireId {
    fn from(value: EntityId) -> Self {
        match value.text.parse::<i64>() {
            Ok(raw) if value.numeric => WireId::Int(raw),
            _ => WireId::Text(value.text),
        }
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Shift name within a day. Labels are lowercased; `off` is folded into the
/// `unassigned` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ShiftLabel(String);

impl ShiftLabel {
    pub const UNASSIGNED: &'static str = "unassigned";

    pub fn new(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized == "off" {
            return Self::unassigned();
        }
        Self(normalized)
    }

    pub fn unassigned() -> Self {
        Self(Self::UNASSIGNED.to_string())
    }

    pub fn is_unassigned(&self) -> bool {
        self.0 == Self::UNASSIGNED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ShiftLabel {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<ShiftLabel> for String {
    fn from(value: ShiftLabel) -> Self {
        value.0
    }
}

impl fmt::Display for ShiftLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One grid cell: a day plus a shift on that day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerKey {
    pub date: NaiveDate,
    pub shift: ShiftLabel,
}

impl ContainerKey {
    pub fn new(date: NaiveDate, shift: ShiftLabel) -> Self {
        Self { date, shift }
    }

    pub fn unassigned(date: NaiveDate) -> Self {
        Self {
            date,
            shift: ShiftLabel::unassigned(),
        }
    }

    pub fn is_assignable(&self) -> bool {
        !self.shift.is_unassigned()
    }

    /// Parses `YYYY-MM-DD:shift`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (date, shift) = raw.split_once(':')?;
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
        let shift = shift.trim();
        if shift.is_empty() {
            return None;
        }
        Some(Self::new(date, ShiftLabel::new(shift)))
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.date.format("%Y-%m-%d"), self.shift)
    }
}
