use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tab a todo belongs to. Stored as the `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoKind {
    Daily,
    Weekly,
    Monthly,
    Calendar,
}

impl TodoKind {
    pub const ALL: &'static [TodoKind] = &[
        TodoKind::Daily,
        TodoKind::Weekly,
        TodoKind::Monthly,
        TodoKind::Calendar,
    ];

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Calendar => "calendar",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }

    /// Days between repetitions for this kind, if it has a cadence at all.
    pub fn repeat_interval(&self) -> Option<u32> {
        match self {
            Self::Daily => Some(1),
            Self::Weekly => Some(7),
            Self::Monthly => Some(30),
            Self::Calendar => None,
        }
    }
}

impl fmt::Display for TodoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A task as stored under `todos/{uid}/{id}`.
///
/// `id` is the store key and is not part of the stored body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(skip)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TodoKind,
    #[serde(default)]
    pub repeating: bool,
    #[serde(default)]
    pub repeat_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
}

/// Input for a new todo, as collected by the tab forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub text: String,
    pub date: NaiveDate,
    pub kind: TodoKind,
    pub repeating: bool,
}

impl Todo {
    /// Build a fresh, uncompleted todo owned by `user_id`.
    ///
    /// The repeat interval always follows the kind; `repeating` only marks
    /// whether the user asked for it to be shown as recurring.
    pub fn from_draft(draft: &NewTodo, user_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            text: draft.text.trim().to_string(),
            completed: false,
            date: draft.date,
            kind: draft.kind,
            repeating: draft.repeating,
            repeat_interval: draft.kind.repeat_interval(),
            last_completed_date: None,
            user_id: user_id.into(),
        }
    }

    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.date == date
    }

    /// Human label for the recurrence, e.g. "every 7 day(s)".
    pub fn repeat_label(&self) -> Option<String> {
        if !self.repeating {
            return None;
        }
        self.repeat_interval
            .map(|days| format!("every {} day(s)", days))
    }

    /// Next date this todo would come around again, counted from its date.
    ///
    /// Display only: nothing moves the stored date.
    pub fn next_occurrence(&self, today: NaiveDate) -> Option<NaiveDate> {
        if !self.repeating {
            return None;
        }
        let step = i64::from(self.repeat_interval?);
        if step == 0 {
            return None;
        }
        let mut next = self.date;
        while next < today {
            next += Duration::days(step);
        }
        Some(next)
    }
}

/// Stored as `YYYY-MM-DD`.
mod date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        // Older records may carry a full timestamp; only the day matters.
        let day = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(day, FORMAT).map_err(serde::de::Error::custom)
    }
}
