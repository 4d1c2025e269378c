use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Fixed weekday columns of the habit grid, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.label() == s)
    }

    pub fn from_weekday(weekday: chrono::Weekday) -> Self {
        Self::ALL[weekday.num_days_from_monday() as usize]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A tracked hobby under `hobbies/{uid}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hobby {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "days_from_value")]
    pub days: BTreeMap<Day, bool>,
}

impl Hobby {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            days: BTreeMap::new(),
        }
    }

    /// A day that was never toggled reads as not done.
    pub fn is_done(&self, day: Day) -> bool {
        self.days.get(&day).copied().unwrap_or(false)
    }

    pub fn done_count(&self) -> usize {
        Day::ALL.iter().filter(|d| self.is_done(**d)).count()
    }
}

/// Keep known day labels with boolean values; anything else is dropped.
fn days_from_value<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<Day, bool>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    let mut days = BTreeMap::new();
    if let Some(Value::Object(map)) = raw {
        for (key, value) in map {
            match (Day::from_label(&key), value.as_bool()) {
                (Some(day), Some(done)) => {
                    days.insert(day, done);
                }
                _ => log::debug!("Ignoring hobby day cell {}={}", key, value),
            }
        }
    }
    Ok(days)
}
