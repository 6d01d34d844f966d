//! Meal type tags used to filter presets by time of day

use std::fmt;
use std::str::FromStr;

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Category tag on a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    /// Offered at any time of day
    #[default]
    All,
    Lunch,
    Dinner,
}

impl MealType {
    /// 06:00 to 14:59 is lunch, everything else is dinner
    pub fn for_hour(hour: u32) -> Self {
        if (6..15).contains(&hour) {
            MealType::Lunch
        } else {
            MealType::Dinner
        }
    }

    /// Meal type for the current local time
    pub fn detect() -> Self {
        Self::for_hour(Local::now().hour())
    }

    /// Whether a preset tagged `self` should be offered under `filter`
    pub fn matches(self, filter: MealType) -> bool {
        self == MealType::All || filter == MealType::All || self == filter
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::All => "all",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(MealType::All),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            other => Err(Error::InvalidInput(format!("unknown meal type '{}'", other))),
        }
    }
}
