use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::TagId;

/// Palette slot a tag is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKey {
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    #[default]
    Blue,
    Purple,
    Pink,
    Gray,
}

impl ColorKey {
    pub const ALL: [ColorKey; 9] = [
        ColorKey::Red,
        ColorKey::Orange,
        ColorKey::Yellow,
        ColorKey::Green,
        ColorKey::Teal,
        ColorKey::Blue,
        ColorKey::Purple,
        ColorKey::Pink,
        ColorKey::Gray,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColorKey::Red => "red",
            ColorKey::Orange => "orange",
            ColorKey::Yellow => "yellow",
            ColorKey::Green => "green",
            ColorKey::Teal => "teal",
            ColorKey::Blue => "blue",
            ColorKey::Purple => "purple",
            ColorKey::Pink => "pink",
            ColorKey::Gray => "gray",
        }
    }

    /// Parse a palette name (case-insensitive)
    pub fn parse_key(s: &str) -> Option<ColorKey> {
        let lower = s.to_ascii_lowercase();
        ColorKey::ALL.into_iter().find(|c| c.as_str() == lower)
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A label that can be attached to any number of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub phrase: String,
    pub color: ColorKey,
    pub creation_date: DateTime<Utc>,
    pub display_order: i64,
}

impl Tag {
    pub fn new(phrase: impl Into<String>, color: ColorKey, display_order: i64) -> Self {
        Tag {
            id: TagId::new(),
            phrase: phrase.into(),
            color,
            creation_date: Utc::now(),
            display_order,
        }
    }
}
