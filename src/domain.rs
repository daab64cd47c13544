//! Enumerations stored as text columns, and their wire counterparts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use prost_types::Timestamp;
use proto::kanban;

use crate::errors::ServiceError;

macro_rules! text_enum {
    ($name:ident, $wire:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn from_wire(value: i32) -> Result<Self, ServiceError> {
                match kanban::$wire::try_from(value) {
                    $(Ok(kanban::$wire::$variant) => Ok($name::$variant),)+
                    Err(_) => Err(ServiceError::BadRequest(format!("unknown {} {}", $label, value))),
                }
            }

            pub fn to_wire(self) -> i32 {
                match self {
                    $($name::$variant => kanban::$wire::$variant as i32),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ServiceError;

            fn from_str(text: &str) -> Result<Self, Self::Err> {
                match text {
                    $($text => Ok($name::$variant),)+
                    other => Err(ServiceError::BadRequest(format!("unknown {} {}", $label, other))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(ColumnCategory, ColumnCategory, "column category", {
    Todo => "todo",
    InProgress => "in_progress",
    Done => "done",
});

text_enum!(IssueType, IssueType, "issue type", {
    Epic => "epic",
    Story => "story",
    Task => "task",
    Bug => "bug",
    Subtask => "subtask",
});

text_enum!(Priority, Priority, "priority", {
    Lowest => "lowest",
    Low => "low",
    Medium => "medium",
    High => "high",
    Highest => "highest",
});

text_enum!(LinkKind, GithubLinkKind, "link kind", {
    Branch => "branch",
    PullRequest => "pull_request",
    Commit => "commit",
});

/// Parses a stored enum value, falling back to `fallback` for rows written
/// by an older schema.
pub fn parse_or<T: FromStr>(text: &str, fallback: T) -> T {
    text.parse().unwrap_or(fallback)
}

pub fn to_timestamp(value: NaiveDateTime) -> Timestamp {
    let value = value.and_utc();
    Timestamp {
        seconds: value.timestamp(),
        nanos: value.timestamp_subsec_nanos() as i32,
    }
}

pub fn from_timestamp(value: &Timestamp) -> Result<NaiveDateTime, ServiceError> {
    u32::try_from(value.nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(value.seconds, nanos))
        .map(|value| value.naive_utc())
        .ok_or_else(|| ServiceError::bad_request("invalid timestamp"))
}

pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7 && color.starts_with('#') && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Project keys prefix issue keys (`KEY-12`), so they stay within `[A-Z]`.
pub fn is_project_key(key: &str) -> bool {
    (2..=10).contains(&key.len()) && key.chars().all(|c| c.is_ascii_uppercase())
}
