//! Closed status enumerations stored as text columns.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use super::DatabaseError;

macro_rules! text_status {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
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
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(DatabaseError::UnknownStatus {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: DatabaseError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_status!(JobStatus, "job", {
    Created => "created",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

text_status!(PageStatus, "page", {
    Pending => "pending",
    Running => "running",
    Done => "done",
    Failed => "failed",
    IncompatibleSize => "incompatible_size",
    Missing => "missing",
});

text_status!(TextStatus, "text", {
    Pending => "pending",
    Running => "running",
    Done => "done",
    Missing => "missing",
    Failed => "failed",
});

text_status!(TaskStatus, "task", {
    Queued => "queued",
    Claimed => "claimed",
    Done => "done",
    Failed => "failed",
    Revoked => "revoked",
});

impl PageStatus {
    /// Pending or running: the page still owes a terminal write.
    pub fn is_unfinished(self) -> bool {
        match self {
            PageStatus::Pending | PageStatus::Running => true,
            PageStatus::Done
            | PageStatus::Failed
            | PageStatus::IncompatibleSize
            | PageStatus::Missing => false,
        }
    }
}
