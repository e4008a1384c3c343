//! Variant - selects one of the dispatcher concurrency designs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dispatcher concurrency design
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// One lock over the per-key directory, delivery under the lock
    #[default]
    Locking,
    /// Fixed topology, per-key double buffering, delivery outside the lock
    Prebuilt,
    /// Global FIFO and consumer directory behind two independent locks
    SplitLock,
}

impl Variant {
    /// All variants, in declaration order
    pub const ALL: [Variant; 3] = [Variant::Locking, Variant::Prebuilt, Variant::SplitLock];

    /// Stable name used in config files, logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Locking => "locking",
            Variant::Prebuilt => "prebuilt",
            Variant::SplitLock => "split-lock",
        }
    }

    /// Whether the variant allows removing a binding
    pub fn supports_unsubscribe(&self) -> bool {
        !matches!(self, Variant::Prebuilt)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "locking" => Ok(Variant::Locking),
            "prebuilt" => Ok(Variant::Prebuilt),
            "split-lock" | "split_lock" | "splitlock" => Ok(Variant::SplitLock),
            other => Err(format!("unknown dispatcher variant: {other}")),
        }
    }
}
