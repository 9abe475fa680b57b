// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::instance::InstanceType;

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Supervisor session identifier: `{project}-{PS|MS}-{6 lowercase hex}`.
    pub struct InstanceId;
}

define_id! {
    /// Subagent spawn identifier: `{epoch_ms}-{8 hex}`.
    pub struct AgentId;
}

/// Length of the random hex suffix in an instance id.
pub const INSTANCE_SUFFIX_LEN: usize = 6;

/// Take the first `n` lowercase-alphanumeric characters of a generated id,
/// zero-padded when the source is too short.
fn alnum_suffix(raw: &str, n: usize) -> String {
    let mut out: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(n)
        .collect();
    while out.len() < n {
        out.push('0');
    }
    out
}

impl InstanceId {
    /// Generate a fresh instance id for the given project and session type.
    pub fn generate(project: &str, instance_type: InstanceType, id_gen: &impl IdGen) -> Self {
        let suffix = alnum_suffix(&id_gen.next(), INSTANCE_SUFFIX_LEN);
        Self(format!("{}-{}-{}", project, instance_type.as_str(), suffix))
    }

    /// Whether a string is a well-formed instance id
    /// (`^[a-z0-9-]+-(PS|MS)-[a-z0-9]{6}$`).
    pub fn is_valid(s: &str) -> bool {
        let Some((head, suffix)) = s.rsplit_once('-') else {
            return false;
        };
        if suffix.len() != INSTANCE_SUFFIX_LEN
            || !suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return false;
        }
        let Some((project, ty)) = head.rsplit_once('-') else {
            return false;
        };
        if ty != "PS" && ty != "MS" {
            return false;
        }
        !project.is_empty()
            && project
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    /// The 6-hex random suffix of this id.
    pub fn suffix(&self) -> &str {
        self.0
            .rsplit_once('-')
            .map(|(_, s)| s)
            .unwrap_or(self.0.as_str())
    }
}

impl AgentId {
    /// Generate a fresh agent id stamped with the caller's epoch time.
    pub fn generate(epoch_ms: u64, id_gen: &impl IdGen) -> Self {
        let suffix = alnum_suffix(&id_gen.next(), 8);
        Self(format!("{epoch_ms}-{suffix}"))
    }
}

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// UUID-based ID generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential ID generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
