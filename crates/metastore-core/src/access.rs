//! Scoped access levels around storage I/O
//!
//! Host code may run callers under a reduced access level ([`restricted`]). Storage calls still
//! need the network or the in-process engine, so backends wrap each such call in [`elevated`]
//! (or [`elevated_sync`] on blocking threads). The previous level is restored when the scope
//! ends, whether the call returns, fails or is dropped mid-flight. I/O edges call [`check`].

use std::fmt;
use std::future::Future;

use crate::error::{DataObjectError, Result};

/// Access level of the running task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    /// No restriction in effect
    #[default]
    Unrestricted,
    /// Storage I/O refused unless elevated
    Restricted,
    /// Inside a privileged storage call
    Elevated,
}

/// Resource guarded by [`check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Network,
    NativeEngine,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Network => write!(f, "network"),
            Capability::NativeEngine => write!(f, "native engine"),
        }
    }
}

tokio::task_local! {
    static ACCESS_LEVEL: AccessLevel;
}

/// Level in effect for the current task or thread
pub fn current() -> AccessLevel {
    ACCESS_LEVEL.try_with(|level| *level).unwrap_or_default()
}

/// Run `fut` with storage I/O refused unless elevated
pub async fn restricted<F: Future>(fut: F) -> F::Output {
    ACCESS_LEVEL.scope(AccessLevel::Restricted, fut).await
}

/// Run `fut` inside a privileged scope
pub async fn elevated<F: Future>(fut: F) -> F::Output {
    ACCESS_LEVEL.scope(AccessLevel::Elevated, fut).await
}

/// Run a blocking closure inside a privileged scope
pub fn elevated_sync<R>(f: impl FnOnce() -> R) -> R {
    ACCESS_LEVEL.sync_scope(AccessLevel::Elevated, f)
}

/// Run `fut` at an explicit level. Used to carry the caller's level into spawned tasks,
/// which do not inherit task-locals.
pub async fn with_level<F: Future>(level: AccessLevel, fut: F) -> F::Output {
    ACCESS_LEVEL.scope(level, fut).await
}

/// Enforcement point for storage I/O
pub fn check(capability: Capability) -> Result<()> {
    match current() {
        AccessLevel::Restricted => Err(DataObjectError::PermissionDenied(format!(
            "{} access requires a privileged scope",
            capability
        ))),
        AccessLevel::Unrestricted | AccessLevel::Elevated => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_is_unrestricted() {
        assert_eq!(current(), AccessLevel::Unrestricted);
        assert!(check(Capability::Network).is_ok());
    }

    #[tokio::test]
    async fn test_restricted_denies_until_elevated() {
        restricted(async {
            let err = check(Capability::Network).unwrap_err();
            assert!(matches!(err, DataObjectError::PermissionDenied(_)));

            elevated(async {
                assert_eq!(current(), AccessLevel::Elevated);
                assert!(check(Capability::Network).is_ok());
            })
            .await;

            // restored after the scope
            assert_eq!(current(), AccessLevel::Restricted);
        })
        .await;
    }

    #[tokio::test]
    async fn test_level_restored_after_failure() {
        restricted(async {
            let result: Result<()> = elevated(async {
                Err(DataObjectError::BackendUnavailable("boom".to_string()))
            })
            .await;
            assert!(result.is_err());
            assert_eq!(current(), AccessLevel::Restricted);
        })
        .await;
    }

    #[test]
    fn test_sync_scope() {
        let level = elevated_sync(current);
        assert_eq!(level, AccessLevel::Elevated);
        assert_eq!(current(), AccessLevel::Unrestricted);
    }
}
