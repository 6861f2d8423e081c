use serde::{Deserialize, Serialize};

/// Commit counts of a local branch relative to its tracking branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AheadBehind {
    pub ahead: usize,
    pub behind: usize,
    pub tracking: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Equal,
    Ahead(usize),
    Behind(usize),
    Diverged(usize),
    NoTracking,
}

impl SyncStatus {
    pub fn classify(counts: Option<&AheadBehind>) -> Self {
        match counts {
            None => SyncStatus::NoTracking,
            Some(AheadBehind { ahead: 0, behind: 0, .. }) => SyncStatus::Equal,
            Some(AheadBehind { ahead, behind: 0, .. }) => SyncStatus::Ahead(*ahead),
            Some(AheadBehind { ahead: 0, behind, .. }) => SyncStatus::Behind(*behind),
            Some(AheadBehind { ahead, behind, .. }) => SyncStatus::Diverged(ahead + behind),
        }
    }

    pub fn label(&self) -> String {
        match self {
            SyncStatus::Equal => "equal to".to_string(),
            SyncStatus::Ahead(n) => format!("ahead of ({n} commit(s))"),
            SyncStatus::Behind(n) => format!("behind ({n} commit(s))"),
            SyncStatus::Diverged(n) => format!("diverged from ({n} commit(s))"),
            SyncStatus::NoTracking => "not tracking".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncVerdict {
    Proceed,
    Note(String),
    Reject(String),
}

/// Decide whether a finish may continue given the branch's sync status.
pub fn gate(branch: &str, status: &SyncStatus, force: bool, continuing: bool) -> SyncVerdict {
    match status {
        SyncStatus::Equal | SyncStatus::NoTracking => SyncVerdict::Proceed,
        SyncStatus::Ahead(n) => SyncVerdict::Note(format!(
            "`{branch}` has {n} local commit(s) not yet pushed"
        )),
        SyncStatus::Behind(_) | SyncStatus::Diverged(_) if force || continuing => {
            SyncVerdict::Note(format!(
                "`{branch}` is {} its remote; continuing anyway",
                status.label()
            ))
        }
        SyncStatus::Behind(_) | SyncStatus::Diverged(_) => SyncVerdict::Reject(
            "integrate the remote changes first (`update`/`pull`) or pass --force".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(ahead: usize, behind: usize) -> AheadBehind {
        AheadBehind {
            ahead,
            behind,
            tracking: "origin/feature/x".to_string(),
        }
    }

    #[test]
    fn classification_matches_counts() {
        assert_eq!(SyncStatus::classify(None), SyncStatus::NoTracking);
        assert_eq!(SyncStatus::classify(Some(&counts(0, 0))), SyncStatus::Equal);
        assert_eq!(SyncStatus::classify(Some(&counts(2, 0))), SyncStatus::Ahead(2));
        assert_eq!(SyncStatus::classify(Some(&counts(0, 3))), SyncStatus::Behind(3));
        assert_eq!(
            SyncStatus::classify(Some(&counts(1, 4))),
            SyncStatus::Diverged(5)
        );
    }

    #[test]
    fn behind_and_diverged_are_rejected_without_force() {
        for status in [SyncStatus::Behind(1), SyncStatus::Diverged(2)] {
            assert!(matches!(
                gate("feature/x", &status, false, false),
                SyncVerdict::Reject(_)
            ));
            assert!(matches!(
                gate("feature/x", &status, true, false),
                SyncVerdict::Note(_)
            ));
            assert!(matches!(
                gate("feature/x", &status, false, true),
                SyncVerdict::Note(_)
            ));
        }
    }

    #[test]
    fn ahead_notes_and_equal_proceeds() {
        assert!(matches!(
            gate("feature/x", &SyncStatus::Ahead(1), false, false),
            SyncVerdict::Note(_)
        ));
        assert_eq!(
            gate("feature/x", &SyncStatus::Equal, false, false),
            SyncVerdict::Proceed
        );
        assert_eq!(
            gate("feature/x", &SyncStatus::NoTracking, false, false),
            SyncVerdict::Proceed
        );
    }
}
