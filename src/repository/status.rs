use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Head commits older than this mean a repository has no recent commits
const STALE_AFTER: TimeDelta = TimeDelta::days(2 * 365);

/// Window after creation within which a fork's commits count as a quick fork
const QUICK_FORK_WINDOW: TimeDelta = TimeDelta::days(7);

/// Number of commits, starting at the default branch head, that classification looks at
pub const SAMPLED_COMMITS: usize = 3;

/// Derived liveness classification of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActivityStatus {
    Active,

    /// A fork that was never pushed to after it was created
    DeadEndFork,

    /// A fork with a couple of commits clustered right after creation
    QuickFork,

    NoRecentCommits,

    /// Assigned downstream when import-graph data is combined with [`Self::NoRecentCommits`]; never produced here.
    Inactive,
}

/// A commit read from the default branch's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub when: DateTime<Utc>,
}

/// Fork metadata reported by the hosting platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkInfo {
    pub is_fork: bool,
    pub created: DateTime<Utc>,
    pub pushed: Option<DateTime<Utc>>,
}

/// Classify a repository from its newest commits and its fork metadata.
///
/// `commits` is the default branch head followed by its ancestors, newest first; only the first
/// [`SAMPLED_COMMITS`] entries are considered. An empty history counts as having no recent commits.
#[must_use]
pub fn classify(commits: &[CommitInfo], fork: &ForkInfo, now: DateTime<Utc>) -> ActivityStatus {
    let Some(head) = commits.first() else {
        return ActivityStatus::NoRecentCommits;
    };

    if now - head.when > STALE_AFTER {
        return ActivityStatus::NoRecentCommits;
    }

    if fork.is_fork {
        // A missing push time means the fork never received a push
        if fork.pushed.is_none_or(|pushed| pushed < fork.created) {
            return ActivityStatus::DeadEndFork;
        }

        if is_quick_fork(commits.iter().take(SAMPLED_COMMITS), fork.created, now) {
            return ActivityStatus::QuickFork;
        }
    }

    ActivityStatus::Active
}

fn is_quick_fork<'a>(sample: impl Iterator<Item = &'a CommitInfo>, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let window_end = created + QUICK_FORK_WINDOW;
    if window_end > now {
        return false;
    }

    let mut own_commits = 0;
    for commit in sample {
        if commit.when < created {
            break;
        }

        if commit.when > window_end {
            return false;
        }

        own_commits += 1;
    }

    own_commits < SAMPLED_COMMITS
}
