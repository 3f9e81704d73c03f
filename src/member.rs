use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a process participating in a cluster namespace.
pub type MemberId = String;

/// Reserved key holding the id of the current leader.
///
/// Never reported as a member.
pub const LEADER_KEY: &str = "__leader";

/// Value written to a membership entry while its owner leads.
pub(crate) const LEADER_FLAG: &str = "true";
/// Value written to a membership entry while its owner follows.
pub(crate) const FOLLOWER_FLAG: &str = "false";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadershipRole {
    Stopped,
    Follower,
    Leader,
}

impl fmt::Display for LeadershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadershipRole::Stopped => write!(f, "stopped"),
            LeadershipRole::Follower => write!(f, "follower"),
            LeadershipRole::Leader => write!(f, "leader"),
        }
    }
}

/// One process in a named cluster.
///
/// A `Member` is immutable: a change in leadership produces a new value
/// rather than flipping a flag on a shared one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    id: MemberId,
    leader: bool,
}

impl Member {
    /// Creates a member that does not (yet) hold leadership.
    pub fn new(id: impl Into<MemberId>) -> Self {
        Self {
            id: id.into(),
            leader: false,
        }
    }

    /// Creates a member believed to hold leadership.
    pub fn leader(id: impl Into<MemberId>) -> Self {
        Self {
            id: id.into(),
            leader: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Returns a copy of this member with the given leadership flag.
    pub fn with_leadership(&self, leader: bool) -> Self {
        Self {
            id: self.id.clone(),
            leader,
        }
    }

    /// Value advertised in this member's membership entry.
    pub(crate) fn membership_flag(&self) -> &'static str {
        if self.leader {
            LEADER_FLAG
        } else {
            FOLLOWER_FLAG
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.leader {
            write!(f, "{} (leader)", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}
