//! The five data categories tracked independently for extraction and watermarking.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Repositories,
    Commits,
    PullRequests,
    Reviews,
    Languages,
}

impl EntityType {
    /// Every entity type, in extraction order: the listing first, then the
    /// per-repository steps.
    pub const ALL: [EntityType; 5] = [
        EntityType::Repositories,
        EntityType::Commits,
        EntityType::PullRequests,
        EntityType::Reviews,
        EntityType::Languages,
    ];

    /// Key used in result records and the watermark table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Repositories => "repositories",
            EntityType::Commits => "commits",
            EntityType::PullRequests => "pull_requests",
            EntityType::Reviews => "reviews",
            EntityType::Languages => "languages",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("Unknown entity type: {}", s))
    }
}
