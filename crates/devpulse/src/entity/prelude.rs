//! Common re-exports for convenient entity usage.

pub use super::entity_type::EntityType;
pub use super::extraction_metadata::{
    ActiveModel as ExtractionMetadataActiveModel, Column as ExtractionMetadataColumn,
    Entity as ExtractionMetadata, Model as ExtractionMetadataModel,
};
pub use super::raw_commit::{
    ActiveModel as RawCommitActiveModel, Column as RawCommitColumn, Entity as RawCommit,
    Model as RawCommitModel,
};
pub use super::raw_language::{
    ActiveModel as RawLanguageActiveModel, Column as RawLanguageColumn, Entity as RawLanguage,
    Model as RawLanguageModel,
};
pub use super::raw_pull_request::{
    ActiveModel as RawPullRequestActiveModel, Column as RawPullRequestColumn,
    Entity as RawPullRequest, Model as RawPullRequestModel,
};
pub use super::raw_repository::{
    ActiveModel as RawRepositoryActiveModel, Column as RawRepositoryColumn,
    Entity as RawRepository, Model as RawRepositoryModel,
};
pub use super::raw_review::{
    ActiveModel as RawReviewActiveModel, Column as RawReviewColumn, Entity as RawReview,
    Model as RawReviewModel,
};
