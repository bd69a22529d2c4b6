//! SeaORM entity definitions for the warehouse schema.

pub mod entity_type;
pub mod extraction_metadata;
pub mod prelude;
pub mod raw_commit;
pub mod raw_language;
pub mod raw_pull_request;
pub mod raw_repository;
pub mod raw_review;
