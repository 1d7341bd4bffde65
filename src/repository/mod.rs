//! Turning one remote repository into a [`RepositorySnapshot`].
//!
//! The [`SnapshotBuilder`] mirrors a repository into the cache root, classifies its activity from
//! the most recent commits, picks the refs worth documenting, and walks each checked-out ref for
//! packages using a [`DocExtractor`].

mod builder;
mod extractor;
mod git;
mod id;
mod model;
mod packages;
mod readme;
mod refs;
mod skip_list;
mod status;

pub use builder::{BuildOutcome, BuilderOptions, SnapshotBuilder};
pub use extractor::{DocExtractor, ExtractOutcome, GoDocExtractor, SourceDirectory, SourceFile, is_go_source};
pub use git::Git;
pub use id::RepoId;
pub use model::{About, Declaration, Note, Package, Ref, RefType, RepositorySnapshot, Tickets};
pub use packages::{PackageTree, discover_packages};
pub use readme::{find_readme, readme_content_type};
pub use refs::{MAX_VERSION_TAGS, TagScheme, TagVersion, select_version_tags};
pub use skip_list::SkipList;
pub use status::{ActivityStatus, CommitInfo, ForkInfo, SAMPLED_COMMITS, classify};
