pub mod artifact;
pub mod artifact_trash;
pub mod blob;
pub mod project;

pub use artifact::ArtifactRepository;
pub use artifact_trash::ArtifactTrashRepository;
pub use blob::{BlobListQuery, BlobRepository};
pub use project::ProjectRepository;
