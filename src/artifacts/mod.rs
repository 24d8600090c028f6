pub mod store;
pub mod fs_store;
pub mod sled_store;
pub mod factory;

pub use store::{ArtifactStore, InMemoryArtifactStore};
pub use fs_store::FsArtifactStore;
pub use sled_store::SledArtifactStore;
pub use factory::{create_artifact_store, create_in_memory_artifact_store};
