pub mod artifacts;

pub use artifacts::ArtifactKind;
pub use artifacts::ArtifactStore;
