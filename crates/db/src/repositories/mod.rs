pub mod version_snapshot_repo;

pub use version_snapshot_repo::VersionSnapshotRepo;
