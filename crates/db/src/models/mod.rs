pub mod version_snapshot;
