//! Protocol types generated from `proto/` at build time.

/// The Hemmer provider protocol served by this binary.
pub mod provider {
    tonic::include_proto!("hemmer.provider.v1");
}

/// Messages of the Multy resource service.
pub mod resources {
    tonic::include_proto!("dev.multy.resources.v1");
}
