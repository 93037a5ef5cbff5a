//! Build script for proto compilation.
//!
//! Two protocols are compiled into `OUT_DIR`:
//!
//! - `proto/provider.proto`: the Hemmer provider protocol this binary serves.
//! - `proto/resources.proto`: the Multy resource service this provider calls.
//!   Only the message types are generated; calls go through
//!   [`multy_provider::client::Transport`].
//!
//! `protoc` comes from `PROTOC` when set, otherwise from the vendored binary.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    tonic_prost_build::configure()
        .build_server(false)
        .build_client(false)
        .compile_protos(&["proto/resources.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/provider.proto");
    println!("cargo:rerun-if-changed=proto/resources.proto");

    Ok(())
}
