//! Meridian Region Server binary entry point.
//!
//! The binary is a thin wrapper around [`lib_meridian::init`], which owns
//! argument parsing, configuration loading and the server lifecycle.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_meridian::init().await
}
