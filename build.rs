use std::error::Error;
use vergen::{BuildBuilder, Emitter};

fn main() -> Result<(), Box<dyn Error>> {
    // Bump whenever stored signatures or word terms change shape
    println!("cargo:rustc-env=IMGMATCH_SIGNATURE_VERSION=1");

    let build = BuildBuilder::default().build_timestamp(true).build()?;

    Emitter::default().add_instructions(&build)?.emit()?;

    Ok(())
}
