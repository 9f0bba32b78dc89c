use std::env;

fn main() {
    // Host builds of the library need no linker setup
    if env::var_os("CARGO_FEATURE_FIRMWARE").is_none() {
        return;
    }

    // Tell the linker where to find memory.x
    println!("cargo:rustc-link-search={}", env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Only re-run the build script when memory.x is changed
    println!("cargo:rerun-if-changed=memory.x");
}
