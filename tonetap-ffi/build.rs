// Build script that tries to generate a C header with `cbindgen`.
// If `cbindgen` is not available, it falls back to copying the
// checked-in `include/tonetap.h` to $OUT_DIR.
//
// Either way, consumers can include the header from:
//   - <repo>/tonetap-ffi/include/tonetap.h      (checked-in)
//   - $OUT_DIR/tonetap.h

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/tonetap.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let header_path_repo = crate_dir.join("include").join("tonetap.h");
    let header_path_out = out_dir.join("tonetap.h");

    let cbindgen_ok = Command::new("cbindgen")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    if cbindgen_ok {
        // Only OUT_DIR is written; the checked-in header is maintained by hand.
        let status = Command::new("cbindgen")
            .args(["--crate", "tonetap-ffi", "--lang", "C", "--output"])
            .arg(&header_path_out)
            .current_dir(&crate_dir)
            .status();
        match status {
            Ok(s) if s.success() => return,
            _ => println!("cargo:warning=tonetap-ffi: cbindgen failed; falling back to checked-in header"),
        }
    }

    fs::copy(&header_path_repo, &header_path_out).expect("failed to copy include/tonetap.h to OUT_DIR");
}
