// Embeds the pdfium library named by PDFIUM_BUNDLE_LIB when the `bundled`
// feature is on. Without the feature the script does nothing.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=PDFIUM_BUNDLE_LIB");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_BUNDLED");

    if std::env::var_os("CARGO_FEATURE_BUNDLED").is_none() {
        return;
    }

    let lib_src = match std::env::var("PDFIUM_BUNDLE_LIB") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => panic!(
            "pdfium-auto: the `bundled` feature needs PDFIUM_BUNDLE_LIB set to the platform \
             pdfium library (libpdfium.so / libpdfium.dylib / pdfium.dll). Prebuilt copies: \
             https://github.com/bblanchon/pdfium-binaries/releases"
        ),
    };
    if !lib_src.is_file() {
        panic!(
            "pdfium-auto: PDFIUM_BUNDLE_LIB does not name a file: {}",
            lib_src.display()
        );
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let lib_dest = out_dir.join("bundled_pdfium_lib");
    std::fs::copy(&lib_src, &lib_dest).unwrap_or_else(|e| {
        panic!(
            "pdfium-auto: cannot copy {} to {}: {e}",
            lib_src.display(),
            lib_dest.display()
        )
    });

    // `include_bytes!` needs a literal path, hence the generated module.
    let generated = out_dir.join("bundled.rs");
    std::fs::write(
        &generated,
        "/// The pdfium library embedded at compile time.\n\
         pub static PDFIUM_BYTES: &[u8] = include_bytes!(\"bundled_pdfium_lib\");\n",
    )
    .unwrap_or_else(|e| panic!("pdfium-auto: cannot write {}: {e}", generated.display()));

    println!("cargo:rerun-if-changed={}", lib_src.display());
}
