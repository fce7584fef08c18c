//! Output file naming.

use crate::catalog::FileType;

/// Replace the final extension of `original` with `target_sub_type`.
///
/// Only the base name is kept; directory components (either separator) are
/// dropped. The extension is everything after the last `.`, so a name
/// without one keeps its whole stem and `archive.tar.gz` becomes
/// `archive.tar.<target>`.
pub fn derive_output_name(original: &str, target_sub_type: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = match base.rfind('.') {
        Some(idx) => &base[..idx],
        None => base,
    };
    format!("{stem}.{target_sub_type}")
}

/// Subtype used in the output name.
///
/// Results converted *from* an `application` source are always named
/// `.zip`, whatever the requested target.
pub fn output_sub_type(source_type: FileType, target_sub_type: &str) -> &str {
    if source_type == FileType::Application {
        "zip"
    } else {
        target_sub_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_final_extension() {
        assert_eq!(derive_output_name("photo.jpg", "png"), "photo.png");
        assert_eq!(derive_output_name("a.b.c.png", "pdf"), "a.b.c.pdf");
        assert_eq!(derive_output_name("report.docx", "pdf"), "report.pdf");
    }

    #[test]
    fn name_without_extension_keeps_stem() {
        assert_eq!(derive_output_name("noext", "gif"), "noext.gif");
    }

    #[test]
    fn directories_are_stripped() {
        assert_eq!(derive_output_name("/srv/up/photo.jpg", "png"), "photo.png");
        assert_eq!(derive_output_name("..\\..\\evil.bmp", "png"), "evil.png");
        assert_eq!(derive_output_name("dir.v2/noext", "txt"), "noext.txt");
    }

    #[test]
    fn dotfile_loses_everything_after_dot() {
        assert_eq!(derive_output_name(".hidden", "txt"), ".txt");
    }

    #[test]
    fn application_sources_are_named_zip() {
        assert_eq!(output_sub_type(FileType::Application, "png"), "zip");
        assert_eq!(output_sub_type(FileType::Application, "txt"), "zip");
        assert_eq!(output_sub_type(FileType::Image, "pdf"), "pdf");
        assert_eq!(
            derive_output_name("deck.pdf", output_sub_type(FileType::Application, "png")),
            "deck.zip"
        );
    }
}
