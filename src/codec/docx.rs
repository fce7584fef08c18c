//! Word (OOXML) packages.
//!
//! Only the paragraph text of `word/document.xml` is read; styles, tables and
//! images are ignored. Written packages are the smallest set of parts Word
//! and LibreOffice accept: content types, package relationships and the
//! main document.

use super::{check_target, pdf, text, CodecRuntime, FormatConverter};
use crate::error::MorphError;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::sync::Arc;

const DOCUMENT_PART: &str = "word/document.xml";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_TAIL: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1134" w:header="709" w:footer="709" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

/// The raw main document part of a package.
pub fn document_xml(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a zip package: {e}"))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| format!("{DOCUMENT_PART}: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("{DOCUMENT_PART}: {e}"))?;
    Ok(xml)
}

/// Read the text of every `<w:p>` in document order.
///
/// `<w:tab/>` becomes a tab and `<w:br/>` a newline inside the paragraph.
pub fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    let xml = document_xml(bytes)?;
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => current.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(String::new()),
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| format!("{DOCUMENT_PART}: {e}"))?;
                current.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "{DOCUMENT_PART} at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
        }
    }

    Ok(paragraphs)
}

/// XML 1.0 `Char`: tab, newline, carriage return and everything from
/// U+0020 except the two non-characters U+FFFE and U+FFFF.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

/// Build a `.docx` package with one paragraph per entry.
///
/// Tabs become `<w:tab/>`; characters XML 1.0 cannot carry are dropped.
pub fn write_docx(paragraphs: &[String]) -> Result<Vec<u8>, String> {
    let mut body = String::from(DOCUMENT_HEAD);
    for paragraph in paragraphs {
        let paragraph: String = paragraph.chars().filter(|c| is_xml_char(*c)).collect();
        if paragraph.is_empty() {
            body.push_str("<w:p/>");
            continue;
        }
        body.push_str("<w:p><w:r>");
        for (idx, segment) in paragraph.split('\t').enumerate() {
            if idx > 0 {
                body.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                body.push_str(r#"<w:t xml:space="preserve">"#);
                body.push_str(&escape(segment));
                body.push_str("</w:t>");
            }
        }
        body.push_str("</w:r></w:p>");
    }
    body.push_str(DOCUMENT_TAIL);

    let parts = vec![
        ("[Content_Types].xml".to_string(), CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels".to_string(), PACKAGE_RELS.as_bytes().to_vec()),
        (DOCUMENT_PART.to_string(), body.into_bytes()),
    ];
    super::archive::zip_entries(&parts).map_err(|e| e.to_string())
}

/// Converter for Word documents.
pub struct DocxConverter {
    runtime: Arc<CodecRuntime>,
}

impl DocxConverter {
    pub fn new(runtime: Arc<CodecRuntime>) -> Self {
        Self { runtime }
    }
}

impl FormatConverter for DocxConverter {
    fn sub_type(&self) -> &'static str {
        "docx"
    }

    fn convert_to(
        &self,
        target_type_label: &str,
        target_sub_type: &str,
        source: &[u8],
    ) -> Result<Vec<u8>, MorphError> {
        check_target("docx", target_type_label, target_sub_type)?;
        let paragraphs = read_paragraphs(source)
            .map_err(|e| MorphError::conversion("docx", target_sub_type, e))?;

        let result = match target_sub_type {
            "pdf" => {
                let pdfium = self.runtime.pdfium("docx", "pdf")?;
                // A docx paragraph may hold soft breaks; lay each out as its own line.
                let lines: Vec<String> = paragraphs
                    .iter()
                    .flat_map(|p| text::paragraphs(p))
                    .collect();
                pdf::text_to_pdf(pdfium, &lines, self.runtime.config())
            }
            "txt" => {
                let mut out = paragraphs.join("\n");
                out.push('\n');
                Ok(out.into_bytes())
            }
            other => Err(format!("no codec writes '{other}' from a Word document")),
        };
        result.map_err(|e| MorphError::conversion("docx", target_sub_type, e))
    }
}
