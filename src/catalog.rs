//! The format catalog: every known file type, its subtypes, their display
//! labels and the subtypes each one may be converted to.
//!
//! The catalog is the single source of truth for "which subtype belongs to
//! which type". It is built once on first access ([`catalog()`]) and never
//! mutated afterwards, so concurrent readers need no synchronisation.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Top-level format category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Document,
    Application,
    Text,
    Audio,
    Video,
}

impl FileType {
    pub const ALL: [FileType; 6] = [
        FileType::Image,
        FileType::Document,
        FileType::Application,
        FileType::Text,
        FileType::Audio,
        FileType::Video,
    ];

    /// The MIME top-level name (`image`, `application`, …).
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Document => "document",
            FileType::Application => "application",
            FileType::Text => "text",
            FileType::Audio => "audio",
            FileType::Video => "video",
        }
    }

    /// Canonical display label passed to converters as the target type label.
    pub fn label(self) -> &'static str {
        match self {
            FileType::Image => "Image",
            FileType::Document => "Document",
            FileType::Application => "Application",
            FileType::Text => "Text",
            FileType::Audio => "Audio",
            FileType::Video => "Video",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// One catalog row.
#[derive(Debug, Clone, Copy)]
pub struct FormatEntry {
    pub sub_type: &'static str,
    pub file_type: FileType,
    pub label: &'static str,
    pub targets: &'static [&'static str],
}

const RASTER_TARGETS_FROM_PNG: &[&str] = &["jpeg", "gif", "webp", "bmp", "tiff", "pdf"];
const RASTER_TARGETS_FROM_JPEG: &[&str] = &["png", "gif", "webp", "bmp", "tiff", "pdf"];
const RASTER_TARGETS_FROM_GIF: &[&str] = &["png", "jpeg", "webp", "bmp", "tiff", "pdf"];
const RASTER_TARGETS_FROM_WEBP: &[&str] = &["png", "jpeg", "gif", "bmp", "tiff", "pdf"];
const RASTER_TARGETS_FROM_BMP: &[&str] = &["png", "jpeg", "gif", "webp", "tiff", "pdf"];
const RASTER_TARGETS_FROM_TIFF: &[&str] = &["png", "jpeg", "gif", "webp", "bmp", "pdf"];

static ENTRIES: &[FormatEntry] = &[
    FormatEntry {
        sub_type: "png",
        file_type: FileType::Image,
        label: "PNG",
        targets: RASTER_TARGETS_FROM_PNG,
    },
    FormatEntry {
        sub_type: "jpeg",
        file_type: FileType::Image,
        label: "JPEG",
        targets: RASTER_TARGETS_FROM_JPEG,
    },
    FormatEntry {
        sub_type: "gif",
        file_type: FileType::Image,
        label: "GIF",
        targets: RASTER_TARGETS_FROM_GIF,
    },
    FormatEntry {
        sub_type: "webp",
        file_type: FileType::Image,
        label: "WebP",
        targets: RASTER_TARGETS_FROM_WEBP,
    },
    FormatEntry {
        sub_type: "bmp",
        file_type: FileType::Image,
        label: "BMP",
        targets: RASTER_TARGETS_FROM_BMP,
    },
    FormatEntry {
        sub_type: "tiff",
        file_type: FileType::Image,
        label: "TIFF",
        targets: RASTER_TARGETS_FROM_TIFF,
    },
    FormatEntry {
        sub_type: "pdf",
        file_type: FileType::Application,
        label: "PDF",
        targets: &["png", "jpeg", "gif", "webp", "bmp", "tiff", "docx", "txt"],
    },
    FormatEntry {
        sub_type: "docx",
        file_type: FileType::Document,
        label: "Word (DOCX)",
        targets: &["pdf", "txt"],
    },
    FormatEntry {
        sub_type: "txt",
        file_type: FileType::Text,
        label: "Plain text",
        targets: &["pdf", "docx"],
    },
];

/// Process-wide, read-only registry of formats.
#[derive(Debug)]
pub struct FormatCatalog {
    by_sub_type: HashMap<&'static str, FormatEntry>,
    by_file_type: BTreeMap<FileType, BTreeMap<&'static str, &'static str>>,
}

static CATALOG: Lazy<FormatCatalog> = Lazy::new(|| FormatCatalog::from_entries(ENTRIES));

/// The process-wide catalog.
pub fn catalog() -> &'static FormatCatalog {
    &CATALOG
}

impl FormatCatalog {
    fn from_entries(entries: &'static [FormatEntry]) -> Self {
        let mut by_sub_type = HashMap::with_capacity(entries.len());
        let mut by_file_type: BTreeMap<FileType, BTreeMap<&'static str, &'static str>> =
            BTreeMap::new();
        for entry in entries {
            by_sub_type.insert(entry.sub_type, *entry);
            by_file_type
                .entry(entry.file_type)
                .or_default()
                .insert(entry.sub_type, entry.label);
        }
        Self {
            by_sub_type,
            by_file_type,
        }
    }

    /// `true` when at least one subtype is registered under `file_type`.
    pub fn has_file_type(&self, file_type: FileType) -> bool {
        self.by_file_type.contains_key(&file_type)
    }

    /// File types that have converters, in a stable order.
    pub fn file_types(&self) -> impl Iterator<Item = FileType> + '_ {
        self.by_file_type.keys().copied()
    }

    /// Subtypes of `file_type` with their display labels.
    pub fn sub_types(&self, file_type: FileType) -> BTreeMap<&'static str, &'static str> {
        self.by_file_type
            .get(&file_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn entry(&self, sub_type: &str) -> Option<&FormatEntry> {
        self.by_sub_type.get(sub_type)
    }

    /// The file type owning `sub_type`, if catalogued.
    pub fn file_type_of(&self, sub_type: &str) -> Option<FileType> {
        self.entry(sub_type).map(|e| e.file_type)
    }

    /// `true` when `sub_type` is registered under exactly `file_type`.
    pub fn contains(&self, file_type: FileType, sub_type: &str) -> bool {
        self.file_type_of(sub_type) == Some(file_type)
    }

    /// Legal targets of `sub_type` mapped to their display labels.
    pub fn targets_of(&self, sub_type: &str) -> BTreeMap<&'static str, &'static str> {
        let Some(entry) = self.entry(sub_type) else {
            return BTreeMap::new();
        };
        entry
            .targets
            .iter()
            .filter_map(|t| self.entry(t).map(|target| (target.sub_type, target.label)))
            .collect()
    }

    /// `true` when `from → to` is a catalogued conversion.
    pub fn can_convert(&self, from: &str, to: &str) -> bool {
        self.entry(from)
            .map(|e| e.targets.contains(&to))
            .unwrap_or(false)
    }

    /// Every subtype mapped to its owning file type.
    pub fn supported_file_types(&self) -> BTreeMap<&'static str, FileType> {
        self.by_sub_type
            .values()
            .map(|e| (e.sub_type, e.file_type))
            .collect()
    }

    /// Every catalogued `(source, target)` pair.
    pub fn pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs: Vec<_> = self
            .by_sub_type
            .values()
            .flat_map(|e| e.targets.iter().map(move |t| (e.sub_type, *t)))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}
