/// File kind detection for rule conditions and name patterns.
///
/// This module maps file extensions (and, when the extension tells us nothing,
/// sniffed MIME types) to broad kinds such as "Image" or "Document". The kind
/// is what the `Kind` condition attribute and the `{Kind}` token see.
///
/// # Examples
///
/// ```
/// use tidywatch::file_kind::{FileKind, KindMapper};
///
/// let mapper = KindMapper::default();
/// assert_eq!(mapper.mime_to_kind("image/png"), Some(FileKind::Image));
/// assert_eq!(mapper.extension_to_kind("MP3"), Some(FileKind::Audio));
/// assert_eq!(mapper.classify(None, Some("pdf")), FileKind::Document);
/// ```
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Represents a broad file kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// Image files (PNG, JPG, GIF, etc.)
    Image,
    /// Audio files (MP3, WAV, FLAC, etc.)
    Audio,
    /// Video files (MP4, MKV, AVI, etc.)
    Video,
    /// Document files (PDF, DOCX, TXT, etc.)
    Document,
    /// Archive files (ZIP, RAR, 7Z, etc.)
    Archive,
    /// Code/Source files (Rust, Python, JavaScript, etc.)
    Code,
    /// Spreadsheet files (XLSX, CSV, ODS, etc.)
    Spreadsheet,
    /// Presentation files (PPTX, ODP, etc.)
    Presentation,
    /// Font files (TTF, OTF, WOFF, etc.)
    Font,
    /// Unknown or uncategorized files
    Other,
}

impl FileKind {
    /// Returns the label used by conditions and the `{Kind}` token.
    ///
    /// ```
    /// use tidywatch::file_kind::FileKind;
    ///
    /// assert_eq!(FileKind::Image.label(), "Image");
    /// assert_eq!(FileKind::Other.label(), "Other");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Image => "Image",
            FileKind::Audio => "Audio",
            FileKind::Video => "Video",
            FileKind::Document => "Document",
            FileKind::Archive => "Archive",
            FileKind::Code => "Code",
            FileKind::Spreadsheet => "Spreadsheet",
            FileKind::Presentation => "Presentation",
            FileKind::Font => "Font",
            FileKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Maps MIME types and file extensions to kinds.
#[derive(Debug, Clone)]
pub struct KindMapper {
    mime_map: HashMap<String, FileKind>,
    extension_map: HashMap<String, FileKind>,
}

/// Extensions per kind. Also the seed for the default categories.
pub(crate) const KIND_EXTENSIONS: &[(FileKind, &[&str])] = &[
    (
        FileKind::Image,
        &[
            "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff", "tif", "ico", "heic", "raw",
        ],
    ),
    (
        FileKind::Audio,
        &["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma", "aiff"],
    ),
    (
        FileKind::Video,
        &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp", "m4v"],
    ),
    (
        FileKind::Document,
        &["pdf", "txt", "doc", "docx", "html", "htm", "md", "rtf", "odt", "epub"],
    ),
    (
        FileKind::Archive,
        &["zip", "rar", "7z", "tar", "gz", "bz2", "xz", "iso", "dmg"],
    ),
    (
        FileKind::Code,
        &[
            "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "rs", "go", "sh", "bash", "json",
            "xml", "yaml", "yml", "toml", "css",
        ],
    ),
    (FileKind::Spreadsheet, &["csv", "xls", "xlsx", "ods"]),
    (FileKind::Presentation, &["ppt", "pptx", "odp", "key"]),
    (FileKind::Font, &["ttf", "otf", "woff", "woff2"]),
];

impl KindMapper {
    /// Creates a new `KindMapper` with all standard mappings.
    pub fn new() -> Self {
        let mut mapper = Self {
            mime_map: HashMap::new(),
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        for (kind, extensions) in KIND_EXTENSIONS {
            for ext in *extensions {
                self.add_extension_mapping(ext, *kind);
            }
        }

        // Sniffed MIME prefixes cover most media; the rest are listed explicitly.
        for (mime, kind) in [
            ("application/pdf", FileKind::Document),
            ("application/rtf", FileKind::Document),
            ("application/msword", FileKind::Document),
            (
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                FileKind::Document,
            ),
            ("application/vnd.oasis.opendocument.text", FileKind::Document),
            ("application/epub+zip", FileKind::Document),
            ("application/zip", FileKind::Archive),
            ("application/vnd.rar", FileKind::Archive),
            ("application/x-rar-compressed", FileKind::Archive),
            ("application/x-7z-compressed", FileKind::Archive),
            ("application/x-tar", FileKind::Archive),
            ("application/gzip", FileKind::Archive),
            ("application/x-bzip2", FileKind::Archive),
            ("application/x-xz", FileKind::Archive),
            ("text/csv", FileKind::Spreadsheet),
            ("application/vnd.ms-excel", FileKind::Spreadsheet),
            (
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                FileKind::Spreadsheet,
            ),
            ("application/vnd.ms-powerpoint", FileKind::Presentation),
            (
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                FileKind::Presentation,
            ),
            ("font/ttf", FileKind::Font),
            ("font/otf", FileKind::Font),
            ("font/woff", FileKind::Font),
            ("font/woff2", FileKind::Font),
            ("application/x-font-ttf", FileKind::Font),
            ("application/wasm", FileKind::Code),
        ] {
            self.add_mime_mapping(mime, kind);
        }
    }

    /// Adds a MIME type to kind mapping.
    pub fn add_mime_mapping(&mut self, mime: &str, kind: FileKind) {
        self.mime_map.insert(mime.to_lowercase(), kind);
    }

    /// Adds a file extension to kind mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, kind: FileKind) {
        self.extension_map.insert(ext.to_lowercase(), kind);
    }

    /// Maps a MIME type to a kind, using the top-level type for media.
    pub fn mime_to_kind(&self, mime_type: &str) -> Option<FileKind> {
        let mime = mime_type.to_lowercase();
        if let Some(kind) = self.mime_map.get(&mime) {
            return Some(*kind);
        }
        match mime.split('/').next() {
            Some("image") => Some(FileKind::Image),
            Some("audio") => Some(FileKind::Audio),
            Some("video") => Some(FileKind::Video),
            Some("font") => Some(FileKind::Font),
            _ => None,
        }
    }

    /// Maps a file extension (with or without the leading dot) to a kind.
    pub fn extension_to_kind(&self, ext: &str) -> Option<FileKind> {
        let ext = ext.trim_start_matches('.');
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Determines the kind from an optional MIME type and/or extension.
    ///
    /// The extension wins because users name their files deliberately; the
    /// sniffed MIME type only helps when the extension is missing or unknown.
    pub fn classify(&self, mime_type: Option<&str>, ext: Option<&str>) -> FileKind {
        if let Some(extension) = ext
            && let Some(kind) = self.extension_to_kind(extension)
        {
            return kind;
        }

        if let Some(mime) = mime_type
            && let Some(kind) = self.mime_to_kind(mime)
        {
            return kind;
        }

        FileKind::Other
    }

    /// Detects the kind of a file on disk.
    ///
    /// Reads the file header through `infer` only when the extension is unknown.
    pub fn detect(&self, path: &Path) -> FileKind {
        let ext = path.extension().and_then(|e| e.to_str());
        if let Some(kind) = ext.and_then(|e| self.extension_to_kind(e)) {
            return kind;
        }

        let mime = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|t| t.mime_type().to_string());
        self.classify(mime.as_deref(), None)
    }
}

impl Default for KindMapper {
    fn default() -> Self {
        Self::new()
    }
}
