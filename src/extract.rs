//! Text extraction for uploaded study files (PDF, DOCX/DOC, TXT).
//!
//! The upload format is chosen from the file extension, case-insensitively.
//! `.doc` is read with the OOXML extractor; a legacy binary Word file fails
//! with [`ExtractError::Ooxml`] rather than being guessed at.

use std::io::Read;
use std::path::Path;

use study_harness_core::StudyError;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Pdf,
    /// `.docx`, and `.doc` when it is actually OOXML.
    Word,
    Text,
}

impl UploadFormat {
    /// Resolve the format from a filename's extension.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(UploadFormat::Pdf),
            "docx" | "doc" => Some(UploadFormat::Word),
            "txt" => Some(UploadFormat::Text),
            _ => None,
        }
    }
}

/// Extraction error. Never a panic; the load request fails instead.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("Word extraction failed: {0}")]
    Ooxml(String),
    #[error("could not read upload: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExtractError> for StudyError {
    fn from(e: ExtractError) -> Self {
        StudyError::ExtractionFailed(e.to_string())
    }
}

/// Read the spooled upload at `path` and extract its plain text.
///
/// Blocking; call from `spawn_blocking`.
pub fn extract_file(path: &Path, format: UploadFormat) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes, format)
}

pub fn extract_bytes(bytes: &[u8], format: UploadFormat) -> Result<String, ExtractError> {
    match format {
        UploadFormat::Pdf => extract_pdf(bytes),
        UploadFormat::Word => extract_docx(bytes),
        UploadFormat::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(format!("not an OOXML document ({})", e)))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_word_text(&doc_xml)
}

/// Collect `w:t` runs, separating paragraphs, tabs, and breaks with spaces.
fn extract_word_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push(' '),
                _ => {}
            },
            Ok(Event::Empty(e)) if matches!(e.local_name().as_ref(), b"tab" | b"br") => {
                out.push(' ')
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
