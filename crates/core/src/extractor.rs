use crate::error::ExtractionError;
use crate::models::{ExtractedTextResult, PdfMetadata};
use lopdf::{Dictionary, Document, Object};
use std::sync::Arc;
use std::time::Duration;

/// Turns raw PDF bytes into plain text, a page count and document info.
pub trait PdfExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedTextResult, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedTextResult, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let document =
            Document::load_mem(bytes).map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(ExtractionError::NoPages);
        }

        let mut page_texts = Vec::with_capacity(pages.len());
        for page_no in pages.keys() {
            let text = document
                .extract_text(&[*page_no])
                .map_err(|error| ExtractionError::PdfParse(error.to_string()))?;
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                page_texts.push(trimmed.to_string());
            }
        }

        if page_texts.is_empty() {
            return Err(ExtractionError::NoText);
        }

        Ok(ExtractedTextResult {
            text: page_texts.join("\n\n"),
            page_count: u32::try_from(pages.len()).unwrap_or(u32::MAX),
            metadata: read_info(&document),
        })
    }
}

pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<ExtractedTextResult, ExtractionError> {
    LopdfExtractor.extract(bytes)
}

/// Runs the extractor on the blocking pool, giving up after `timeout`.
pub async fn extract_with_timeout(
    extractor: Arc<dyn PdfExtractor>,
    bytes: Vec<u8>,
    timeout: Duration,
) -> Result<ExtractedTextResult, ExtractionError> {
    let task = tokio::task::spawn_blocking(move || extractor.extract(&bytes));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ExtractionError::Task(join_error.to_string())),
        Err(_) => Err(ExtractionError::Timeout(timeout.as_secs())),
    }
}

fn read_info(document: &Document) -> PdfMetadata {
    let info = match document.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => document.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dictionary)) => Some(dictionary),
        _ => None,
    };

    match info {
        Some(dictionary) => PdfMetadata {
            title: info_string(dictionary, b"Title"),
            author: info_string(dictionary, b"Author"),
            subject: info_string(dictionary, b"Subject"),
        },
        None => PdfMetadata::default(),
    }
}

fn info_string(dictionary: &Dictionary, key: &[u8]) -> Option<String> {
    let raw = dictionary.get(key).ok()?.as_str().ok()?;
    let decoded = decode_pdf_text_string(raw);
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// PDF text strings are UTF-16BE when they carry a BOM, otherwise a
// single-byte encoding that is Latin-1 for the printable range.
fn decode_pdf_text_string(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }

    if let Some(utf8) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }

    raw.iter().map(|byte| char::from(*byte)).collect()
}

#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Builds a PDF with one page per entry in `pages` and optional info fields.
    pub(crate) fn build(pages: &[&str], title: Option<&str>, author: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let encoded = content.encode().expect("content should encode");
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = lopdf::Dictionary::new();
        if let Some(title) = title {
            info.set("Title", Object::string_literal(title));
        }
        if let Some(author) = author {
            info.set("Author", Object::string_literal(author));
        }
        if title.is_some() || author.is_some() {
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("pdf should save");
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_page_count_and_info() {
        let pdf = test_pdf::build(
            &["Accidents are covered", "Exclusions apply"],
            Some("Gold Plan"),
            Some("Example Pet Mutual"),
        );

        let result = extract_text_from_pdf(&pdf).expect("pdf should extract");

        assert_eq!(result.page_count, 2);
        assert!(result.text.contains("Accidents"));
        assert!(result.text.contains("Exclusions"));
        assert_eq!(result.metadata.title.as_deref(), Some("Gold Plan"));
        assert_eq!(result.metadata.author.as_deref(), Some("Example Pet Mutual"));
        assert!(result.metadata.subject.is_none());
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let error = extract_text_from_pdf(&[]).unwrap_err();
        assert!(matches!(error, ExtractionError::EmptyInput));
    }

    #[test]
    fn garbage_bytes_wrap_parser_error() {
        let error = extract_text_from_pdf(b"%PDF-1.4\n%broken").unwrap_err();
        assert!(matches!(error, ExtractionError::PdfParse(_)));
        assert!(error.to_string().starts_with("pdf parse error"));
    }

    #[test]
    fn utf16_info_strings_are_decoded() {
        let raw = [0xFE, 0xFF, 0x00, 0x50, 0x00, 0x65, 0x00, 0x74];
        assert_eq!(decode_pdf_text_string(&raw), "Pet");
        assert_eq!(decode_pdf_text_string(b"Caf\xe9"), "Café");
    }

    struct SlowExtractor;

    impl PdfExtractor for SlowExtractor {
        fn extract(&self, _bytes: &[u8]) -> Result<ExtractedTextResult, ExtractionError> {
            std::thread::sleep(Duration::from_millis(300));
            Err(ExtractionError::NoText)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_extraction_times_out() {
        let result = extract_with_timeout(
            Arc::new(SlowExtractor),
            b"%PDF".to_vec(),
            Duration::from_millis(20),
        )
        .await;

        assert!(matches!(result, Err(ExtractionError::Timeout(_))));
    }

    #[tokio::test]
    async fn blocking_extraction_returns_result() {
        let pdf = test_pdf::build(&["Waiting period is 14 days"], None, None);
        let result = extract_with_timeout(Arc::new(LopdfExtractor), pdf, Duration::from_secs(10))
            .await
            .expect("pdf should extract");

        assert_eq!(result.page_count, 1);
        assert_eq!(result.metadata, PdfMetadata::default());
    }
}
