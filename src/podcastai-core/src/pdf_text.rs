//! PDF text extraction with a word budget.
//!
//! Pages are read in order, the text shown by each page's content stream is
//! split on whitespace, and words are collected until the budget is filled.

use pdf::content::Operation;
use pdf::file::File;
use pdf::object::Page;
use pdf::primitive::Primitive;
use tracing::debug;

use crate::error::PodcastError;

pub const DEFAULT_WORD_LIMIT: usize = 1000;

/// TJ kerning offsets at or below this value (thousandths of an em) read as a word gap.
const TJ_WORD_GAP: f32 = -200.0;

/// Extract at most `limit` whitespace-delimited words from a PDF held in memory.
pub fn extract_text(data: Vec<u8>, limit: usize) -> Result<String, PodcastError> {
    let file = File::from_data(data)?;

    let mut pages = Vec::new();
    let mut words_so_far = 0;
    for (index, page) in file.pages().enumerate() {
        if words_so_far >= limit {
            break;
        }
        let page = page?;
        let text = page_text(&page);
        words_so_far += text.split_whitespace().count();
        debug!(target: "podcastai::pdf", page = index + 1, words_so_far, "extracted page text");
        pages.push(text);
    }

    Ok(take_words(pages, limit))
}

/// Join pages' words with single spaces, stopping once `limit` words are taken.
///
/// The last page contributing words is cut so the output holds exactly `limit`
/// words when the input has more.
pub fn take_words<I, S>(pages: I, limit: usize) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut words: Vec<String> = Vec::new();

    for page in pages {
        let remaining = limit - words.len();
        if remaining == 0 {
            break;
        }
        words.extend(
            page.as_ref()
                .split_whitespace()
                .take(remaining)
                .map(str::to_string),
        );
    }

    words.join(" ")
}

fn page_text(page: &Page) -> String {
    match &page.contents {
        Some(content) => operations_text(&content.operations),
        None => String::new(),
    }
}

/// Collect the text shown by a content stream's operators.
///
/// Positioning and line-advance operators are treated as word breaks; no attempt
/// is made to reconstruct layout.
fn operations_text(operations: &[Operation]) -> String {
    let mut out = String::new();

    for Operation { operator, operands } in operations {
        match (operator.as_str(), operands.as_slice()) {
            ("Tj", [Primitive::String(text)]) | ("'", [Primitive::String(text)]) => {
                if operator == "'" {
                    out.push(' ');
                }
                if let Ok(s) = text.as_str() {
                    out.push_str(&s);
                }
            }
            ("\"", [_, _, Primitive::String(text)]) => {
                out.push(' ');
                if let Ok(s) = text.as_str() {
                    out.push_str(&s);
                }
            }
            ("TJ", [Primitive::Array(parts)]) => {
                for part in parts {
                    match part {
                        Primitive::String(text) => {
                            if let Ok(s) = text.as_str() {
                                out.push_str(&s);
                            }
                        }
                        Primitive::Number(n) if *n <= TJ_WORD_GAP => out.push(' '),
                        Primitive::Integer(n) if (*n as f32) <= TJ_WORD_GAP => out.push(' '),
                        _ => continue,
                    }
                }
            }
            ("Td" | "TD" | "Tm" | "T*" | "BT" | "ET", _) => out.push(' '),
            _ => continue,
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_words_under_limit_keeps_everything() {
        let pages = ["The history of chess", "begins in India."];
        assert_eq!(
            take_words(pages, 1000),
            "The history of chess begins in India."
        );
    }

    #[test]
    fn test_take_words_truncates_last_page() {
        let pages = ["one two three", "four five six", "seven"];
        assert_eq!(take_words(pages, 5), "one two three four five");
    }

    #[test]
    fn test_take_words_exact_page_boundary() {
        let pages = ["one two", "three four", "five"];
        assert_eq!(take_words(pages, 4), "one two three four");
    }

    #[test]
    fn test_take_words_zero_limit() {
        assert_eq!(take_words(["anything at all"], 0), "");
    }

    #[test]
    fn test_take_words_never_exceeds_limit() {
        let pages = ["a b c d", "", "  e\tf\ng  ", "h i j k l m n"];
        let total: usize = pages.iter().map(|p| p.split_whitespace().count()).sum();
        for limit in 0..=total + 3 {
            let out = take_words(pages, limit);
            assert!(out.split_whitespace().count() <= limit);
            if total <= limit {
                assert_eq!(out, "a b c d e f g h i j k l m n");
            }
        }
    }

    #[test]
    fn test_take_words_normalizes_whitespace() {
        assert_eq!(take_words(["  spaced\n\nout   words "], 10), "spaced out words");
    }

    #[test]
    fn test_extract_text_rejects_non_pdf() {
        let err = extract_text(b"definitely not a pdf".to_vec(), 10).unwrap_err();
        assert!(matches!(err, PodcastError::Pdf(_)));
    }

    #[test]
    fn test_operations_text_empty_stream() {
        assert_eq!(operations_text(&[]), "");
    }

    /// Exercises Td, Tj, a kerned TJ array, and the ' and " operators.
    const PAGE_ONE: &str = "BT\n72 720 Td\n(Hello) Tj\n0 -14 Td\n\
                            [(wor) -20 (ld) -250 (foo)] TJ\n(bar) '\n2 0 (baz) \"\nET";
    const PAGE_TWO: &str = "BT\n72 720 Td\n(alpha beta) Tj\n0 -14 Td\n(gamma delta) Tj\nET";

    enum FixturePage<'a> {
        Text(&'a str),
        /// A page whose /Contents points at a dictionary, so loading it fails.
        Broken,
    }

    /// Build a minimal uncompressed PDF with one content stream per page.
    fn pdf_fixture(pages: &[FixturePage]) -> Vec<u8> {
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..pages.len())
                    .map(|i| format!("{} 0 R", 3 + 2 * i))
                    .collect::<Vec<_>>()
                    .join(" "),
                pages.len()
            ),
        ];
        for (i, page) in pages.iter().enumerate() {
            let (contents, stream) = match page {
                FixturePage::Text(text) => (4 + 2 * i, *text),
                FixturePage::Broken => (1, ""),
            };
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>",
                contents
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                stream.len(),
                stream
            ));
        }

        let mut data = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, object) in objects.iter().enumerate() {
            offsets.push(data.len());
            data.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
        }

        let xref = data.len();
        let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            tail.push_str(&format!("{:010} 00000 n \n", offset));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        ));
        data.extend_from_slice(tail.as_bytes());
        data
    }

    #[test]
    fn test_extract_text_reads_text_operators() {
        let data = pdf_fixture(&[FixturePage::Text(PAGE_ONE)]);
        assert_eq!(extract_text(data, 1000).unwrap(), "Hello world foo bar baz");
    }

    #[test]
    fn test_extract_text_truncates_to_limit() {
        let data = pdf_fixture(&[FixturePage::Text(PAGE_ONE)]);
        assert_eq!(extract_text(data, 3).unwrap(), "Hello world foo");
    }

    #[test]
    fn test_extract_text_budget_runs_out_on_second_page() {
        let data = pdf_fixture(&[FixturePage::Text(PAGE_ONE), FixturePage::Text(PAGE_TWO)]);
        assert_eq!(
            extract_text(data.clone(), 7).unwrap(),
            "Hello world foo bar baz alpha beta"
        );
        assert_eq!(
            extract_text(data, 1000).unwrap(),
            "Hello world foo bar baz alpha beta gamma delta"
        );
    }

    #[test]
    fn test_extract_text_stops_reading_pages_once_full() {
        let data = pdf_fixture(&[FixturePage::Text(PAGE_ONE), FixturePage::Broken]);
        assert_eq!(extract_text(data.clone(), 5).unwrap(), "Hello world foo bar baz");
        assert!(matches!(extract_text(data, 6), Err(PodcastError::Pdf(_))));
    }
}
