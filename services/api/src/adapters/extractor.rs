//! services/api/src/adapters/extractor.rs
//!
//! A `ContentExtractor` for plain-text books. Pages are a fixed number of words;
//! chapters start at heading lines. Anything that cannot be read as text comes
//! back as a one-chapter stand-in book.

use async_trait::async_trait;
use reader_core::domain::{Chapter, ExtractedBook};
use reader_core::ports::{ContentExtractor, PortResult};
use tracing::{info, warn};

const UNKNOWN_AUTHOR: &str = "Unknown author";
const HEADING_PREFIXES: [&str; 3] = ["chapter ", "chapitre ", "part "];
const MAX_HEADING_CHARS: usize = 80;
const TEXT_EXTENSIONS: [&str; 4] = ["txt", "text", "md", "markdown"];

#[derive(Clone, Debug)]
pub struct TextExtractor {
    words_per_page: usize,
}

impl TextExtractor {
    pub fn new(words_per_page: usize) -> Self {
        Self {
            words_per_page: words_per_page.max(1),
        }
    }

    fn page_of(&self, word_offset: usize) -> u32 {
        u32::try_from(word_offset / self.words_per_page + 1).unwrap_or(u32::MAX)
    }

    /// Splits text into chapters anchored at the page where each heading falls.
    pub fn paginate(&self, title: String, author: String, text: &str) -> Option<ExtractedBook> {
        let mut chapters: Vec<Chapter> = Vec::new();
        let mut title_of_current: Option<String> = None;
        let mut start_of_current = 1;
        let mut body = String::new();
        let mut words = 0usize;

        for line in text.lines() {
            if is_heading(line) {
                if title_of_current.is_some() || !body.trim().is_empty() {
                    let heading = title_of_current
                        .take()
                        .unwrap_or_else(|| "Front matter".to_string());
                    chapters.push(Chapter::new(heading, start_of_current).with_content(body.trim()));
                }
                body.clear();
                title_of_current = Some(line.trim().to_string());
                start_of_current = self.page_of(words);
            } else {
                body.push_str(line);
                body.push('\n');
            }
            words += line.split_whitespace().count();
        }

        if words == 0 {
            return None;
        }
        let heading = title_of_current.unwrap_or_else(|| "Chapter 1".to_string());
        chapters.push(Chapter::new(heading, start_of_current).with_content(body.trim()));

        let total_pages = u32::try_from(words.div_ceil(self.words_per_page))
            .unwrap_or(u32::MAX)
            .max(1);
        if let Some(first) = chapters.first_mut() {
            first.start_page = 1;
        }
        for chapter in &mut chapters {
            chapter.start_page = chapter.start_page.min(total_pages);
        }

        Some(ExtractedBook {
            title,
            author,
            cover: None,
            total_pages,
            chapters,
        })
    }
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_CHARS {
        return false;
    }
    let lower = trimmed.to_lowercase();
    HEADING_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Reads `"Author - Title.ext"`; anything else is taken as the title alone.
pub fn title_and_author(file_name: &str) -> (String, String) {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    let stem = stem.trim();
    match stem.split_once(" - ") {
        Some((author, title)) if !author.trim().is_empty() && !title.trim().is_empty() => {
            (title.trim().to_string(), author.trim().to_string())
        }
        _ if stem.is_empty() => ("Untitled".to_string(), UNKNOWN_AUTHOR.to_string()),
        _ => (stem.to_string(), UNKNOWN_AUTHOR.to_string()),
    }
}

fn is_text_file(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, extension)) => TEXT_EXTENSIONS.contains(&extension.to_lowercase().as_str()),
        None => true,
    }
}

#[async_trait]
impl ContentExtractor for TextExtractor {
    async fn extract(&self, file_name: &str, bytes: &[u8]) -> PortResult<ExtractedBook> {
        let (title, author) = title_and_author(file_name);

        if !is_text_file(file_name) {
            warn!(file_name, "Unsupported format, importing a stand-in book");
            return Ok(ExtractedBook::stand_in(title, author));
        }
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(file_name, "File is not UTF-8 text ({}), importing a stand-in book", e);
                return Ok(ExtractedBook::stand_in(title, author));
            }
        };

        match self.paginate(title.clone(), author.clone(), text) {
            Some(book) => {
                info!(
                    file_name,
                    pages = book.total_pages,
                    chapters = book.chapters.len(),
                    "Extracted text book"
                );
                Ok(book)
            }
            None => {
                warn!(file_name, "File has no text, importing a stand-in book");
                Ok(ExtractedBook::stand_in(title, author))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn parses_author_and_title_from_the_file_name() {
        assert_eq!(
            title_and_author("Victor Hugo - Les Misérables.txt"),
            ("Les Misérables".to_string(), "Victor Hugo".to_string())
        );
        assert_eq!(
            title_and_author("notes.md"),
            ("notes".to_string(), UNKNOWN_AUTHOR.to_string())
        );
        assert_eq!(title_and_author(".txt").0, ".txt");
    }

    #[test]
    fn chapters_are_anchored_where_their_heading_falls() {
        let text = format!(
            "Chapter 1\n{}\nChapter 2\n{}\nCHAPITRE 3\n{}",
            words(250),
            words(300),
            words(10)
        );
        let book = TextExtractor::new(100)
            .paginate("T".into(), "A".into(), &text)
            .unwrap();

        let anchors: Vec<_> = book.chapters.iter().map(|c| c.start_page).collect();
        assert_eq!(anchors, vec![1, 3, 6]);
        assert_eq!(book.total_pages, 6);
        assert_eq!(book.chapters[2].title, "CHAPITRE 3");
        assert_eq!(book.chapters[2].content.as_deref(), Some(words(10).as_str()));
    }

    #[test]
    fn text_before_the_first_heading_becomes_front_matter() {
        let text = format!("{}\nPart One\n{}", words(20), words(20));
        let book = TextExtractor::new(300)
            .paginate("T".into(), "A".into(), &text)
            .unwrap();
        assert_eq!(book.chapters.len(), 2);
        assert_eq!(book.chapters[0].title, "Front matter");
        assert_eq!(book.chapters[1].title, "Part One");
        assert_eq!(book.total_pages, 1);
    }

    #[tokio::test]
    async fn unreadable_files_degrade_to_a_stand_in() {
        let extractor = TextExtractor::new(300);

        let epub = extractor.extract("Hugo - Quatrevingt-treize.epub", b"PK\x03\x04").await.unwrap();
        assert_eq!(epub.total_pages, 1);
        assert_eq!(epub.title, "Quatrevingt-treize");
        assert_eq!(epub.chapters.len(), 1);

        let binary = extractor.extract("book.txt", &[0xff, 0xfe, 0x00]).await.unwrap();
        assert_eq!(binary.total_pages, 1);

        let empty = extractor.extract("empty.txt", b"   \n").await.unwrap();
        assert_eq!(empty.chapters.len(), 1);
    }
}
