//! crates/reader_core/src/search.rs
//!
//! Full-text search inside a book's chapter content.

use serde::Serialize;

use crate::page_index::PageIndex;

pub const MIN_TERM_CHARS: usize = 2;
pub const CONTEXT_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub page_number: u32,
    pub chapter_index: usize,
    pub text_before: String,
    pub matched_text: String,
    pub text_after: String,
    /// Character offset of the match within the chapter content.
    pub index: usize,
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Case-insensitive occurrences of `term`, nearest to `current_page` first.
pub fn search(index: &PageIndex<'_>, term: &str, current_page: u32) -> Vec<SearchHit> {
    let term = term.trim();
    let needle: Vec<char> = term.chars().map(fold).collect();
    if needle.len() < MIN_TERM_CHARS {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for (chapter_index, chapter) in index.chapters().iter().enumerate() {
        let Some(content) = chapter.content.as_deref() else {
            continue;
        };
        let page_number = index.start_page(chapter_index).unwrap_or(1);
        let original: Vec<char> = content.chars().collect();
        let folded: Vec<char> = original.iter().copied().map(fold).collect();

        let mut at = 0;
        while at + needle.len() <= folded.len() {
            if folded[at..at + needle.len()] != needle[..] {
                at += 1;
                continue;
            }
            let end = at + needle.len();
            let before = at.saturating_sub(CONTEXT_CHARS);
            let after = (end + CONTEXT_CHARS).min(original.len());
            hits.push(SearchHit {
                page_number,
                chapter_index,
                text_before: original[before..at].iter().collect(),
                matched_text: original[at..end].iter().collect(),
                text_after: original[end..after].iter().collect(),
                index: at,
            });
            at = end;
        }
    }

    hits.sort_by_key(|hit| hit.page_number.abs_diff(current_page));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Chapter;

    fn chapters() -> Vec<Chapter> {
        vec![
            Chapter::new("One", 1).with_content("Le vent se lève, il faut tenter de vivre."),
            Chapter::new("Two", 35),
            Chapter::new("Three", 78).with_content("VIVRE est rare. La plupart des gens existent, voilà tout. Vivre."),
        ]
    }

    #[test]
    fn short_terms_find_nothing() {
        let chapters = chapters();
        let index = PageIndex::new(&chapters, 150);
        assert!(search(&index, " v ", 1).is_empty());
        assert!(search(&index, "", 1).is_empty());
    }

    #[test]
    fn matches_ignore_case_and_sort_by_distance() {
        let chapters = chapters();
        let index = PageIndex::new(&chapters, 150);
        let hits = search(&index, "vivre", 100);

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].page_number, 78);
        assert_eq!(hits[0].matched_text, "VIVRE");
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].matched_text, "Vivre");
        assert_eq!(hits[2].page_number, 1);
        assert_eq!(hits[2].chapter_index, 0);
    }

    #[test]
    fn context_is_bounded_to_thirty_characters() {
        let text = format!("{}needle{}", "a".repeat(50), "b".repeat(50));
        let chapters = vec![Chapter::new("Only", 1).with_content(text)];
        let index = PageIndex::new(&chapters, 10);
        let hits = search(&index, "NEEDLE", 1);

        assert_eq!(hits[0].text_before, "a".repeat(CONTEXT_CHARS));
        assert_eq!(hits[0].text_after, "b".repeat(CONTEXT_CHARS));
        assert_eq!(hits[0].index, 50);
    }
}
