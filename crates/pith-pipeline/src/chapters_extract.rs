//! Chapter extraction for the chapters pipeline.
//!
//! Three methods, tried in priority order: TOC-guided (fuzzy-match detected
//! titles back into the body), regex heading scan, and artificial packing
//! into fixed-size sections. Whatever method wins, oversized chapters are
//! split into "(Part k)" sub-chapters afterwards.

use regex::Regex;
use tracing::debug;

use pith_core::defaults::{
    ARTIFICIAL_CHAPTER_TOKENS, MAX_CHAPTER_TOKENS, MIN_DETECTED_CHAPTERS, TOC_MIN_BODY_CHARS,
    TOC_MIN_MATCH_RATE,
};
use pith_core::{estimate_tokens, ExtractionMethod};

use crate::toc::TocOutcome;

/// A chapter before persistence.
#[derive(Debug, Clone)]
pub struct ChapterDraft {
    pub title: String,
    pub level: i16,
    pub content: String,
}

/// Extraction result: chapters plus how they were found.
#[derive(Debug, Clone)]
pub struct ChapterExtraction {
    pub chapters: Vec<ChapterDraft>,
    pub has_detected_structure: bool,
    pub method: ExtractionMethod,
}

/// Extract chapters from cleaned book text, using the TOC outcome when it
/// is usable.
pub fn extract_chapters(text: &str, toc: &TocOutcome) -> ChapterExtraction {
    if toc.is_usable() {
        if let Some(chapters) = extract_via_toc(text, toc) {
            debug!(chapters = chapters.len(), "TOC-guided extraction succeeded");
            return ChapterExtraction {
                chapters: split_oversized(chapters),
                has_detected_structure: true,
                method: ExtractionMethod::Toc,
            };
        }
    }

    if let Some(chapters) = extract_via_regex(text) {
        debug!(chapters = chapters.len(), "Regex extraction succeeded");
        return ChapterExtraction {
            chapters: split_oversized(chapters),
            has_detected_structure: true,
            method: ExtractionMethod::Regex,
        };
    }

    let chapters = extract_artificial(text);
    debug!(chapters = chapters.len(), "Artificial segmentation used");
    ChapterExtraction {
        chapters: split_oversized(chapters),
        has_detected_structure: false,
        method: ExtractionMethod::Artificial,
    }
}

// =============================================================================
// TOC-GUIDED
// =============================================================================

fn extract_via_toc(text: &str, toc: &TocOutcome) -> Option<Vec<ChapterDraft>> {
    let entries: Vec<_> = toc.entries.iter().filter(|e| e.level <= 2).collect();
    if entries.is_empty() {
        return None;
    }

    let mut matches = Vec::new();
    let mut cursor = 0usize;
    for entry in &entries {
        if let Some(pos) = fuzzy_match_title(text, entry.match_title(), cursor) {
            matches.push((*entry, pos));
            cursor = pos + 1;
        }
    }

    let match_rate = matches.len() as f64 / entries.len() as f64;
    if match_rate < TOC_MIN_MATCH_RATE {
        return None;
    }

    let mut chapters = Vec::new();
    for (i, (entry, pos)) in matches.iter().enumerate() {
        let end = matches.get(i + 1).map(|(_, p)| *p).unwrap_or(text.len());
        let body = text[*pos..end].trim();
        if body.len() > TOC_MIN_BODY_CHARS {
            let title = if entry.title.trim().is_empty() {
                entry.match_title().to_string()
            } else {
                entry.title.clone()
            };
            chapters.push(ChapterDraft {
                title,
                level: entry.level.clamp(1, 3) as i16,
                content: body.to_string(),
            });
        }
    }

    // Enough resolved chapters, or a small TOC that resolved completely.
    let complete = chapters.len() == entries.len() && chapters.len() >= 2;
    if chapters.len() >= MIN_DETECTED_CHAPTERS || complete {
        Some(chapters)
    } else {
        None
    }
}

/// Find a TOC title in body text, searching forward from `start_from`.
/// Strategies in priority order: exact normalized line match, prefix-augmented
/// match ("chapter N:", "part N:", "N."), then word-overlap (≥70% of the
/// title's significant words on one short line).
pub fn fuzzy_match_title(text: &str, title: &str, start_from: usize) -> Option<usize> {
    let norm_title = normalize_title(title);
    if norm_title.is_empty() || start_from >= text.len() {
        return None;
    }
    let haystack = &text[start_from..];

    // Exact normalized match.
    for (offset, line) in lines_with_offsets(haystack) {
        if !line.trim().is_empty() && normalize_title(line) == norm_title {
            return Some(start_from + offset);
        }
    }

    // Prefix-augmented match.
    let prefix_re = Regex::new(r"^(?:chapter|part|section)\s+\S+\s+(.*)$").expect("static regex");
    let numbered_re = Regex::new(r"^\d{1,4}\s+(.*)$").expect("static regex");
    for (offset, line) in lines_with_offsets(haystack) {
        let norm_line = normalize_title(line);
        let rest = prefix_re
            .captures(&norm_line)
            .or_else(|| numbered_re.captures(&norm_line))
            .map(|c| c[1].to_string());
        if rest.as_deref() == Some(norm_title.as_str()) {
            return Some(start_from + offset);
        }
    }

    // Word-overlap heuristic.
    let significant: Vec<&str> = norm_title.split(' ').filter(|w| w.len() > 3).collect();
    if significant.is_empty() {
        return None;
    }
    for (offset, line) in lines_with_offsets(haystack) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.len() >= 150 {
            continue;
        }
        let norm_line = normalize_title(trimmed);
        let present = significant
            .iter()
            .filter(|w| norm_line.split(' ').any(|lw| lw == **w))
            .count();
        if (present as f64) / (significant.len() as f64) >= 0.7 {
            return Some(start_from + offset);
        }
    }

    None
}

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize_title(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0usize;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        (start, raw.trim_end_matches(['\n', '\r']))
    })
}

// =============================================================================
// REGEX HEADINGS
// =============================================================================

fn extract_via_regex(text: &str) -> Option<Vec<ChapterDraft>> {
    let chapter_re = Regex::new(
        r"(?i)^\s*(?:chapter|part|section)\s+(?:[0-9]{1,4}|[ivxlcdm]{1,8})\b[:.\-\s]*(.*)$",
    )
    .expect("static regex");
    let numbered_re = Regex::new(r"^\s*\d{1,3}[.)]\s+(\S.*)$").expect("static regex");

    let mut chapters: Vec<ChapterDraft> = Vec::new();
    let mut preamble = String::new();
    let mut current: Option<(String, i16, String)> = None;
    let mut heading_count = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();

        let heading = if chapter_re.is_match(trimmed) || numbered_re.is_match(trimmed) {
            Some((trimmed.to_string(), 1i16))
        } else if is_all_caps_heading(trimmed) {
            Some((trimmed.to_string(), 2i16))
        } else {
            None
        };

        match heading {
            Some((title, level)) => {
                heading_count += 1;
                if let Some((t, l, content)) = current.take() {
                    if !content.trim().is_empty() {
                        chapters.push(ChapterDraft {
                            title: t,
                            level: l,
                            content: content.trim().to_string(),
                        });
                    }
                }
                current = Some((title, level, String::new()));
            }
            None => match current.as_mut() {
                Some((_, _, content)) => {
                    if is_title_case_heading(trimmed) {
                        // Subsection headings become inline markdown headers.
                        content.push_str(&format!("### {}\n", trimmed));
                    } else {
                        content.push_str(line);
                        content.push('\n');
                    }
                }
                None => {
                    preamble.push_str(line);
                    preamble.push('\n');
                }
            },
        }
    }

    if let Some((t, l, content)) = current.take() {
        if !content.trim().is_empty() {
            chapters.push(ChapterDraft {
                title: t,
                level: l,
                content: content.trim().to_string(),
            });
        }
    }

    if heading_count < MIN_DETECTED_CHAPTERS {
        return None;
    }

    if preamble.trim().len() > TOC_MIN_BODY_CHARS {
        chapters.insert(
            0,
            ChapterDraft {
                title: "Introduction".to_string(),
                level: 1,
                content: preamble.trim().to_string(),
            },
        );
    }

    Some(chapters)
}

fn is_all_caps_heading(line: &str) -> bool {
    let len = line.chars().count();
    if !(3..=80).contains(&len) {
        return false;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase())
}

fn is_title_case_heading(line: &str) -> bool {
    const STOPWORDS: &[&str] = &["of", "the", "and", "in", "to", "a", "an", "for", "on", "with"];
    if line.len() > 60 || line.ends_with(['.', ',', ';', ':']) {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if !(2..=8).contains(&words.len()) {
        return false;
    }
    if is_all_caps_heading(line) {
        return false;
    }
    words.iter().all(|w| {
        STOPWORDS.contains(&w.to_lowercase().as_str())
            || w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
    })
}

// =============================================================================
// ARTIFICIAL
// =============================================================================

fn extract_artificial(text: &str) -> Vec<ChapterDraft> {
    let paragraph_re = Regex::new(r"\n{2,}").expect("static regex");
    let mut chapters = Vec::new();
    let mut current = String::new();

    for paragraph in paragraph_re.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if !current.is_empty()
            && estimate_tokens(&current) + estimate_tokens(paragraph) > ARTIFICIAL_CHAPTER_TOKENS
        {
            chapters.push(section_draft(chapters.len(), std::mem::take(&mut current)));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.trim().is_empty() {
        chapters.push(section_draft(chapters.len(), current));
    }
    chapters
}

fn section_draft(index: usize, content: String) -> ChapterDraft {
    ChapterDraft {
        title: format!("Section {}", index + 1),
        level: 1,
        content,
    }
}

// =============================================================================
// OVERSIZE SPLITTING
// =============================================================================

/// Split any chapter above `MAX_CHAPTER_TOKENS` into "(Part k)" sub-chapters.
pub fn split_oversized(drafts: Vec<ChapterDraft>) -> Vec<ChapterDraft> {
    let mut out = Vec::with_capacity(drafts.len());
    for draft in drafts {
        if estimate_tokens(&draft.content) <= MAX_CHAPTER_TOKENS {
            out.push(draft);
            continue;
        }
        let parts = split_text_parts(&draft.content, MAX_CHAPTER_TOKENS);
        let many = parts.len() > 1;
        for (k, part) in parts.into_iter().enumerate() {
            let title = if many {
                format!("{} (Part {})", draft.title, k + 1)
            } else {
                draft.title.clone()
            };
            out.push(ChapterDraft {
                title,
                level: draft.level,
                content: part,
            });
        }
    }
    out
}

/// Pack a text's paragraphs into parts of at most `max_tokens` each.
pub fn split_text_parts(content: &str, max_tokens: usize) -> Vec<String> {
    let paragraph_re = Regex::new(r"\n{2,}").expect("static regex");
    let mut parts = Vec::new();
    let mut current = String::new();

    for paragraph in paragraph_re.split(content) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        for unit in bounded_units(paragraph, max_tokens) {
            if !current.is_empty()
                && estimate_tokens(&current) + estimate_tokens(&unit) > max_tokens
            {
                parts.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&unit);
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// A paragraph, or char-boundary slices of it when it alone exceeds the cap.
fn bounded_units(paragraph: &str, max_tokens: usize) -> Vec<String> {
    if estimate_tokens(paragraph) <= max_tokens {
        return vec![paragraph.to_string()];
    }
    let max_chars = max_tokens * 4;
    let mut units = Vec::new();
    let mut rest = paragraph;
    while estimate_tokens(rest) > max_tokens {
        let mut cut = max_chars.min(rest.len());
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let cut = rest[..cut]
            .rfind(char::is_whitespace)
            .filter(|&i| i > 0)
            .unwrap_or(cut);
        units.push(rest[..cut].trim().to_string());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        units.push(rest.to_string());
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc::{TocConfidence, TocEntry, TocOutcome};

    fn toc_with(entries: Vec<TocEntry>, confidence: TocConfidence) -> TocOutcome {
        TocOutcome {
            has_toc: true,
            entries,
            toc_start_page: Some(1),
            toc_end_page: Some(1),
            confidence,
        }
    }

    fn entry(normalized: &str, level: i64) -> TocEntry {
        TocEntry {
            title: String::new(),
            normalized_title: normalized.to_string(),
            page_number: None,
            level,
        }
    }

    fn body(seed: &str) -> String {
        format!("{} ", seed).repeat(40)
    }

    #[test]
    fn toc_guided_resolves_two_full_matches() {
        let text = format!(
            "Contents\nChapter 1 Alpha .... 5\nChapter 2 Beta .... 20\n\n\
             Chapter 1 Alpha\n{}\nChapter 2 Beta\n{}",
            body("alpha body text"),
            body("beta body text")
        );
        let toc = toc_with(
            vec![entry("Alpha", 2), entry("Beta", 2)],
            TocConfidence::High,
        );

        let extraction = extract_chapters(&text, &toc);
        assert_eq!(extraction.method, ExtractionMethod::Toc);
        assert!(extraction.has_detected_structure);
        assert_eq!(extraction.chapters.len(), 2);
        assert!(extraction.chapters[0].content.contains("alpha body text"));
        assert!(extraction.chapters[1].content.contains("beta body text"));
    }

    #[test]
    fn low_match_rate_falls_through_to_regex() {
        // TOC titles that never appear, but clean regex headings in the body.
        let text = format!(
            "Chapter 1: First Things\n{}\nChapter 2: Second Things\n{}\nChapter 3: Third Things\n{}",
            body("one"),
            body("two"),
            body("three")
        );
        let toc = toc_with(
            vec![
                entry("Nonexistent Alpha Quantum", 2),
                entry("Nonexistent Beta Quantum", 2),
                entry("Nonexistent Gamma Quantum", 2),
            ],
            TocConfidence::High,
        );

        let extraction = extract_chapters(&text, &toc);
        assert_eq!(extraction.method, ExtractionMethod::Regex);
        assert_eq!(extraction.chapters.len(), 3);
    }

    #[test]
    fn too_few_headings_falls_through_to_artificial() {
        let text = (0..10)
            .map(|i| body(&format!("plain paragraph {}", i)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let extraction = extract_chapters(&text, &TocOutcome::absent());
        assert_eq!(extraction.method, ExtractionMethod::Artificial);
        assert!(!extraction.has_detected_structure);
        assert!(!extraction.chapters.is_empty());
        assert_eq!(extraction.chapters[0].title, "Section 1");
    }

    #[test]
    fn artificial_sections_respect_target_size() {
        let text = (0..60)
            .map(|i| body(&format!("paragraph number {}", i)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let extraction = extract_chapters(&text, &TocOutcome::absent());
        assert!(extraction.chapters.len() > 1);
        for chapter in &extraction.chapters {
            assert!(estimate_tokens(&chapter.content) <= MAX_CHAPTER_TOKENS);
        }
    }

    #[test]
    fn oversized_chapters_split_into_parts() {
        let huge = "word ".repeat(10_000); // ~12.5k tokens
        let drafts = vec![ChapterDraft {
            title: "Giant".into(),
            level: 1,
            content: huge,
        }];
        let split = split_oversized(drafts);
        assert!(split.len() >= 2);
        assert_eq!(split[0].title, "Giant (Part 1)");
        assert_eq!(split[1].title, "Giant (Part 2)");
        for part in &split {
            assert!(estimate_tokens(&part.content) <= MAX_CHAPTER_TOKENS);
        }
    }

    #[test]
    fn fuzzy_match_exact_line() {
        let text = "intro\nDeep Work\nbody follows here";
        let pos = fuzzy_match_title(text, "deep work", 0).unwrap();
        assert_eq!(&text[pos..pos + 9], "Deep Work");
    }

    #[test]
    fn fuzzy_match_prefix_augmented() {
        let text = "intro\nChapter 3: The Craftsman Approach\nbody";
        let pos = fuzzy_match_title(text, "The Craftsman Approach", 0).unwrap();
        assert!(text[pos..].starts_with("Chapter 3"));
    }

    #[test]
    fn fuzzy_match_skips_dot_leader_toc_lines() {
        // The TOC line carries a page number, so prefix matching rejects it;
        // the clean body heading matches instead.
        let text = "Chapter 1 Alpha .... 5\n\nChapter 1 Alpha\nbody";
        let pos = fuzzy_match_title(text, "Alpha", 0).unwrap();
        assert!(text[pos..].starts_with("Chapter 1 Alpha\nbody"));
    }

    #[test]
    fn fuzzy_match_word_overlap() {
        let text = "stuff\nThe Strange Craftsman Mindset Revisited\nmore";
        let pos = fuzzy_match_title(text, "Craftsman Mindset Strange Extra", 0);
        // 3 of 4 significant words present on one short line: 75% >= 70%.
        assert!(pos.is_some());
        assert!(text[pos.unwrap()..].starts_with("The Strange"));
    }

    #[test]
    fn fuzzy_match_respects_start_from() {
        let text = "Alpha\nfiller\nAlpha\nend";
        let first = fuzzy_match_title(text, "Alpha", 0).unwrap();
        let second = fuzzy_match_title(text, "Alpha", first + 1).unwrap();
        assert!(second > first);
    }

    #[test]
    fn title_case_heading_predicate() {
        assert!(is_title_case_heading("The Craftsman Approach"));
        assert!(is_title_case_heading("Rule of the Vital Few"));
        assert!(!is_title_case_heading("This is a normal sentence."));
        assert!(!is_title_case_heading("SHALLOW WORK"));
    }

    #[test]
    fn all_caps_heading_predicate() {
        assert!(is_all_caps_heading("SHALLOW WORK"));
        assert!(is_all_caps_heading("PART TWO: RULES"));
        assert!(!is_all_caps_heading("No"));
        assert!(!is_all_caps_heading("Mixed Case Line"));
    }
}
