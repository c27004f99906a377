// src/pipeline/normalize.rs

//! Final ordering and numbering of a downloaded chapter set.

use std::collections::HashSet;

use crate::models::{ChapterContent, ChapterRange};

/// How the finished chapter set is shaped.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub range: ChapterRange,
    /// The range started at 1 on a site whose first entry is front matter
    pub include_prologue: bool,
}

fn is_prologue(chapter: &ChapterContent) -> bool {
    chapter.title.trim().to_lowercase().starts_with("prologue")
}

/// Title of a renumbered front-matter chapter, `Chapter N | base` style.
fn front_matter_title(raw: &str, number: u32) -> String {
    let base = raw.split('|').next().unwrap_or(raw).trim();
    if base.to_lowercase().starts_with("chapter") {
        base.to_string()
    } else if base.is_empty() || base.eq_ignore_ascii_case("untitled") {
        format!("Chapter {number}")
    } else {
        format!("Chapter {number} | {base}")
    }
}

/// Sort by number, keep one chapter per source URL, and apply prologue rules.
///
/// With `include_prologue`, the first chapter titled "Prologue" (else the
/// first chapter) becomes number 0 and the chapters listed after it shift
/// down by one, so gaps left by failed chapters survive renumbering.
pub fn normalize_chapters(chapters: Vec<ChapterContent>, options: NormalizeOptions) -> Vec<ChapterContent> {
    let mut chapters = chapters;
    chapters.sort_by_key(|c| c.chapter_number);
    let mut seen = HashSet::new();
    chapters.retain(|c| seen.insert(c.source_url.clone()));

    if !options.include_prologue || chapters.is_empty() {
        for chapter in &mut chapters {
            if chapter.title.trim().is_empty() {
                chapter.title = format!("Chapter {}", chapter.chapter_number);
            }
        }
        return chapters;
    }

    let index = chapters.iter().position(is_prologue).unwrap_or(0);
    let mut prologue = chapters.remove(index);
    let pivot = prologue.chapter_number;
    prologue.chapter_number = 0;
    prologue.title = "Prologue".to_string();

    let mut main: Vec<ChapterContent> = chapters
        .into_iter()
        .map(|mut chapter| {
            if chapter.chapter_number > pivot {
                chapter.chapter_number -= 1;
            }
            chapter.title = front_matter_title(&chapter.title, chapter.chapter_number);
            chapter
        })
        .collect();
    if let Some(end) = options.range.end {
        main.retain(|c| c.chapter_number <= end);
    }

    let mut output = Vec::with_capacity(main.len() + 1);
    output.push(prologue);
    output.extend(main);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(n: u32, title: &str) -> ChapterContent {
        ChapterContent::new(title, "body", n, format!("https://s.com/read-{n}.html"))
    }

    fn plain(range: ChapterRange) -> NormalizeOptions {
        NormalizeOptions {
            range,
            include_prologue: false,
        }
    }

    #[test]
    fn test_sorts_and_dedups() {
        let mut dup = chapter(2, "Chapter 2");
        dup.body_text = "second copy".into();
        let out = normalize_chapters(
            vec![chapter(3, "Chapter 3"), chapter(1, "Chapter 1"), chapter(2, "Chapter 2"), dup],
            plain(ChapterRange::all()),
        );
        let numbers: Vec<_> = out.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(out[1].body_text, "body");
    }

    #[test]
    fn test_empty_titles_get_numbers() {
        let out = normalize_chapters(vec![chapter(4, " ")], plain(ChapterRange::all()));
        assert_eq!(out[0].title, "Chapter 4");
    }

    #[test]
    fn test_first_entry_becomes_prologue() {
        let out = normalize_chapters(
            vec![
                chapter(1, "Introduction | Shadow Slave"),
                chapter(2, "Nightmare Begins | Shadow Slave"),
                chapter(3, "Chapter 2: Trial"),
                chapter(4, "Extra"),
            ],
            NormalizeOptions {
                range: ChapterRange::new(1, Some(2)),
                include_prologue: true,
            },
        );
        let summary: Vec<_> = out.iter().map(|c| (c.chapter_number, c.title.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (0, "Prologue"),
                (1, "Chapter 1 | Nightmare Begins"),
                (2, "Chapter 2: Trial"),
            ]
        );
    }

    #[test]
    fn test_titled_prologue_is_found_anywhere() {
        let out = normalize_chapters(
            vec![chapter(1, "Chapter 1"), chapter(2, "Prologue: Before"), chapter(3, "Chapter 2")],
            NormalizeOptions {
                range: ChapterRange::all(),
                include_prologue: true,
            },
        );
        assert_eq!(out[0].chapter_number, 0);
        assert_eq!(out[0].source_url, "https://s.com/read-2.html");
        let numbers: Vec<_> = out.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
    }

    #[test]
    fn test_gaps_survive_renumbering() {
        let out = normalize_chapters(
            vec![chapter(1, "Intro"), chapter(2, "A"), chapter(4, "C")],
            NormalizeOptions {
                range: ChapterRange::all(),
                include_prologue: true,
            },
        );
        let numbers: Vec<_> = out.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![0, 1, 3]);
    }
}
