//! ffmetadata sidecar rendering.
//!
//! The muxer reads tags and chapter markers from a text file in ffmpeg's
//! `FFMETADATA1` format: a header line, `key=value` global tags, then one
//! `[CHAPTER]` section per chapter.

use crate::types::BookDescriptor;

const HEADER: &str = ";FFMETADATA1";
const CHAPTER_TIMEBASE: &str = "TIMEBASE=1/1000000000";
const ELLIPSIS: &str = "...";

/// Cap `value` at `cap` characters.
///
/// Values that fit are returned unchanged. Longer values keep `cap - 3`
/// characters followed by `...`, except when `cap <= 4`, where they are
/// simply cut to `cap` characters.
pub fn truncate(value: &str, cap: usize) -> String {
    if value.chars().count() <= cap {
        return value.to_string();
    }
    if cap <= 4 {
        return value.chars().take(cap).collect();
    }
    let mut out: String = value.chars().take(cap - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Escape the characters ffmpeg treats specially in metadata values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' | '\n' => {
                out.push('\\');
                out.push(c);
            }
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Render the sidecar for `book`, capping every value at `cap` characters.
pub fn render(book: &BookDescriptor, cap: usize) -> String {
    let field = |key: &str, value: &str| format!("{key}={}", escape(&truncate(value, cap)));

    let mut lines = vec![HEADER.to_string()];
    if let Some(artist) = book.primary_author() {
        lines.push(field("artist", artist));
    }
    lines.push(field("title", &book.title));
    lines.push(field("album", &book.title));
    if !book.description.is_empty() {
        lines.push(field("description", &book.description));
    }
    lines.push(field("comment", book.source_url.as_str()));
    if !book.genres.is_empty() {
        lines.push(field("genre", &book.genres.join(", ")));
    }

    for chapter in &book.chapters {
        lines.push("[CHAPTER]".to_string());
        lines.push(CHAPTER_TIMEBASE.to_string());
        lines.push(format!("START={}", chapter.start));
        lines.push(format!("END={}", chapter.end));
        if let Some(title) = &chapter.title {
            lines.push(field("title", title));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chapter, ContentRef};
    use pretty_assertions::assert_eq;
    use url::Url;

    fn book() -> BookDescriptor {
        BookDescriptor {
            title: "Title".into(),
            authors: vec!["First Author".into(), "Second Author".into()],
            narrators: vec![],
            description: "Line one\nLine two".into(),
            chapters: vec![
                Chapter {
                    title: Some("Intro".into()),
                    start: 0,
                    end: 61_000_000_000,
                },
                Chapter {
                    title: None,
                    start: 61_000_000_000,
                    end: 120_000_000_000,
                },
            ],
            cover_url: Url::parse("https://img.example.com/c.jpg").unwrap(),
            content: ContentRef::Playlist {
                url: Url::parse("https://cdn.example.com/list.m3u8").unwrap(),
            },
            source_url: Url::parse("https://books.example.com/title").unwrap(),
            genres: vec!["Horror".into(), "Novel".into()],
            series: None,
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("0123456789", 6), "012...");
        assert_eq!(truncate("012345", 3), "012");
        assert_eq!(truncate("012", 2), "01");
        assert_eq!(truncate("012345", 4), "0123");
        assert_eq!(truncate("012345", 5), "01...");
        assert_eq!(truncate("short", 140), "short");
        assert_eq!(truncate("exact", 5), "exact");
        assert_eq!(truncate("", 0), "");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let value = "Глубина. Погружение";
        let out = truncate(value, 10);
        assert_eq!(out, "Глубина...");
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn test_truncate_never_exceeds_cap() {
        let value = "abcdefghijklmnopqrstuvwxyz";
        for cap in 0..30 {
            assert!(truncate(value, cap).chars().count() <= cap);
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a=b;c#d\\e"), "a\\=b\\;c\\#d\\\\e");
        assert_eq!(escape("one\r\ntwo"), "one\\\ntwo");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_render() {
        let expected = "\
;FFMETADATA1
artist=First Author
title=Title
album=Title
description=Line one\\
Line two
comment=https://books.example.com/title
genre=Horror, Novel
[CHAPTER]
TIMEBASE=1/1000000000
START=0
END=61000000000
title=Intro
[CHAPTER]
TIMEBASE=1/1000000000
START=61000000000
END=120000000000
";
        assert_eq!(render(&book(), 140), expected);
    }

    #[test]
    fn test_render_caps_fields() {
        let mut book = book();
        book.title = "x".repeat(200);
        book.chapters[0].title = Some("y".repeat(200));
        let out = render(&book, 140);

        let title = format!("title={}...", "x".repeat(137));
        let chapter = format!("title={}...", "y".repeat(137));
        assert!(out.lines().any(|l| l == title));
        assert!(out.lines().any(|l| l == chapter));
    }

    #[test]
    fn test_render_without_optional_fields() {
        let mut book = book();
        book.authors.clear();
        book.genres.clear();
        book.description.clear();
        book.chapters.clear();
        let out = render(&book, 140);
        assert_eq!(
            out,
            ";FFMETADATA1\ntitle=Title\nalbum=Title\ncomment=https://books.example.com/title\n"
        );
    }
}
