//! Output path templating.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::BookDescriptor;

pub const UNKNOWN_AUTHOR: &str = "Unknown author";
pub const UNKNOWN_NARRATOR: &str = "Unknown narrator";

/// Substitute `@author`, `@title` and `@narrator` in `template`.
///
/// Placeholders are replaced in a single pass, so a value that happens to
/// contain a placeholder is inserted verbatim.
pub fn output_path(template: &str, book: &BookDescriptor) -> PathBuf {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    let re = PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"@(author|title|narrator)").expect("placeholder regex is valid")
    });

    let path = re.replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
        "author" => book.primary_author().unwrap_or(UNKNOWN_AUTHOR).to_string(),
        "title" => book.title.clone(),
        _ => book.primary_narrator().unwrap_or(UNKNOWN_NARRATOR).to_string(),
    });
    PathBuf::from(path.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentRef;
    use url::Url;

    fn book(authors: &[&str], narrators: &[&str]) -> BookDescriptor {
        BookDescriptor {
            title: "title".into(),
            authors: authors.iter().map(|s| s.to_string()).collect(),
            narrators: narrators.iter().map(|s| s.to_string()).collect(),
            description: String::new(),
            chapters: vec![],
            cover_url: Url::parse("file:///cover").unwrap(),
            content: ContentRef::Playlist {
                url: Url::parse("file:///list.m3u8").unwrap(),
            },
            source_url: Url::parse("file:///book").unwrap(),
            genres: vec![],
            series: None,
        }
    }

    #[test]
    fn test_substitutes_every_occurrence() {
        let path = output_path(
            "/hello/a-@author/@author/t-@title/@title",
            &book(&["author1", "author2"], &[]),
        );
        assert_eq!(path, PathBuf::from("/hello/a-author1/author1/t-title/title"));
    }

    #[test]
    fn test_missing_people_use_placeholders() {
        let path = output_path("/books/@author/@narrator/@title.m4b", &book(&[], &[]));
        assert_eq!(
            path,
            PathBuf::from("/books/Unknown author/Unknown narrator/title.m4b")
        );
    }

    #[test]
    fn test_narrator() {
        let path = output_path("@title (@narrator).m4b", &book(&["a"], &["Reader One", "Reader Two"]));
        assert_eq!(path, PathBuf::from("title (Reader One).m4b"));
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let mut b = book(&["@title"], &[]);
        b.title = "Real".into();
        let path = output_path("@author-@title", &b);
        assert_eq!(path, PathBuf::from("@title-Real"));
    }

    #[test]
    fn test_template_without_placeholders() {
        assert_eq!(
            output_path("/tmp/out.m4b", &book(&["a"], &[])),
            PathBuf::from("/tmp/out.m4b")
        );
    }
}
