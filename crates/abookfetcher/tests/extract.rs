//! Extraction against a captured book page.

use abookfetcher::extract::{extract_descriptor, PageCapture};
use abookfetcher::{Chapter, ContentRef, Series};
use pretty_assertions::assert_eq;
use url::Url;

const HTML: &str = include_str!("fixtures/book.html");
const PAYLOAD: &str = include_str!("fixtures/book.json");

fn capture() -> PageCapture {
    PageCapture {
        html: HTML.to_string(),
        payload: PAYLOAD.to_string(),
        locator: Url::parse("https://s01.akniga.club/b/97521/a1b2c3/list.m3u8").unwrap(),
        source_url: Url::parse("https://akniga.org/glubina-pogruzhenie-56-e").unwrap(),
    }
}

#[test]
fn test_fixture_fields() {
    let book = extract_descriptor(&capture()).unwrap();

    assert_eq!(book.title, "Глубина. Погружение 56-е");
    assert_eq!(book.authors, vec!["Андрей Иванов", "Олег Петров"]);
    assert_eq!(book.narrators, vec!["Сергей Смирнов"]);
    assert_eq!(book.genres, vec!["Ужасы, мистика", "Роман, проза"]);
    assert_eq!(
        book.series,
        Some(Series {
            name: "Глубина".into(),
            number: 56
        })
    );
    assert_eq!(
        book.description,
        "Погружение продолжается.\nЭкипаж уходит всё глубже, туда, где не бывал никто."
    );
    assert_eq!(
        book.cover_url.as_str(),
        "https://akniga.org/uploads/media/topic/2024/05/31/08/preview/fe35b1daf43cc19fae7c_400x.jpg"
    );
    assert_eq!(
        book.content,
        ContentRef::Playlist {
            url: Url::parse("https://s01.akniga.club/b/97521/a1b2c3/list.m3u8").unwrap()
        }
    );
    assert_eq!(book.source_url.as_str(), "https://akniga.org/glubina-pogruzhenie-56-e");
}

#[test]
fn test_fixture_chapters() {
    let book = extract_descriptor(&capture()).unwrap();
    assert_eq!(
        book.chapters,
        vec![
            Chapter {
                title: Some("01. Погружение".into()),
                start: 0,
                end: 1_520_000_000_000,
            },
            Chapter {
                title: Some("02. Дно".into()),
                start: 1_520_000_000_000,
                end: 3_265_000_000_000,
            },
            Chapter {
                title: Some("03. Возвращение".into()),
                start: 3_265_000_000_000,
                end: 4_468_500_000_000,
            },
        ]
    );
    assert!(book
        .chapters
        .windows(2)
        .all(|w| w[0].start <= w[1].start && w[0].end <= w[1].end));
}

#[test]
fn test_extraction_is_deterministic() {
    let first = extract_descriptor(&capture()).unwrap();
    let first_json = serde_json::to_string(&first).unwrap();
    for _ in 0..5 {
        let again = extract_descriptor(&capture()).unwrap();
        assert_eq!(again, first);
        assert_eq!(serde_json::to_string(&again).unwrap(), first_json);
    }
}

#[test]
fn test_descriptor_survives_json() {
    let book = extract_descriptor(&capture()).unwrap();
    let json = serde_json::to_value(&book).unwrap();
    assert_eq!(json["content"]["type"], "playlist");
    assert_eq!(json["series"]["number"], 56);
}
