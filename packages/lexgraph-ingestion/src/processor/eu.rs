//! EU document processing: EUR-Lex HTML and the local text surrogate.
//!
//! HTML is reduced to text lines (block-level tags become line breaks) and
//! fed through the same tree builder as national documents. The local text
//! format uses `[TITULO]` / `[ARTICULO]` markers plus a small header.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use lexgraph_core::domain::version::{Element, ElementType, Version};
use lexgraph_core::{Analysis, ChangeEvent, Metadata, Normativa, Source, TreeBuilder};

use crate::error::Result;

static CELEX_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1}(\d{4})([RLDC])").expect("celex pattern"));

/// Map a CELEX sector/descriptor to the document type name used as rango.
fn celex_document_type(celex: &str) -> Option<&'static str> {
    let caps = CELEX_TYPE.captures(celex)?;
    match &caps[2] {
        "R" => Some("Reglamento"),
        "L" => Some("Directiva"),
        "D" => Some("Decisión"),
        "C" => Some("Comunicación"),
        _ => None,
    }
}

pub fn process(celex: &str, content: &str) -> Result<(Normativa, Vec<ChangeEvent>)> {
    let lines = if is_text_format(content) {
        text_format_lines(content)
    } else {
        html_lines(content)
    };

    let mut metadata = Metadata::new(celex, Source::EurLex);
    metadata.rango = celex_document_type(celex).map(str::to_string);
    if metadata.titulo.is_none() {
        metadata.titulo = header_title(content, &lines);
    }

    let elements: Vec<Element> = lines
        .into_iter()
        .map(|line| Element::new(ElementType::Parrafo, line))
        .collect();
    let version = Version::new(None, None, None, elements);

    let mut builder = TreeBuilder::new(celex);
    builder.parse_versions(&[version]);
    let (tree, change_log) = builder.finish();

    info!(
        celex,
        articles = tree.article_ids().len(),
        "parsed EU document"
    );
    let normativa = Normativa::new(metadata, Analysis::default(), tree);
    Ok((normativa, change_log.into_events()))
}

/// The local surrogate starts with a `====` banner or carries block
/// markers.
fn is_text_format(content: &str) -> bool {
    let head = content
        .get(..content.len().min(2000))
        .unwrap_or(content);
    content.trim_start().starts_with("==========")
        || head.contains("[TITULO]")
        || head.contains("[ARTICULO]")
}

fn text_format_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("==========")
                && !line.starts_with("TÍTULO:")
                && !line.starts_with("TIPO:")
        })
        .map(|line| {
            line.strip_prefix("[TITULO]")
                .or_else(|| line.strip_prefix("[ARTICULO]"))
                .map(str::trim)
                .unwrap_or(line)
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn header_title(content: &str, lines: &[String]) -> Option<String> {
    for line in content.lines().take(10) {
        if let Some(title) = line.strip_prefix("TÍTULO:") {
            let title = title.trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
    }
    lines.first().cloned()
}

/// Reduce HTML to text lines: block-level closing tags become newlines,
/// every other tag is dropped, common entities are decoded.
fn html_lines(html: &str) -> Vec<String> {
    let mut text = String::with_capacity(html.len() / 2);
    let mut chars = html.char_indices().peekable();
    let mut skip_until: Option<&str> = None;

    while let Some((i, c)) = chars.next() {
        if let Some(end_tag) = skip_until {
            if c == '<' && tag_prefix(html, i).starts_with(end_tag) {
                skip_until = None;
                consume_tag(&mut chars);
            }
            continue;
        }
        if c == '<' {
            let rest = tag_prefix(html, i);
            if rest.starts_with("<script") {
                skip_until = Some("</script");
            } else if rest.starts_with("<style") {
                skip_until = Some("</style");
            } else if rest.starts_with("</p")
                || rest.starts_with("</div")
                || rest.starts_with("</h")
                || rest.starts_with("</tr")
                || rest.starts_with("</li")
                || rest.starts_with("<br")
            {
                text.push('\n');
            }
            consume_tag(&mut chars);
        } else {
            text.push(c);
        }
    }

    let text = decode_entities(&text);
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lowercased first few characters of the tag starting at `start`.
fn tag_prefix(html: &str, start: usize) -> String {
    html[start..].chars().take(9).collect::<String>().to_lowercase()
}

fn consume_tag(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    for (_, c) in chars.by_ref() {
        if c == '>' {
            break;
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
