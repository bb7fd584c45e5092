//! Spanish written-number parsing and article-number normalization.
//!
//! Article headings may spell their number out ("Artículo cincuenta y uno")
//! or use digits with thousands separators and apartado suffixes
//! ("Artículo 1.428", "Artículo 154.1"). Both forms normalize to the clean
//! number used for reference resolution.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static CARDINAL_UNITS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("cero", 0),
        ("uno", 1),
        ("un", 1),
        ("una", 1),
        ("dos", 2),
        ("tres", 3),
        ("cuatro", 4),
        ("cinco", 5),
        ("seis", 6),
        ("siete", 7),
        ("ocho", 8),
        ("nueve", 9),
        ("diez", 10),
        ("once", 11),
        ("doce", 12),
        ("trece", 13),
        ("catorce", 14),
        ("quince", 15),
        ("dieciséis", 16),
        ("dieciseis", 16),
        ("diecisiete", 17),
        ("dieciocho", 18),
        ("diecinueve", 19),
        ("veinte", 20),
        ("veintiuno", 21),
        ("veintiún", 21),
        ("veintidós", 22),
        ("veintidos", 22),
        ("veintitrés", 23),
        ("veintitres", 23),
        ("veinticuatro", 24),
        ("veinticinco", 25),
        ("veintiséis", 26),
        ("veintiseis", 26),
        ("veintisiete", 27),
        ("veintiocho", 28),
        ("veintinueve", 29),
    ])
});

static CARDINAL_TENS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("treinta", 30),
        ("cuarenta", 40),
        ("cincuenta", 50),
        ("sesenta", 60),
        ("setenta", 70),
        ("ochenta", 80),
        ("noventa", 90),
    ])
});

static CARDINAL_HUNDREDS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("cien", 100),
        ("ciento", 100),
        ("doscientos", 200),
        ("doscientas", 200),
        ("trescientos", 300),
        ("trescientas", 300),
        ("cuatrocientos", 400),
        ("cuatrocientas", 400),
        ("quinientos", 500),
        ("quinientas", 500),
        ("seiscientos", 600),
        ("seiscientas", 600),
        ("setecientos", 700),
        ("setecientas", 700),
        ("ochocientos", 800),
        ("ochocientas", 800),
        ("novecientos", 900),
        ("novecientas", 900),
    ])
});

static ORDINAL_UNITS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("primero", 1),
        ("primera", 1),
        ("primer", 1),
        ("segundo", 2),
        ("segunda", 2),
        ("tercero", 3),
        ("tercera", 3),
        ("tercer", 3),
        ("cuarto", 4),
        ("cuarta", 4),
        ("quinto", 5),
        ("quinta", 5),
        ("sexto", 6),
        ("sexta", 6),
        ("séptimo", 7),
        ("septimo", 7),
        ("séptima", 7),
        ("septima", 7),
        ("octavo", 8),
        ("octava", 8),
        ("noveno", 9),
        ("novena", 9),
        ("décimo", 10),
        ("decimo", 10),
        ("décima", 10),
        ("decima", 10),
    ])
});

static ORDINAL_TENS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("undécimo", 11),
        ("undecimo", 11),
        ("undécima", 11),
        ("undecima", 11),
        ("duodécimo", 12),
        ("duodecimo", 12),
        ("duodécima", 12),
        ("duodecima", 12),
        ("decimotercero", 13),
        ("decimotercera", 13),
        ("decimocuarto", 14),
        ("decimocuarta", 14),
        ("decimoquinto", 15),
        ("decimoquinta", 15),
        ("decimosexto", 16),
        ("decimosexta", 16),
        ("decimoséptimo", 17),
        ("decimoseptimo", 17),
        ("decimoséptima", 17),
        ("decimoseptima", 17),
        ("decimoctavo", 18),
        ("decimoctava", 18),
        ("decimonoveno", 19),
        ("decimonovena", 19),
        ("vigésimo", 20),
        ("vigesimo", 20),
        ("vigésima", 20),
        ("vigesima", 20),
        ("trigésimo", 30),
        ("trigesimo", 30),
        ("trigésima", 30),
        ("trigesima", 30),
        ("cuadragésimo", 40),
        ("cuadragesimo", 40),
        ("cuadragésima", 40),
        ("cuadragesima", 40),
        ("quincuagésimo", 50),
        ("quincuagesimo", 50),
        ("quincuagésima", 50),
        ("quincuagesima", 50),
        ("sexagésimo", 60),
        ("sexagesimo", 60),
        ("sexagésima", 60),
        ("sexagesima", 60),
        ("septuagésimo", 70),
        ("septuagesimo", 70),
        ("septuagésima", 70),
        ("septuagesima", 70),
        ("octogésimo", 80),
        ("octogesimo", 80),
        ("octogésima", 80),
        ("octogesima", 80),
        ("nonagésimo", 90),
        ("nonagesimo", 90),
        ("nonagésima", 90),
        ("nonagesima", 90),
        ("centésimo", 100),
        ("centesimo", 100),
        ("centésima", 100),
        ("centesima", 100),
    ])
});

fn parse_cardinal(text: &str) -> Option<u32> {
    let text = text.to_lowercase().replace('_', " ");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(v) = CARDINAL_UNITS.get(text) {
        return Some(*v);
    }
    if let Some(v) = CARDINAL_TENS.get(text) {
        return Some(*v);
    }
    if let Some(v) = CARDINAL_HUNDREDS.get(text) {
        return Some(*v);
    }

    let mut total = 0u32;
    let mut remaining = text;

    // "ciento" must win over its prefix "cien".
    let mut hundreds: Vec<&&str> = CARDINAL_HUNDREDS.keys().collect();
    hundreds.sort_by_key(|w| std::cmp::Reverse(w.len()));
    for word in hundreds {
        if remaining.starts_with(*word) {
            total += CARDINAL_HUNDREDS[*word];
            remaining = remaining[word.len()..].trim_start();
            break;
        }
    }

    if !remaining.is_empty() {
        if let Some(v) = CARDINAL_UNITS.get(remaining) {
            total += v;
            remaining = "";
        } else if let Some(v) = CARDINAL_TENS.get(remaining) {
            total += v;
            remaining = "";
        } else {
            for (word, value) in CARDINAL_TENS.iter() {
                if remaining.starts_with(word) {
                    total += value;
                    remaining = remaining[word.len()..].trim_start();
                    if let Some(rest) = remaining.strip_prefix("y ") {
                        remaining = rest.trim_start();
                    }
                    break;
                }
            }
            if !remaining.is_empty() {
                if let Some(v) = CARDINAL_UNITS.get(remaining) {
                    total += v;
                    remaining = "";
                }
            }
        }
    }

    if remaining.is_empty() && total > 0 {
        Some(total)
    } else {
        None
    }
}

fn parse_ordinal(text: &str) -> Option<u32> {
    let text = text.to_lowercase().replace('_', " ");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(v) = ORDINAL_UNITS.get(text) {
        return Some(*v);
    }
    if let Some(v) = ORDINAL_TENS.get(text) {
        return Some(*v);
    }

    // Compound ordinals: "vigésimo primero" -> 21.
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() == 2 {
        let tens = ORDINAL_TENS.get(parts[0])?;
        let unit = ORDINAL_UNITS.get(parts[1])?;
        if *tens >= 20 {
            return Some(tens + unit);
        }
    }

    None
}

/// Convert a Spanish written number (cardinal or ordinal) to an integer.
///
/// `"cincuenta y uno"` -> 51, `"ciento veintisiete"` -> 127,
/// `"primera"` -> 1, `"vigésimo tercero"` -> 23.
pub fn spanish_words_to_number(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    parse_cardinal(text).or_else(|| parse_ordinal(text))
}

static NUMERIC_ARTICLE: Lazy<Regex> = Lazy::new(|| {
    // 3-digit dot groups are thousands separators and are kept; shorter dot
    // suffixes are apartados and are dropped.
    Regex::new(r"(?i)(\d+(?:\.\d{3})*)(?:\s*(bis|ter|quater|quinquies|sexies|septies|octies|novies))?")
        .expect("numeric article pattern")
});

static ARTICLE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Artículo|Articulo|Art\.?)\s+(.+?)(?:\s*\.\s*|$)")
        .expect("article prefix pattern")
});

/// Extract and normalize the article number from an article name.
///
/// `"Artículo 14"` -> `"14"`, `"Art. 1 bis"` -> `"1 bis"`,
/// `"Artículo 154.1"` -> `"154"`, `"Artículo cincuenta y uno"` -> `"51"`.
/// Returns `None` for names that carry no number.
pub fn normalize_article_number(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    if let Some(caps) = NUMERIC_ARTICLE.captures(name) {
        let num = caps.get(1).map(|m| m.as_str().replace('.', ""))?;
        return Some(match caps.get(2) {
            Some(suffix) => format!("{} {}", num, suffix.as_str().to_lowercase()),
            None => num,
        });
    }

    if let Some(caps) = ARTICLE_PREFIX.captures(name) {
        if let Some(v) = spanish_words_to_number(caps.get(1).map(|m| m.as_str())?) {
            return Some(v.to_string());
        }
    }

    // Name may already be just the written number (underscored or not).
    spanish_words_to_number(name).map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_cardinals() {
        assert_eq!(spanish_words_to_number("uno"), Some(1));
        assert_eq!(spanish_words_to_number("veinte"), Some(20));
        assert_eq!(spanish_words_to_number("cincuenta"), Some(50));
        assert_eq!(spanish_words_to_number("cien"), Some(100));
    }

    #[test]
    fn test_compound_cardinals() {
        assert_eq!(spanish_words_to_number("treinta y uno"), Some(31));
        assert_eq!(spanish_words_to_number("cincuenta y uno"), Some(51));
        assert_eq!(spanish_words_to_number("ciento veintisiete"), Some(127));
        assert_eq!(spanish_words_to_number("doscientos cuarenta y cinco"), Some(245));
    }

    #[test]
    fn test_underscored_forms() {
        assert_eq!(spanish_words_to_number("cincuenta_y_uno"), Some(51));
        assert_eq!(spanish_words_to_number("ciento_veintisiete"), Some(127));
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(spanish_words_to_number("primero"), Some(1));
        assert_eq!(spanish_words_to_number("primera"), Some(1));
        assert_eq!(spanish_words_to_number("décimo"), Some(10));
        assert_eq!(spanish_words_to_number("vigésimo tercero"), Some(23));
    }

    #[test]
    fn test_not_a_number() {
        assert_eq!(spanish_words_to_number("adicional"), None);
        assert_eq!(spanish_words_to_number(""), None);
    }

    #[test]
    fn test_normalize_numeric_forms() {
        assert_eq!(normalize_article_number("Artículo 14").as_deref(), Some("14"));
        assert_eq!(normalize_article_number("Art. 1 bis").as_deref(), Some("1 bis"));
        assert_eq!(normalize_article_number("Artículo 154.1").as_deref(), Some("154"));
        assert_eq!(normalize_article_number("Artículo 1.428").as_deref(), Some("1428"));
        assert_eq!(normalize_article_number("544 ter").as_deref(), Some("544 ter"));
    }

    #[test]
    fn test_normalize_written_forms() {
        assert_eq!(
            normalize_article_number("Artículo cincuenta y uno").as_deref(),
            Some("51")
        );
        assert_eq!(
            normalize_article_number("Artículo ciento veintisiete").as_deref(),
            Some("127")
        );
        assert_eq!(normalize_article_number("Artículo primero").as_deref(), Some("1"));
        assert_eq!(normalize_article_number("cincuenta_y_uno").as_deref(), Some("51"));
    }

    #[test]
    fn test_normalize_non_articles() {
        assert_eq!(normalize_article_number("Disposición adicional"), None);
        assert_eq!(normalize_article_number(""), None);
    }

    proptest! {
        #[test]
        fn test_normalize_is_idempotent(n in 1u32..2000, bis in proptest::bool::ANY) {
            let name = if bis {
                format!("Artículo {n} bis")
            } else {
                format!("Artículo {n}")
            };
            let once = normalize_article_number(&name).unwrap();
            let twice = normalize_article_number(&once).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
