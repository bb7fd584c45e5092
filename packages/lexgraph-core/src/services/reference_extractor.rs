//! Extraction of legal citations from Spanish legal text.
//!
//! Follows the citation conventions of the "Directrices de técnica
//! normativa": constitution and statutes of autonomy, state laws and
//! delegated legislation, regulations and orders, judicial decisions,
//! EU legislation and treaties, abbreviated law references (LOPJ, CC, CP)
//! and internal article references including ranges and relative forms.
//!
//! Patterns are applied in priority order; a later pattern never claims a
//! span that overlaps an already-accepted reference. The extractor holds no
//! mutable state and is safe to share across workers.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Classification of legal reference types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Internal,
    Constitution,
    OrganicLaw,
    Law,
    RoyalDecreeLaw,
    LegislativeDecree,
    RoyalDecree,
    Order,
    StatuteOfAutonomy,
    Code,
    Judicial,
    Abbreviated,
    EuLegislation,
    EuTreaty,
    Unknown,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Internal => "internal",
            ReferenceType::Constitution => "constitution",
            ReferenceType::OrganicLaw => "organic_law",
            ReferenceType::Law => "law",
            ReferenceType::RoyalDecreeLaw => "royal_decree_law",
            ReferenceType::LegislativeDecree => "legislative_decree",
            ReferenceType::RoyalDecree => "royal_decree",
            ReferenceType::Order => "order",
            ReferenceType::StatuteOfAutonomy => "statute_of_autonomy",
            ReferenceType::Code => "code",
            ReferenceType::Judicial => "judicial",
            ReferenceType::Abbreviated => "abbreviated",
            ReferenceType::EuLegislation => "eu_legislation",
            ReferenceType::EuTreaty => "eu_treaty",
            ReferenceType::Unknown => "unknown",
        }
    }
}

/// A single extracted legal reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedReference {
    pub raw_text: String,
    pub reference_type: ReferenceType,
    /// Base article number: "143", "53", "10 bis".
    pub article_number: Option<String>,
    /// Subsection, when one is captured separately.
    pub apartado: Option<String>,
    /// For "artículos 5 a 12".
    pub article_range: Option<(String, String)>,
    /// e.g. "Ley Orgánica", "Real Decreto".
    pub law_type: Option<String>,
    /// e.g. "10/1995".
    pub law_number: Option<String>,
    /// e.g. "CE", "LOPJ".
    pub abbreviation: Option<String>,
    /// e.g. "STC", "STS".
    pub judicial_court: Option<String>,
    /// e.g. "1234/2020".
    pub judicial_number: Option<String>,
    pub is_external: bool,
    /// Target document id when the reference could be resolved.
    pub resolved_doc_id: Option<String>,
    /// Byte offsets into the source text.
    pub start_pos: usize,
    pub end_pos: usize,
}

impl ExtractedReference {
    fn new(raw_text: &str, reference_type: ReferenceType, start: usize, end: usize) -> Self {
        Self {
            raw_text: raw_text.to_string(),
            reference_type,
            article_number: None,
            apartado: None,
            article_range: None,
            law_type: None,
            law_number: None,
            abbreviation: None,
            judicial_court: None,
            judicial_number: None,
            is_external: true,
            resolved_doc_id: None,
            start_pos: start,
            end_pos: end,
        }
    }
}

/// Result of reference extraction from one text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_document_id: String,
    pub references: Vec<ExtractedReference>,
    pub unresolved_references: Vec<ExtractedReference>,
    pub extraction_timestamp: DateTime<Utc>,
}

const MONTHS: &str =
    "(?:enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)";

// Distinguishes thousands separators from apartados: "1.428" is captured as
// is (3 digits after the dot), "12.2" captures only "12".
const ARTICLE_NUM: &str = r"(?P<article_num>\d+(?:\.\d{3})*(?:\s*(?:bis|ter|qu[aá]ter|quinquies|sexies|septies|octies))?)(?:[\.,]\d{1,2})*(?:[\.,][ªº]|º|ª)?";

const BASE_ARTICLE: &str = r"\d+(?:\s*(?:bis|ter|qu[aá]ter|quinquies|sexies|septies|octies))?";

static FULL_LAW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<law_type>Ley\s+Org[aá]nica|Real\s+Decreto-ley|Real\s+Decreto\s+Legislativo|Decreto\s+Legislativo|Real\s+Decreto|Decreto-ley|Decreto|Ley|Orden\s+(?:Ministerial\s+)?(?:[A-Z]{{3}}/)?)\s*(?P<law_number>\d{{1,4}}/\d{{4}})(?:,?\s*de\s+\d{{1,2}}\s+de\s+{MONTHS})?"
    ))
    .expect("full law pattern")
});

static ARTICLE_WITH_LAW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:art[íi]culo|art\.?)\s*{ARTICLE_NUM}\s+(?:de\s+)?(?:la\s+|el\s+|los\s+|las\s+|del\s+)?(?P<law_ref>Constituci[oó]n(?:\s+Espa[nñ]ola)?|C[oó]digo\s+(?:Civil|Penal|de\s+Comercio)|Ley\s+de\s+Enjuiciamiento\s+(?:Civil|Criminal)|Estatuto\s+de\s+(?:los\s+)?Trabajadores|Estatuto\s+de\s+(?:Autonom[ií]a\s+)?(?:de\s+)?[A-ZÁÉÍÓÚ][a-záéíóúñ]+|(?:Ley\s+Org[aá]nica|Real\s+Decreto(?:-ley)?|Decreto(?:-ley)?|Ley)\s+\d{{1,4}}/\d{{4}})"
    ))
    .expect("article with law pattern")
});

// Case-sensitive: abbreviations are uppercase tokens. Tokens inside
// parentheses like "Reglamento (CE)" must not match; the regex engine has
// no look-behind, so the preceding byte is checked at extraction time.
static ABBREVIATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:(?:[Aa]rt[íi]culo|[Aa]rts?\.?)\s*{ARTICLE_NUM}(?:\s+(?:[Dd]el?\s+)?(?:la\s+|el\s+)?)?)?\b(?P<abbreviation>CE|CC|CP|ET|LECrim|LECr|LEC|LOPJ|LOTC|LOREG|LPAC|LRJSP|LJCA|LGT|LIRPF|LIS|LIVA|LPH|LAU|LH|LSC|LGSS|LOPDGDD|LOPD|EA)\b"
    ))
    .expect("abbreviated pattern")
});

static INTERNAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:el\s+|la\s+|los\s+|las\s+|en\s+el\s+|en\s+los\s+|del\s+)?(?:art[íi]culos?|arts?\.?)\s*(?:(?P<range_start>{BASE_ARTICLE})\s*(?:a|al)\s+(?P<range_end>{BASE_ARTICLE})|(?P<relative>anterior|siguiente|precedente)|(?P<single>{BASE_ARTICLE}))(?:[,\.\s]+\d+[ºª\.]?)?(?:\s+(?:de\s+)?(?:esta|este|la\s+presente|el\s+presente)\s+(?:Ley|Real\s+Decreto|Decreto|Orden|Reglamento|Código|Constitución))?"
    ))
    .expect("internal pattern")
});

static JUDICIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?P<court>STC|STSJ|STS|SAN|SAP|SJPI|ATC|ATS)\s*(?P<decision_number>\d+/\d{{4}})(?:,?\s*de\s+\d{{1,2}}\s+de\s+{MONTHS})?"
    ))
    .expect("judicial pattern")
});

static EU_LEGISLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<eu_type>Directiva|Reglamento|Decisi[oó]n)\s*(?:\([A-Z]+\)\s*)?(?:n\.?º?\s*)?(?P<eu_number>\d{2,4}/\d+(?:/[A-Z]+)?)",
    )
    .expect("eu legislation pattern")
});

static EU_TREATY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:(?:los\s+)?(?:art[íi]culos?|arts?\.?)\s*(?P<article_list>\d+(?:\s*(?:,|y)\s*\d+)*)\s+)?(?:del?\s+)?(?P<treaty_name>Tratado\s+de\s+Funcionamiento\s+de\s+la\s+Uni[oó]n\s+Europea|Tratado\s+de\s+la\s+Uni[oó]n\s+Europea|TFUE|TUE)\b",
    )
    .expect("eu treaty pattern")
});

static CITED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:la\s+|el\s+)?(?:citad[ao]|mencionad[ao]|referid[ao]|expresad[ao])\s+(?P<cited_law_type>Ley\s+Org[aá]nica|Real\s+Decreto(?:-ley)?|Decreto(?:-ley)?|Ley|Orden|Constituci[oó]n)(?:\s+(?P<cited_number>\d{1,4}/\d{4}))?",
    )
    .expect("cited pattern")
});

/// Well-known laws by abbreviation or normalized `{type} {number}` key.
static KNOWN_LAWS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Constitution
        ("ce", "BOE-A-1978-31229"),
        ("constitución", "BOE-A-1978-31229"),
        ("constitución española", "BOE-A-1978-31229"),
        // Major codes
        ("cc", "BOE-A-1889-4763"),
        ("código civil", "BOE-A-1889-4763"),
        ("cp", "BOE-A-1995-25444"),
        ("código penal", "BOE-A-1995-25444"),
        ("c. de c.", "BOE-A-1885-6627"),
        ("código de comercio", "BOE-A-1885-6627"),
        // Procedural laws
        ("lec", "BOE-A-2000-323"),
        ("ley de enjuiciamiento civil", "BOE-A-2000-323"),
        ("lecrim", "BOE-A-1882-6036"),
        ("lecr", "BOE-A-1882-6036"),
        ("ley de enjuiciamiento criminal", "BOE-A-1882-6036"),
        // Organic laws
        ("lopj", "BOE-A-1985-12666"),
        ("ley orgánica del poder judicial", "BOE-A-1985-12666"),
        ("lo 6/1985", "BOE-A-1985-12666"),
        ("lotc", "BOE-A-1979-23709"),
        ("ley orgánica del tribunal constitucional", "BOE-A-1979-23709"),
        ("loreg", "BOE-A-1985-11672"),
        ("ley orgánica del régimen electoral general", "BOE-A-1985-11672"),
        ("lopdgdd", "BOE-A-2018-16673"),
        ("lopd", "BOE-A-2018-16673"),
        // Administrative law
        ("lpac", "BOE-A-2015-10565"),
        ("l 39/2015", "BOE-A-2015-10565"),
        ("lrjsp", "BOE-A-2015-10566"),
        ("l 40/2015", "BOE-A-2015-10566"),
        ("ljca", "BOE-A-1998-16718"),
        // Labor law
        ("et", "BOE-A-2015-11430"),
        ("estatuto de los trabajadores", "BOE-A-2015-11430"),
        ("lgss", "BOE-A-2015-11724"),
        ("ley general de la seguridad social", "BOE-A-2015-11724"),
        // Tax law
        ("lgt", "BOE-A-2003-23186"),
        ("ley general tributaria", "BOE-A-2003-23186"),
        ("lirpf", "BOE-A-2006-20764"),
        ("lis", "BOE-A-2014-12328"),
        ("liva", "BOE-A-1992-28740"),
        // Other frequently cited laws
        ("lph", "BOE-A-1960-10906"),
        ("ley de propiedad horizontal", "BOE-A-1960-10906"),
        ("lau", "BOE-A-1994-26003"),
        ("ley de arrendamientos urbanos", "BOE-A-1994-26003"),
        ("lh", "BOE-A-1946-2453"),
        ("ley hipotecaria", "BOE-A-1946-2453"),
        ("lsc", "BOE-A-2010-10544"),
        ("ley de sociedades de capital", "BOE-A-2010-10544"),
    ])
});

/// Extracts legal references from Spanish legal text.
#[derive(Debug, Default, Clone)]
pub struct ReferenceExtractor;

impl ReferenceExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract all references from `text` in priority order.
    ///
    /// `current_article_number` resolves relative forms ("artículo
    /// anterior"); `current_document_id` marks internal references as
    /// resolved against the containing document.
    pub fn extract(
        &self,
        text: &str,
        source_document_id: &str,
        current_document_id: Option<&str>,
        current_article_number: Option<&str>,
    ) -> ExtractionResult {
        let mut references: Vec<ExtractedReference> = Vec::new();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        let overlaps = |claimed: &[(usize, usize)], start: usize, end: usize| {
            claimed.iter().any(|&(s, e)| start < e && end > s)
        };
        let add = |claimed: &mut Vec<(usize, usize)>,
                       references: &mut Vec<ExtractedReference>,
                       reference: ExtractedReference| {
            if !overlaps(claimed, reference.start_pos, reference.end_pos) {
                claimed.push((reference.start_pos, reference.end_pos));
                references.push(reference);
            }
        };

        // 1. Article with external law (before full law to own the span).
        for caps in ARTICLE_WITH_LAW.captures_iter(text) {
            add(&mut claimed, &mut references, parse_article_with_law(&caps));
        }
        // 2. EU legislation (before abbreviated to handle the /CE suffix).
        for caps in EU_LEGISLATION.captures_iter(text) {
            add(&mut claimed, &mut references, parse_eu(&caps));
        }
        // 2b. EU treaties.
        for caps in EU_TREATY.captures_iter(text) {
            add(&mut claimed, &mut references, parse_eu_treaty(&caps));
        }
        // 3. Judicial decisions.
        for caps in JUDICIAL.captures_iter(text) {
            add(&mut claimed, &mut references, parse_judicial(&caps));
        }
        // 4. Full law citations.
        for caps in FULL_LAW.captures_iter(text) {
            add(&mut claimed, &mut references, parse_full_law(&caps));
        }
        // 5. Abbreviated references. Skip abbreviations sitting inside a
        // parenthesized token like "(CE)".
        for caps in ABBREVIATED.captures_iter(text) {
            let abbrev = caps.name("abbreviation").expect("abbreviation group");
            if text[..abbrev.start()].ends_with('(') {
                continue;
            }
            add(&mut claimed, &mut references, parse_abbreviated(&caps));
        }
        // 6. Cited/mentioned back-references.
        for caps in CITED.captures_iter(text) {
            add(&mut claimed, &mut references, parse_cited(&caps));
        }
        // 7. Internal references: only spans not already captured.
        for caps in INTERNAL.captures_iter(text) {
            let whole = caps.get(0).expect("match");
            if overlaps(&claimed, whole.start(), whole.end()) {
                continue;
            }
            add(
                &mut claimed,
                &mut references,
                parse_internal(&caps, current_document_id, current_article_number),
            );
        }

        for reference in &mut references {
            try_resolve(reference);
        }
        let unresolved: Vec<ExtractedReference> = references
            .iter()
            .filter(|r| r.is_external && r.resolved_doc_id.is_none())
            .cloned()
            .collect();

        debug!(
            source = source_document_id,
            found = references.len(),
            unresolved = unresolved.len(),
            "reference extraction"
        );

        ExtractionResult {
            source_document_id: source_document_id.to_string(),
            references,
            unresolved_references: unresolved,
            extraction_timestamp: Utc::now(),
        }
    }
}

fn whole(caps: &regex::Captures<'_>) -> (String, usize, usize) {
    let m = caps.get(0).expect("match");
    (m.as_str().to_string(), m.start(), m.end())
}

fn parse_full_law(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let law_type = caps["law_type"].trim().to_string();
    let mut reference =
        ExtractedReference::new(&raw, classify_law_type(&law_type), start, end);
    reference.law_type = Some(law_type);
    reference.law_number = Some(caps["law_number"].to_string());
    reference
}

fn parse_judicial(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let mut reference = ExtractedReference::new(&raw, ReferenceType::Judicial, start, end);
    reference.judicial_court = Some(caps["court"].to_string());
    reference.judicial_number = Some(caps["decision_number"].to_string());
    reference
}

fn parse_eu(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let mut reference = ExtractedReference::new(&raw, ReferenceType::EuLegislation, start, end);
    reference.law_type = Some(caps["eu_type"].to_string());
    reference.law_number = Some(caps["eu_number"].to_string());
    reference
}

fn parse_eu_treaty(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let treaty = caps["treaty_name"].to_lowercase();
    let abbrev = if treaty.contains("funcionamiento") {
        "TFUE".to_string()
    } else if treaty.contains("unión") || treaty.contains("union") {
        "TUE".to_string()
    } else {
        caps["treaty_name"].to_uppercase()
    };
    let mut reference = ExtractedReference::new(&raw, ReferenceType::EuTreaty, start, end);
    reference.article_number = caps.name("article_list").map(|m| m.as_str().to_string());
    reference.abbreviation = Some(abbrev);
    reference
}

fn parse_article_with_law(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let law_ref = caps["law_ref"].to_lowercase();

    let reference_type = if law_ref.contains("constitució") || law_ref.contains("constitucio") {
        ReferenceType::Constitution
    } else if law_ref.contains("código") || law_ref.contains("codigo") {
        ReferenceType::Code
    } else if law_ref.contains("estatuto") {
        if law_ref.contains("autonomía") || law_ref.contains("autonomia") {
            ReferenceType::StatuteOfAutonomy
        } else {
            // Estatuto de los Trabajadores.
            ReferenceType::Law
        }
    } else if law_ref.contains("ley orgánica") || law_ref.contains("ley organica") {
        ReferenceType::OrganicLaw
    } else {
        ReferenceType::Law
    };

    let mut reference = ExtractedReference::new(&raw, reference_type, start, end);
    reference.article_number = caps.name("article_num").map(|m| m.as_str().to_string());
    reference.law_type = Some(caps["law_ref"].to_string());
    reference
}

fn parse_abbreviated(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let abbrev = caps["abbreviation"].to_uppercase();

    let reference_type = match abbrev.as_str() {
        "CE" => ReferenceType::Constitution,
        "CC" | "CP" => ReferenceType::Code,
        "ET" => ReferenceType::Law,
        "EA" => ReferenceType::StatuteOfAutonomy,
        a if a.starts_with("LO") => ReferenceType::OrganicLaw,
        a if a.starts_with('L') => ReferenceType::Law,
        _ => ReferenceType::Abbreviated,
    };

    let mut reference = ExtractedReference::new(&raw, reference_type, start, end);
    reference.article_number = caps.name("article_num").map(|m| m.as_str().to_string());
    reference.abbreviation = Some(abbrev);
    reference
}

fn parse_cited(caps: &regex::Captures<'_>) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let law_type = caps["cited_law_type"].trim().to_string();
    let mut reference =
        ExtractedReference::new(&raw, classify_law_type(&law_type), start, end);
    reference.law_type = Some(law_type);
    reference.law_number = caps.name("cited_number").map(|m| m.as_str().to_string());
    reference
}

fn parse_internal(
    caps: &regex::Captures<'_>,
    current_document_id: Option<&str>,
    current_article_number: Option<&str>,
) -> ExtractedReference {
    let (raw, start, end) = whole(caps);
    let mut reference = ExtractedReference::new(&raw, ReferenceType::Internal, start, end);
    reference.is_external = false;

    if let (Some(range_start), Some(range_end)) = (caps.name("range_start"), caps.name("range_end"))
    {
        reference.article_range = Some((
            range_start.as_str().to_string(),
            range_end.as_str().to_string(),
        ));
    } else if let Some(relative) = caps.name("relative") {
        let relative = relative.as_str().to_lowercase();
        match current_article_number.and_then(|n| n.parse::<i64>().ok()) {
            Some(current) => {
                reference.article_number = Some(match relative.as_str() {
                    "siguiente" => (current + 1).to_string(),
                    _ => (current - 1).to_string(),
                });
            }
            // Unresolvable relative form: keep the word itself.
            None => reference.article_number = Some(relative),
        }
    } else if let Some(single) = caps.name("single") {
        reference.article_number = Some(single.as_str().to_string());
    }

    if let (Some(doc_id), Some(num)) = (current_document_id, reference.article_number.as_deref()) {
        if !matches!(num, "anterior" | "siguiente" | "precedente") {
            reference.resolved_doc_id = Some(doc_id.to_string());
        }
    }

    reference
}

fn classify_law_type(law_type: &str) -> ReferenceType {
    let lt = law_type.to_lowercase();
    if lt.contains("orgánica") || lt.contains("organica") {
        ReferenceType::OrganicLaw
    } else if lt.contains("decreto-ley") || lt.contains("decreto ley") {
        ReferenceType::RoyalDecreeLaw
    } else if lt.contains("decreto legislativo") {
        ReferenceType::LegislativeDecree
    } else if lt.contains("real decreto") || lt.contains("decreto") {
        ReferenceType::RoyalDecree
    } else if lt.contains("orden") {
        ReferenceType::Order
    } else if lt.contains("constitución") || lt.contains("constitucion") {
        ReferenceType::Constitution
    } else if lt.contains("ley") {
        ReferenceType::Law
    } else {
        ReferenceType::Unknown
    }
}

fn abbreviate_law_type(law_type: &str) -> String {
    let lt = law_type.to_lowercase();
    if lt.contains("ley orgánica") || lt.contains("ley organica") {
        "lo".to_string()
    } else if lt.contains("real decreto-ley") {
        "rdl".to_string()
    } else if lt.contains("decreto legislativo") {
        "rdleg".to_string()
    } else if lt.contains("real decreto") {
        "rd".to_string()
    } else if lt.contains("decreto") {
        "d".to_string()
    } else if lt.contains("orden") {
        "o".to_string()
    } else if lt.contains("ley") {
        "l".to_string()
    } else {
        lt.trim().to_string()
    }
}

/// Attempt to resolve an external reference to a known document id.
fn try_resolve(reference: &mut ExtractedReference) {
    if !reference.is_external || reference.resolved_doc_id.is_some() {
        return;
    }

    if let Some(abbrev) = &reference.abbreviation {
        if let Some(id) = KNOWN_LAWS.get(abbrev.to_lowercase().as_str()) {
            reference.resolved_doc_id = Some((*id).to_string());
            return;
        }
    }

    if let (Some(law_type), Some(law_number)) = (&reference.law_type, &reference.law_number) {
        let key = format!("{} {}", abbreviate_law_type(law_type), law_number).to_lowercase();
        if let Some(id) = KNOWN_LAWS.get(key.as_str()) {
            reference.resolved_doc_id = Some((*id).to_string());
            return;
        }
    }

    if let Some(law_type) = &reference.law_type {
        if let Some(id) = KNOWN_LAWS.get(law_type.to_lowercase().trim()) {
            reference.resolved_doc_id = Some((*id).to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ExtractionResult {
        ReferenceExtractor::new().extract(text, "test-doc", None, None)
    }

    #[test]
    fn test_constitution_and_code_references() {
        let result = extract(
            "de acuerdo con el artículo 14 de la Constitución Española y el artículo 1902 del Código Civil",
        );
        assert_eq!(result.references.len(), 2);

        let types: Vec<ReferenceType> =
            result.references.iter().map(|r| r.reference_type).collect();
        assert!(types.contains(&ReferenceType::Constitution));
        assert!(types.contains(&ReferenceType::Code));

        let numbers: Vec<&str> = result
            .references
            .iter()
            .filter_map(|r| r.article_number.as_deref())
            .collect();
        assert!(numbers.contains(&"14"));
        assert!(numbers.contains(&"1902"));
    }

    #[test]
    fn test_full_law_citation() {
        let result = extract("según la Ley Orgánica 10/1995, de 23 de noviembre");
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(r.reference_type, ReferenceType::OrganicLaw);
        assert_eq!(r.law_number.as_deref(), Some("10/1995"));
    }

    #[test]
    fn test_abbreviated_reference() {
        let result = extract("tal como dispone el art. 24 CE sobre tutela judicial");
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(r.reference_type, ReferenceType::Constitution);
        assert_eq!(r.abbreviation.as_deref(), Some("CE"));
        assert_eq!(r.article_number.as_deref(), Some("24"));
        assert_eq!(r.resolved_doc_id.as_deref(), Some("BOE-A-1978-31229"));
    }

    #[test]
    fn test_parenthesized_abbreviation_is_not_matched() {
        let result = extract("el Reglamento (CE) n.º 1221/2009 del Parlamento");
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].reference_type, ReferenceType::EuLegislation);
        assert_eq!(result.references[0].law_number.as_deref(), Some("1221/2009"));
    }

    #[test]
    fn test_judicial_reference() {
        let result = extract("como declaró la STC 31/2010, de 28 de junio");
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(r.reference_type, ReferenceType::Judicial);
        assert_eq!(r.judicial_court.as_deref(), Some("STC"));
        assert_eq!(r.judicial_number.as_deref(), Some("31/2010"));
    }

    #[test]
    fn test_eu_treaty_reference() {
        let result =
            extract("los artículos 101 y 102 del Tratado de Funcionamiento de la Unión Europea");
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(r.reference_type, ReferenceType::EuTreaty);
        assert_eq!(r.abbreviation.as_deref(), Some("TFUE"));
        assert_eq!(r.article_number.as_deref(), Some("101 y 102"));
    }

    #[test]
    fn test_internal_reference_with_apartado_dropped() {
        let result = extract("según el artículo 143.2 de esta Ley");
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(r.reference_type, ReferenceType::Internal);
        assert!(!r.is_external);
        assert_eq!(r.article_number.as_deref(), Some("143"));
    }

    #[test]
    fn test_internal_range() {
        let result = extract("lo dispuesto en los artículos 5 a 12");
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(
            r.article_range,
            Some(("5".to_string(), "12".to_string()))
        );
    }

    #[test]
    fn test_relative_reference_resolution() {
        let extractor = ReferenceExtractor::new();
        let result = extractor.extract(
            "como se vio en el artículo anterior",
            "BOE-A-2000-1-n7",
            Some("BOE-A-2000-1"),
            Some("7"),
        );
        assert_eq!(result.references.len(), 1);
        let r = &result.references[0];
        assert_eq!(r.reference_type, ReferenceType::Internal);
        assert_eq!(r.article_number.as_deref(), Some("6"));
        assert_eq!(r.resolved_doc_id.as_deref(), Some("BOE-A-2000-1"));
    }

    #[test]
    fn test_relative_reference_unresolvable_keeps_word() {
        let result = extract("como se vio en el artículo anterior");
        assert_eq!(result.references.len(), 1);
        assert_eq!(
            result.references[0].article_number.as_deref(),
            Some("anterior")
        );
        assert!(result.references[0].resolved_doc_id.is_none());
    }

    #[test]
    fn test_no_overlapping_spans() {
        let result = extract(
            "el artículo 14 de la Constitución Española, la Ley Orgánica 6/1985 y el art. 24 CE",
        );
        let mut spans: Vec<(usize, usize)> = result
            .references
            .iter()
            .map(|r| (r.start_pos, r.end_pos))
            .collect();
        spans.sort();
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping spans: {pair:?}");
        }
    }

    #[test]
    fn test_known_law_resolution_by_type_and_number() {
        let result = extract("la Ley Orgánica 6/1985, de 1 de julio");
        assert_eq!(result.references.len(), 1);
        assert_eq!(
            result.references[0].resolved_doc_id.as_deref(),
            Some("BOE-A-1985-12666")
        );
        assert!(result.unresolved_references.is_empty());
    }

    #[test]
    fn test_unknown_law_is_unresolved() {
        let result = extract("la Ley 99/1901 no existe");
        assert_eq!(result.references.len(), 1);
        assert!(result.references[0].resolved_doc_id.is_none());
        assert_eq!(result.unresolved_references.len(), 1);
    }

    #[test]
    fn test_cited_back_reference() {
        let result = extract("conforme a la citada Ley Orgánica 6/1985");
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].reference_type, ReferenceType::OrganicLaw);
        assert_eq!(result.references[0].law_number.as_deref(), Some("6/1985"));
    }

    #[test]
    fn test_thousand_separator_article_number() {
        let result = extract("el artículo 1.428 de la Ley de Enjuiciamiento Civil");
        assert_eq!(result.references.len(), 1);
        assert_eq!(result.references[0].article_number.as_deref(), Some("1.428"));
    }

    #[test]
    fn test_empty_text() {
        let result = extract("");
        assert!(result.references.is_empty());
        assert!(result.unresolved_references.is_empty());
    }
}
