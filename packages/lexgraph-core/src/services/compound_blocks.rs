//! Preprocessing of compound article blocks (national source only).
//!
//! Some consolidated texts carry blocks titled `Artículos X a Y`,
//! `Artículos X, Y y Z` or `Artículos X y Y` whose versions apply to several
//! articles at once (typically derogations). Each such block is distributed:
//! its versions are cloned onto every referenced article that exists as an
//! individual block, rewriting the leading article line, and the compound
//! block itself is removed from the input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

static SINGLE_ARTICLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Artículo|Art\.)\s+(\d+)(?:º|°)?(?:\s+\w+)?\.?$").expect("single pattern")
});

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Artículos?|Arts?\.)\s+(\d+)(?:º|°)?\s+a\s+(\d+)(?:º|°)?\.?$")
        .expect("range pattern")
});

static LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Artículos?|Arts?\.)\s+((?:\d+(?:º|°)?(?:\s*,\s*)?)+)\s+y\s+(\d+)(?:º|°)?\.?$")
        .expect("list pattern")
});

static PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Artículos?|Arts?\.)\s+(\d+)(?:º|°)?\s+y\s+(\d+)(?:º|°)?\.?$")
        .expect("pair pattern")
});

fn block_title(block: &Value) -> &str {
    block.get("@titulo").and_then(Value::as_str).unwrap_or("").trim()
}

fn compound_targets(title: &str) -> Option<Vec<u64>> {
    if let Some(caps) = RANGE.captures(title) {
        let start: u64 = caps[1].parse().ok()?;
        let end: u64 = caps[2].parse().ok()?;
        if start <= end {
            return Some((start..=end).collect());
        }
        return None;
    }
    // PAIR before LIST: a simple pair also matches the list pattern's shape.
    if let Some(caps) = PAIR.captures(title) {
        return Some(vec![caps[1].parse().ok()?, caps[2].parse().ok()?]);
    }
    if let Some(caps) = LIST.captures(title) {
        let mut nums: Vec<u64> = caps[1]
            .split(',')
            .filter_map(|n| n.trim().trim_end_matches(['º', '°']).parse().ok())
            .collect();
        nums.push(caps[2].parse().ok()?);
        return Some(nums);
    }
    None
}

/// Distribute compound blocks over their target articles in `content`
/// (the raw `texto` object with its `bloque` array). Returns how many
/// compound blocks were expanded.
pub fn distribute_compound_blocks(content: &mut Value) -> usize {
    let blocks = match content.get("bloque").and_then(Value::as_array) {
        Some(blocks) => blocks.clone(),
        None => return 0,
    };

    // Index individual article blocks by number.
    let mut article_index: HashMap<u64, usize> = HashMap::new();
    for (i, block) in blocks.iter().enumerate() {
        if let Some(caps) = SINGLE_ARTICLE.captures(block_title(block)) {
            if let Ok(num) = caps[1].parse::<u64>() {
                article_index.entry(num).or_insert(i);
            }
        }
    }

    let mut result: Vec<Value> = blocks.clone();
    let mut compound_indices = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        let title = block_title(block).to_string();
        let Some(targets) = compound_targets(&title) else {
            continue;
        };
        compound_indices.push(i);
        info!(title = %title, targets = ?targets, "distributing compound article block");

        let versions = block
            .get("version")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for num in targets {
            let Some(&target_idx) = article_index.get(&num) else {
                warn!(article = num, title = %title, "compound target article not found");
                continue;
            };
            for version in &versions {
                let mut clone = version.clone();
                rewrite_leading_line(&mut clone, num);
                if let Some(obj) = result[target_idx].as_object_mut() {
                    let slot = obj
                        .entry("version")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Some(list) = slot.as_array_mut() {
                        list.push(clone);
                    }
                }
            }
        }
    }

    // Remove compound blocks, highest index first.
    for &i in compound_indices.iter().rev() {
        result.remove(i);
    }
    let expanded = compound_indices.len();
    content["bloque"] = Value::Array(result);
    expanded
}

/// Point the version's leading paragraph at the target article number.
fn rewrite_leading_line(version: &mut Value, article_num: u64) {
    let heading = Value::String(format!("Artículo {article_num}."));
    match version.get_mut("p") {
        Some(Value::Array(lines)) if !lines.is_empty() => lines[0] = heading,
        Some(p @ Value::String(_)) => *p = heading,
        _ => {}
    }
}
