//! Fuzzy subsequence matching and ranking
//!
//! Pure functions over in-memory lists; no I/O. A pattern matches a text
//! when its characters appear in the text in order (not necessarily
//! contiguous), compared case-insensitively. Matches are scored with
//! word-boundary and consecutive-run bonuses and a length penalty, then
//! sorted descending; ties keep their input order.

/// A successful match: the score and the matched character indices
/// (into the text, in order).
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub score: f64,
    pub matches: Vec<usize>,
}

impl FuzzyMatch {
    /// The match every item gets for an empty pattern.
    fn trivial() -> Self {
        Self {
            score: 1.0,
            matches: Vec::new(),
        }
    }
}

const WORD_BOUNDARY_BONUS: f64 = 10.0;
const CONSECUTIVE_STEP_BONUS: f64 = 5.0;
const BASE_MATCH_SCORE: f64 = 1.0;
const LENGTH_PENALTY_PER_CHAR: f64 = 0.1;

/// Score `pattern` against `text`. Returns `None` when the pattern is not
/// a (case-insensitive) subsequence of the text. An empty pattern matches
/// everything with score 1.
pub fn fuzzy_match(pattern: &str, text: &str) -> Option<FuzzyMatch> {
    if pattern.is_empty() {
        return Some(FuzzyMatch::trivial());
    }

    let pattern_lower: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let text_chars: Vec<char> = text.chars().collect();

    let mut pattern_idx = 0;
    let mut matches = Vec::new();
    let mut score = 0.0;
    let mut consecutive_bonus = 0.0;

    for (text_idx, &c) in text_chars.iter().enumerate() {
        if pattern_idx >= pattern_lower.len() {
            break;
        }
        if !c.to_lowercase().eq(std::iter::once(pattern_lower[pattern_idx])) {
            continue;
        }

        if text_idx == 0 || matches!(text_chars[text_idx - 1], ' ' | '_' | '-') {
            score += WORD_BOUNDARY_BONUS;
        }

        // A run of adjacent matches earns an escalating bonus; the bonus
        // resets as soon as the run breaks.
        let prev = matches.last().copied();
        if prev == Some(text_idx.wrapping_sub(1)) && text_idx > 0 {
            consecutive_bonus += CONSECUTIVE_STEP_BONUS;
            score += consecutive_bonus;
        } else {
            consecutive_bonus = 0.0;
            score += BASE_MATCH_SCORE;
        }

        matches.push(text_idx);
        pattern_idx += 1;
    }

    if pattern_idx != pattern_lower.len() {
        return None;
    }

    let length_penalty =
        (text_chars.len() as f64 - pattern_lower.len() as f64) * LENGTH_PENALTY_PER_CHAR;
    score = (score - length_penalty).max(0.0);

    Some(FuzzyMatch { score, matches })
}

/// Filter and rank `items` by matching `pattern` against `get_text(item)`.
///
/// A blank pattern returns every item with score 1 in input order.
/// Otherwise non-matching items are dropped and the rest sorted by score
/// descending; the sort is stable so equal scores keep input order.
pub fn fuzzy_search<T>(
    items: Vec<T>,
    pattern: &str,
    get_text: impl Fn(&T) -> String,
) -> Vec<(T, FuzzyMatch)> {
    if pattern.trim().is_empty() {
        return items
            .into_iter()
            .map(|item| (item, FuzzyMatch::trivial()))
            .collect();
    }

    let mut results: Vec<(T, FuzzyMatch)> = items
        .into_iter()
        .filter_map(|item| {
            let text = get_text(&item);
            fuzzy_match(pattern, &text).map(|m| (item, m))
        })
        .collect();

    results.sort_by(|a, b| {
        b.1.score
            .partial_cmp(&a.1.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    results
}
