//! Name normalization for scanned library entries
//!
//! Turns free-form directory and file names into canonical forms:
//! - "Show Name (2004)"  -> "Show Name"
//! - "season 2"          -> "Season 02"
//! - "Season Seventeen"  -> season number 17
//!
//! Every function here is pure and total: no I/O, no shared state, and the
//! worst case is returning the trimmed input unchanged.

use regex::Regex;

/// Spelled-out season words, longest first so "seventeen" is not read as
/// "seven" and "eighteen" is not read as "eight".
const SPELLED_NUMBERS: [(&str, i32); 20] = [
    ("seventeen", 17),
    ("thirteen", 13),
    ("fourteen", 14),
    ("eighteen", 18),
    ("nineteen", 19),
    ("fifteen", 15),
    ("sixteen", 16),
    ("eleven", 11),
    ("twelve", 12),
    ("twenty", 20),
    ("three", 3),
    ("seven", 7),
    ("eight", 8),
    ("four", 4),
    ("five", 5),
    ("nine", 9),
    ("one", 1),
    ("two", 2),
    ("six", 6),
    ("ten", 10),
];

/// Normalize a series directory name into the canonical lookup form.
///
/// Trims, removes any 4-digit year wrapped in `()`, `[]`, `{}` or quote
/// pairs, and collapses internal whitespace runs. Idempotent.
pub fn normalize_series_name(raw: &str) -> String {
    scrub(raw)
}

/// Normalize a season directory name into the `"Season NN"` template.
///
/// Concatenates every digit found in the name, in order, and renders it
/// zero-padded to at least two digits. Names without digits pass through
/// with only the trim/year-strip applied, so unrecognized schemes like
/// "Specials" survive intact.
pub fn normalize_season_name(raw: &str) -> String {
    let base = scrub(raw);
    let digits: String = base.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return base;
    }
    match digits.parse::<i64>() {
        Ok(number) => format!("Season {:02}", number),
        Err(_) => base,
    }
}

/// Read the season number back out of a name in `"Season NN"` form.
///
/// Only the text after the fixed 6-character `Season` prefix is examined;
/// returns -1 when that suffix carries no digits. Callers must pass names
/// already shaped by [`normalize_season_name`].
pub fn infer_season_number(formatted: &str) -> i32 {
    let digits: String = formatted
        .chars()
        .skip(6)
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return -1;
    }
    digits.parse().unwrap_or(-1)
}

/// Normalize an episode file name. Same trim/year-strip as series names;
/// no episode-number inference happens locally.
pub fn normalize_episode_name(raw: &str) -> String {
    scrub(raw)
}

/// Infer a season number from a raw, unformatted folder name.
///
/// Ordered cascade of strategies, first hit wins:
/// 1. digits directly following the word "season"
/// 2. a spelled-out number ("one" through "twenty")
/// 3. the digit run ending the name
/// 4. the digit run starting the name
/// 5. every digit in the name concatenated in order
///
/// Returns -1 when no strategy produces a number.
pub fn season_number_from_raw(raw: &str) -> i32 {
    season_word_number(raw)
        .or_else(|| spelled_out_number(raw))
        .or_else(|| trailing_digit_run(raw))
        .or_else(|| leading_digit_run(raw))
        .or_else(|| digit_concatenation(raw))
        .unwrap_or(-1)
}

/// Trim, strip wrapped 4-digit years, collapse whitespace runs.
fn scrub(raw: &str) -> String {
    let year_re = Regex::new(r#"\(\d{4}\)|\[\d{4}\]|\{\d{4}\}|'\d{4}'|"\d{4}""#).unwrap();
    let stripped = year_re.replace_all(raw.trim(), "");
    let space_re = Regex::new(r"\s+").unwrap();
    space_re.replace_all(&stripped, " ").trim().to_string()
}

fn season_word_number(name: &str) -> Option<i32> {
    let re = Regex::new(r"(?i)season\s*(\d+)").unwrap();
    let caps = re.captures(name)?;
    caps.get(1)?.as_str().parse().ok()
}

fn spelled_out_number(name: &str) -> Option<i32> {
    let lower = name.to_lowercase();
    SPELLED_NUMBERS
        .iter()
        .find(|(word, _)| lower.contains(word))
        .map(|(_, number)| *number)
}

fn trailing_digit_run(name: &str) -> Option<i32> {
    let run: String = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if run.is_empty() {
        return None;
    }
    run.parse().ok()
}

fn leading_digit_run(name: &str) -> Option<i32> {
    let run: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if run.is_empty() {
        return None;
    }
    run.parse().ok()
}

fn digit_concatenation(name: &str) -> Option<i32> {
    let digits: String = name.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_name_strips_wrapped_years() {
        assert_eq!(normalize_series_name("Show Name (2004)"), "Show Name");
        assert_eq!(normalize_series_name("Show Name [1999]"), "Show Name");
        assert_eq!(normalize_series_name("Show Name {2010}"), "Show Name");
        assert_eq!(normalize_series_name("Show Name '1987'"), "Show Name");
        assert_eq!(normalize_series_name("Show Name \"1987\""), "Show Name");
    }

    #[test]
    fn test_series_name_is_idempotent() {
        for raw in ["  Show Name (2004) ", "Plain Show", "A  B   [2001] C"] {
            let once = normalize_series_name(raw);
            assert_eq!(normalize_series_name(&once), once);
        }
    }

    #[test]
    fn test_series_name_collapses_whitespace() {
        assert_eq!(normalize_series_name("Show   Name  (2004)"), "Show Name");
    }

    #[test]
    fn test_series_name_keeps_bare_years() {
        // Only wrapped years are noise; "2001: A Space Odyssey" style names stay.
        assert_eq!(normalize_series_name("Cleopatra 2525"), "Cleopatra 2525");
    }

    #[test]
    fn test_season_name_renders_canonical_template() {
        assert_eq!(normalize_season_name("season 2"), "Season 02");
        assert_eq!(normalize_season_name("Season 10"), "Season 10");
        assert_eq!(normalize_season_name("Disc 1 Part 7"), "Season 17");
    }

    #[test]
    fn test_season_name_without_digits_passes_through() {
        assert_eq!(normalize_season_name("Specials"), "Specials");
        assert_eq!(normalize_season_name("  Extras  "), "Extras");
    }

    #[test]
    fn test_infer_season_number_reads_the_suffix() {
        assert_eq!(infer_season_number("Season 02"), 2);
        assert_eq!(infer_season_number("Season 117"), 117);
        assert_eq!(infer_season_number("Specials"), -1);
        assert_eq!(infer_season_number(""), -1);
    }

    #[test]
    fn test_season_template_round_trips_digit_concatenation() {
        for raw in ["season 2", "Season 10", "Disc 1 Part 7"] {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            let expected: i32 = digits.parse().unwrap();
            assert_eq!(infer_season_number(&normalize_season_name(raw)), expected);
        }
    }

    #[test]
    fn test_episode_name_strips_year() {
        assert_eq!(normalize_episode_name("The Pilot (1999)"), "The Pilot");
        assert_eq!(normalize_episode_name("pilot.mkv"), "pilot.mkv");
    }

    #[test]
    fn test_cascade_prefers_digits_after_season_word() {
        assert_eq!(season_number_from_raw("Season 3 disc 2"), 3);
        assert_eq!(season_number_from_raw("season4"), 4);
        assert_eq!(season_number_from_raw("The Season 12 Collection"), 12);
    }

    #[test]
    fn test_cascade_matches_longest_spelled_word_first() {
        assert_eq!(season_number_from_raw("Season Seventeen"), 17);
        assert_eq!(season_number_from_raw("Book Eighteen"), 18);
        assert_eq!(season_number_from_raw("Series Four"), 4);
    }

    #[test]
    fn test_cascade_falls_back_to_digit_runs() {
        assert_eq!(season_number_from_raw("Part 12"), 12);
        assert_eq!(season_number_from_raw("3rd Series"), 3);
    }

    #[test]
    fn test_cascade_concatenates_scattered_digits_last() {
        assert_eq!(season_number_from_raw("Box 1 Set 2 Bonus"), 12);
    }

    #[test]
    fn test_cascade_returns_sentinel_without_numbers() {
        assert_eq!(season_number_from_raw("Specials"), -1);
        assert_eq!(season_number_from_raw(""), -1);
    }
}
