//! Display labels for markers.
//!
//! A label looks like `ETH-NET-3`: the first three characters of the cable
//! type and of the purpose, upper-cased, plus a sequence number. Numbers are
//! per type+purpose pair and only ever grow: deleting `ETH-NET-2` leaves a gap
//! that is never refilled.

use regex::Regex;

const ABBREVIATION_LEN: usize = 3;

/// First three characters of `value`, upper-cased.
pub fn abbreviate(value: &str) -> String {
    value
        .chars()
        .take(ABBREVIATION_LEN)
        .collect::<String>()
        .to_uppercase()
}

/// Compute the next label for `kind`/`purpose` given every label in use.
pub fn generate_label<S: AsRef<str>>(kind: &str, purpose: &str, existing_labels: &[S]) -> String {
    let type_abbr = abbreviate(kind);
    let purpose_abbr = abbreviate(purpose);

    let next_number = highest_suffix(&type_abbr, &purpose_abbr, existing_labels)
        .map_or(1, |max| max.saturating_add(1));

    format!("{type_abbr}-{purpose_abbr}-{next_number}")
}

fn highest_suffix<S: AsRef<str>>(
    type_abbr: &str,
    purpose_abbr: &str,
    existing_labels: &[S],
) -> Option<u64> {
    let pattern = format!(
        r"^{}-{}-(\d+)$",
        regex::escape(type_abbr),
        regex::escape(purpose_abbr)
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            log::error!("Invalid label pattern {pattern:?}: {e}");
            return None;
        }
    };

    existing_labels
        .iter()
        .filter_map(|label| re.captures(label.as_ref()))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .max()
}
