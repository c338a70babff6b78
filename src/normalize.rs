//! Station name canonicalization used to join footfall extracts to station info.

/// Footfall extract spellings that differ from the live API's station names.
static ALIASES: &[(&str, &str)] = &[
    ("Edgware Road B", "Edgware Road (Bakerloo)"),
    ("Edgware Road C&H", "Edgware Road (Circle Line)"),
    ("Heathrow Terminals 2&3", "Heathrow Terminals 2 & 3"),
    ("Hammersmith C&H", "Hammersmith (H&C Line)"),
    ("Hammersmith D&P", "Hammersmith (Dist&Picc Line)"),
    ("Shepherds Bush", "Shepherd's Bush (Central)"),
    ("Watford Met", "Watford"),
];

/// Canonicalizes an optional station name. `None` stays `None`.
pub fn normalize(raw_name: Option<&str>) -> Option<String> {
    raw_name.map(normalize_name)
}

/// Applies the alias table, then lowercases, keeps only ASCII letters, digits
/// and whitespace, collapses runs of whitespace and trims.
pub fn normalize_name(raw_name: &str) -> String {
    let name = ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw_name)
        .map_or(raw_name, |(_, canonical)| canonical);

    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
