//! Name normalization and similarity scoring.

use std::collections::HashMap;

/// Operator spellings that differ from the registry's, keyed by the
/// normalized operator name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable(HashMap<String, String>);

impl AliasTable {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Add or replace an alias. Both sides are normalized.
    pub fn with_alias(mut self, operator: &str, registry: &str) -> Self {
        self.0
            .insert(collapse_upper(operator), collapse_upper(registry));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        [
            ("BOHUMIN", "BOGUMIN"),
            ("RABKA ZDRÓJ", "RABKA-ZDRÓJ"),
            ("MOSTISKA 2", "MOŚCISKA 2"),
            ("PIWNICZNA ZDRÓJ", "PIWNICZNA-ZDRÓJ"),
            ("KUDOWA ZDRÓJ", "KUDOWA-ZDRÓJ"),
            ("PETROVICE U KARVINE", "PETROVICE U KARVINÉ"),
            ("WARSZAWA ZACHODNIA P8", "WARSZAWA ZACHODNIA (PERON 8)"),
            ("KRYNICA", "KRYNICA ZDRÓJ"),
            ("GUTKOWO", "OLSZTYN GUTKOWO"),
            ("NAKŁO N/NOTECIĄ", "NAKŁO NAD NOTECIĄ"),
            ("CHEŁM", "CHEŁM GŁÓWNY"),
            ("JAGODIN", "JAGODZIN"),
            ("CZECHOWICE DZIEDZICE", "CZECHOWICE-DZIEDZICE"),
            ("RUDNIK N/SANEM", "RUDNIK NAD SANEM"),
            ("MAŁASZEWICZE PRZYSTANEK", "MAŁASZEWICZE"),
            ("GORZÓW WIELKOPOLSKI TEATRALNA", "GORZÓW WIELKOPOLSKI WSCHODNI"),
            ("SKALITE", "SKALITÉ"),
            ("SKARŻYSKO KAMIENNA", "SKARŻYSKO-KAMIENNA"),
            ("KĘDZIERZYN KOŹLE", "KĘDZIERZYN-KOŹLE"),
            ("STRZYŻÓW N/WISŁOKIEM", "STRZYŻÓW NAD WISŁOKIEM"),
            ("BREST CENTRALNY", "BRZEŚĆ CENTRALNY"),
            ("FRANKFURT/ODER", "FRANKFURT (ODER)"),
            ("KUŹNICA", "KUŹNICA (HEL)"),
            ("WIELEŃ PÓŁNOCNY", "WIELEŃ"),
        ]
        .into_iter()
        .fold(Self::empty(), |table, (from, to)| table.with_alias(from, to))
    }
}

pub(super) fn collapse_upper(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Normalize a stop name for comparison: upper case, single spaces, then
/// the alias table.
///
/// # Examples
///
/// ```
/// use intercity_gtfs::reconcile::{AliasTable, normalize_name};
///
/// let aliases = AliasTable::default();
/// assert_eq!(normalize_name("  Krynica ", &aliases), "KRYNICA ZDRÓJ");
/// assert_eq!(normalize_name("Kraków  Główny", &aliases), "KRAKÓW GŁÓWNY");
/// ```
pub fn normalize_name(name: &str, aliases: &AliasTable) -> String {
    let collapsed = collapse_upper(name);
    match aliases.get(&collapsed) {
        Some(alias) => alias.to_string(),
        None => collapsed,
    }
}

/// Sørensen–Dice coefficient over character bigrams, in `[0, 1]`.
///
/// Equal strings score 1.0; strings too short to form a bigram score 0.0
/// unless equal.
pub fn dice_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let a_grams = bigrams(a);
    let b_grams = bigrams(b);
    let total = a_grams.len() + b_grams.len();
    if total == 0 {
        return 0.0;
    }

    let mut remaining: HashMap<(char, char), usize> = HashMap::new();
    for g in &b_grams {
        *remaining.entry(*g).or_default() += 1;
    }

    let mut shared = 0usize;
    for g in &a_grams {
        if let Some(n) = remaining.get_mut(g)
            && *n > 0
        {
            *n -= 1;
            shared += 1;
        }
    }

    (2 * shared) as f64 / total as f64
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Score multiplier for a candidate `distance_m` away from the expected
/// location: 1.0 on the spot, 0.9 at the edge of the search radius and
/// beyond.
pub fn proximity_factor(distance_m: f64, radius_m: f64) -> f64 {
    if radius_m <= 0.0 {
        return 1.0;
    }
    1.0 - 0.1 * (distance_m / radius_m).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn aliases_normalize_both_sides() {
        let table = AliasTable::empty().with_alias("nakło  n/notecią", "Nakło nad Notecią");
        assert_eq!(normalize_name("Nakło N/Notecią", &table), "NAKŁO NAD NOTECIĄ");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn default_aliases_are_loaded() {
        let table = AliasTable::default();
        assert_eq!(table.len(), 24);
        assert_eq!(table.get("CHEŁM"), Some("CHEŁM GŁÓWNY"));
    }

    #[test]
    fn dice_known_values() {
        assert_eq!(dice_similarity("ABC", "ABC"), 1.0);
        assert_eq!(dice_similarity("AB", "CD"), 0.0);
        assert_eq!(dice_similarity("A", "B"), 0.0);
        // AB BC vs AB BD: one shared of four
        assert_eq!(dice_similarity("ABC", "ABD"), 0.5);
    }

    #[test]
    fn dice_tolerates_punctuation() {
        let s = dice_similarity("SKARŻYSKO KAMIENNA", "SKARŻYSKO-KAMIENNA");
        assert!(s > 0.85, "got {s}");
        let s = dice_similarity("KRAKÓW GŁÓWNY", "KRAKÓW PŁASZÓW");
        assert!(s < 0.85, "got {s}");
    }

    #[test]
    fn proximity_bounds() {
        assert_eq!(proximity_factor(0.0, 60_000.0), 1.0);
        assert_eq!(proximity_factor(60_000.0, 60_000.0), 0.9);
        assert_eq!(proximity_factor(1e9, 60_000.0), 0.9);
        assert_eq!(proximity_factor(10.0, 0.0), 1.0);
    }

    proptest! {
        #[test]
        fn dice_is_symmetric_and_bounded(a in "[A-ZŁÓŻ ]{0,12}", b in "[A-ZŁÓŻ ]{0,12}") {
            let ab = dice_similarity(&a, &b);
            let ba = dice_similarity(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&ab));
        }
    }
}
