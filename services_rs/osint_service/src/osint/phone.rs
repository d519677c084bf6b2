//! Table-driven phone number parsing.
//!
//! This is deliberately not a telecom-grade library: country resolution is a
//! longest-prefix match over a small static table, validity is a length
//! heuristic and carrier data covers one market. The point is reproducible,
//! dependency-free behavior for the scan report.

pub struct CountryInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub iso: &'static str,
}

/// Dialing codes, ordered longest-first so that e.g. "971" wins over "9?1"
/// ambiguity with "1". Matching iterates in table order; the unit tests pin
/// the ordering.
const COUNTRY_CODES: &[CountryInfo] = &[
    CountryInfo { code: "971", name: "United Arab Emirates", iso: "AE" },
    CountryInfo { code: "966", name: "Saudi Arabia", iso: "SA" },
    CountryInfo { code: "44", name: "United Kingdom", iso: "GB" },
    CountryInfo { code: "62", name: "Indonesia", iso: "ID" },
    CountryInfo { code: "60", name: "Malaysia", iso: "MY" },
    CountryInfo { code: "65", name: "Singapore", iso: "SG" },
    CountryInfo { code: "61", name: "Australia", iso: "AU" },
    CountryInfo { code: "81", name: "Japan", iso: "JP" },
    CountryInfo { code: "82", name: "South Korea", iso: "KR" },
    CountryInfo { code: "86", name: "China", iso: "CN" },
    CountryInfo { code: "91", name: "India", iso: "IN" },
    CountryInfo { code: "49", name: "Germany", iso: "DE" },
    CountryInfo { code: "33", name: "France", iso: "FR" },
    CountryInfo { code: "39", name: "Italy", iso: "IT" },
    CountryInfo { code: "34", name: "Spain", iso: "ES" },
    CountryInfo { code: "55", name: "Brazil", iso: "BR" },
    CountryInfo { code: "52", name: "Mexico", iso: "MX" },
    CountryInfo { code: "63", name: "Philippines", iso: "PH" },
    CountryInfo { code: "66", name: "Thailand", iso: "TH" },
    CountryInfo { code: "84", name: "Vietnam", iso: "VN" },
    CountryInfo { code: "1", name: "United States", iso: "US" },
    CountryInfo { code: "7", name: "Russia", iso: "RU" },
];

/// Indonesian mobile prefixes (first three national digits).
const ID_CARRIERS: &[(&str, &str)] = &[
    ("811", "Telkomsel (Halo)"),
    ("812", "Telkomsel (Simpati)"),
    ("813", "Telkomsel (Simpati)"),
    ("821", "Telkomsel (Simpati)"),
    ("822", "Telkomsel (Loop)"),
    ("823", "Telkomsel"),
    ("851", "Telkomsel (AS)"),
    ("852", "Telkomsel (AS)"),
    ("853", "Telkomsel (AS)"),
    ("814", "Indosat (IM3)"),
    ("815", "Indosat (Matrix)"),
    ("816", "Indosat (Mentari)"),
    ("855", "Indosat (Matrix)"),
    ("856", "Indosat (IM3)"),
    ("857", "Indosat (IM3)"),
    ("858", "Indosat (Mentari)"),
    ("817", "XL Axiata"),
    ("818", "XL Axiata"),
    ("819", "XL Axiata"),
    ("859", "XL Axiata"),
    ("877", "XL Axiata"),
    ("878", "XL Axiata"),
    ("831", "Axis"),
    ("832", "Axis"),
    ("833", "Axis"),
    ("838", "Axis"),
    ("881", "Smartfren"),
    ("882", "Smartfren"),
    ("883", "Smartfren"),
    ("884", "Smartfren"),
    ("885", "Smartfren"),
    ("886", "Smartfren"),
    ("887", "Smartfren"),
    ("888", "Smartfren"),
    ("889", "Smartfren"),
    ("895", "Three (3)"),
    ("896", "Three (3)"),
    ("897", "Three (3)"),
    ("898", "Three (3)"),
    ("899", "Three (3)"),
];

pub const UNKNOWN_CARRIER: &str = "Unknown Carrier";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPhone {
    pub country_code: String,
    pub national_number: String,
}

impl ParsedPhone {
    pub fn e164(&self) -> String {
        format!("+{}{}", self.country_code, self.national_number)
    }

    pub fn international(&self) -> String {
        format!("+{} {}", self.country_code, self.national_number)
    }
}

/// Normalize a raw phone string and split it into country code and national
/// number.
///
/// Everything except digits is dropped; a leading `+` marks the number as
/// already international. `00` is the international call prefix, a single
/// leading `0` is local format and maps to `default_cc`. Returns `None` when
/// no table prefix matches.
pub fn parse(raw: &str, default_cc: &str) -> Option<ParsedPhone> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let normalized = if trimmed.starts_with('+') {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{default_cc}{rest}")
    } else {
        digits
    };

    for entry in COUNTRY_CODES {
        if let Some(national) = normalized.strip_prefix(entry.code) {
            return Some(ParsedPhone {
                country_code: entry.code.to_string(),
                national_number: national.to_string(),
            });
        }
    }
    None
}

pub fn country_for(code: &str) -> Option<&'static CountryInfo> {
    COUNTRY_CODES.iter().find(|c| c.code == code)
}

/// Length heuristic standing in for per-country numbering plans.
pub fn is_plausible_national_number(national_number: &str) -> bool {
    (9..=12).contains(&national_number.len())
}

/// Carrier resolution is a secondary prefix lookup, currently populated for
/// Indonesia only.
pub fn carrier_for(country_code: &str, national_number: &str) -> &'static str {
    if country_code != "62" || national_number.len() < 3 {
        return UNKNOWN_CARRIER;
    }
    let prefix = &national_number[..3];
    ID_CARRIERS
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_CARRIER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_ordered_longest_prefix_first() {
        let mut last_len = usize::MAX;
        for entry in COUNTRY_CODES {
            assert!(
                entry.code.len() <= last_len,
                "code {} breaks descending-length ordering",
                entry.code
            );
            last_len = entry.code.len();
        }
    }

    #[test]
    fn local_format_maps_to_default_country() {
        let parsed = parse("0812345678", "62").expect("parse");
        assert_eq!(parsed.country_code, "62");
        assert_eq!(parsed.national_number, "812345678");
        assert_eq!(parsed.e164(), "+62812345678");
    }

    #[test]
    fn carrier_lookup_matches_reference_vector() {
        let parsed = parse("0812345678", "62").expect("parse");
        assert_eq!(
            carrier_for(&parsed.country_code, &parsed.national_number),
            "Telkomsel (Simpati)"
        );
    }

    #[test]
    fn punctuation_is_stripped() {
        let parsed = parse("+62 812-3456-78", "62").expect("parse");
        assert_eq!(parsed.country_code, "62");
        assert_eq!(parsed.national_number, "812345678");
    }

    #[test]
    fn international_call_prefix_is_accepted() {
        let parsed = parse("0062812345678", "1").expect("parse");
        assert_eq!(parsed.country_code, "62");
        assert_eq!(parsed.national_number, "812345678");
    }

    #[test]
    fn three_digit_codes_win_over_one_digit_codes() {
        let parsed = parse("+971501234567", "62").expect("parse");
        assert_eq!(parsed.country_code, "971");
        assert_eq!(parsed.national_number, "501234567");

        // "1" must still match on its own.
        let parsed = parse("+12025550123", "62").expect("parse");
        assert_eq!(parsed.country_code, "1");
    }

    #[test]
    fn parsing_is_idempotent_on_normalized_output() {
        for raw in ["0812345678", "+971501234567", "+44 7700 900123"] {
            let first = parse(raw, "62").expect("parse");
            let second = parse(&first.e164(), "62").expect("reparse");
            assert_eq!(first, second, "input {raw}");
        }
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        assert!(parse("+999123456789", "62").is_none());
        assert!(parse("  ", "62").is_none());
        assert!(parse("abc", "62").is_none());
    }

    #[test]
    fn length_heuristic_bounds() {
        assert!(!is_plausible_national_number("12345678"));
        assert!(is_plausible_national_number("123456789"));
        assert!(is_plausible_national_number("123456789012"));
        assert!(!is_plausible_national_number("1234567890123"));
    }

    #[test]
    fn carrier_unknown_outside_indonesia() {
        assert_eq!(carrier_for("1", "2025550123"), UNKNOWN_CARRIER);
        assert_eq!(carrier_for("62", "99"), UNKNOWN_CARRIER);
        assert_eq!(carrier_for("62", "999999999"), UNKNOWN_CARRIER);
    }
}
