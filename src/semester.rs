// 🎓 Semester Value Object
//
// "ws2425", "WS24/25", "winter 2024" → all the same semester: "Winter 2024/25"
//
// Immutable, compared by its normalized (type, academic year) pair.
// Only constructible through `parse`, so every instance is valid.

use crate::error::SemesterError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// ============================================================================
// SEMESTER TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SemesterType {
    Winter,
    Summer,
}

impl SemesterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemesterType::Winter => "Winter",
            SemesterType::Summer => "Summer",
        }
    }
}

impl fmt::Display for SemesterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SEMESTER
// ============================================================================

/// A normalized semester, e.g. `Winter 2024/25` or `Summer 2025`.
///
/// The canonical string is both the display form and the persisted column
/// value, so serde goes through it as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Semester {
    kind: SemesterType,
    academic_year: String,
}

impl Semester {
    /// Parse any accepted spelling into a normalized semester.
    pub fn parse(input: &str) -> Result<Semester, SemesterError> {
        parse(input)
    }

    pub fn kind(&self) -> SemesterType {
        self.kind
    }

    /// Normalized year: `2024/25` for winter, `2025` for summer.
    pub fn academic_year(&self) -> &str {
        &self.academic_year
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.academic_year)
    }
}

impl FromStr for Semester {
    type Err = SemesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl TryFrom<String> for Semester {
    type Error = SemesterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse(&value)
    }
}

impl From<Semester> for String {
    fn from(semester: Semester) -> Self {
        semester.to_string()
    }
}

// ============================================================================
// PARSER
// ============================================================================

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(ws|winter|ss|summer)\s*([0-9]{4}|[0-9]{2})(?:/([0-9]{2}))?$")
            .expect("semester pattern is a valid regex")
    })
}

/// Parse a human-written semester.
///
/// Accepts a leading `ws`/`winter`/`ss`/`summer` token (any case) followed by
/// a 2 or 4 digit year and an optional `/yy` suffix.
pub fn parse(input: &str) -> Result<Semester, SemesterError> {
    let clean = input.trim().to_lowercase();
    let caps = pattern()
        .captures(&clean)
        .ok_or_else(|| SemesterError::InvalidFormat(input.to_string()))?;

    let kind = match &caps[1] {
        "ws" | "winter" => SemesterType::Winter,
        _ => SemesterType::Summer,
    };

    // "24/25" → "2425", "2024/25" → "2425"
    let mut digits = caps[2].to_string();
    if let Some(second) = caps.get(3) {
        if digits.len() == 4 {
            digits = digits[2..].to_string();
        }
        digits.push_str(second.as_str());
    }

    Ok(Semester {
        kind,
        academic_year: academic_year(&digits, kind)?,
    })
}

/// Turn the digit token into the academic year for the given semester type.
///
/// Two-digit years are assumed to be in the 21st century.
fn academic_year(digits: &str, kind: SemesterType) -> Result<String, SemesterError> {
    let year: u32 = digits
        .parse()
        .map_err(|_| SemesterError::InvalidFormat(digits.to_string()))?;

    match kind {
        SemesterType::Winter => {
            if digits.len() == 4 {
                let first = year / 100;
                let second = year % 100;

                // ws2425, ws0506: consecutive halves (ws9900 is not, 99 + 1 != 0)
                if second == first + 1 {
                    return Ok(format!("20{:02}/{:02}", first, second));
                }
                if year > 1000 {
                    return Ok(format!("{}/{:02}", year, (year + 1) % 100));
                }
            } else if year < 100 {
                return Ok(format!("20{:02}/{:02}", year, (year + 1) % 100));
            }

            Err(SemesterError::UnparsableAcademicYear {
                year,
                kind: kind.as_str(),
            })
        }
        SemesterType::Summer => {
            if year < 100 {
                Ok(format!("20{:02}", year))
            } else {
                Ok(year.to_string())
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winter_spellings_normalize_identically() {
        let a = parse("ws2425").unwrap();
        let b = parse("WS24/25").unwrap();
        let c = parse("Winter 2024").unwrap();

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "Winter 2024/25");
        assert_eq!(a.kind(), SemesterType::Winter);
        assert_eq!(a.academic_year(), "2024/25");
    }

    #[test]
    fn test_summer_years() {
        assert_eq!(parse("SS25").unwrap().to_string(), "Summer 2025");
        assert_eq!(parse("summer 2025").unwrap().to_string(), "Summer 2025");
        assert_eq!(parse("ss05").unwrap().academic_year(), "2005");
    }

    #[test]
    fn test_winter_year_edge_cases() {
        // non-consecutive 4 digits → first year + next year
        assert_eq!(parse("ws2099").unwrap().academic_year(), "2099/00");
        assert_eq!(parse("ws05").unwrap().academic_year(), "2005/06");
        assert_eq!(parse("ws 2024/25").unwrap().academic_year(), "2024/25");
        assert_eq!(parse("ws9900").unwrap().academic_year(), "9900/01");
    }

    #[test]
    fn test_canonical_form_parses_back_to_itself() {
        for input in ["ws05", "ws0910", "ws24", "ss25", "ss2425"] {
            let semester = parse(input).unwrap();
            assert_eq!(parse(&semester.to_string()).unwrap(), semester);
        }
    }

    #[test]
    fn test_winter_three_digit_magnitude_is_unparsable() {
        // "0500" matches the pattern but is neither a 2 nor a 4 digit year
        let err = parse("ws0500").unwrap_err();
        assert_eq!(
            err,
            SemesterError::UnparsableAcademicYear {
                year: 500,
                kind: "Winter"
            }
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        for input in ["", "WW24", "2024/25", "wintersemester2024", "ws٢٤"] {
            assert!(
                matches!(parse(input), Err(SemesterError::InvalidFormat(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let semester = parse("ws24").unwrap();
        let json = serde_json::to_string(&semester).unwrap();
        assert_eq!(json, "\"Winter 2024/25\"");

        let back: Semester = serde_json::from_str(&json).unwrap();
        assert_eq!(back, semester);
    }
}
