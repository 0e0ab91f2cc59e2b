// src/period.rs

// --- Imports ---
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

// --- Regex Patterns for Text Matching (Lazy Static) ---
static QUARTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Q(\d)").expect("Failed to compile QUARTER_RE")
});

static FISCAL_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)FY\s*(\d{2,4})").expect("Failed to compile FISCAL_YEAR_RE")
});

// Accepted date formats, tried in order; the first successful parse wins.
// Day-first formats come before ISO, matching how the source site writes dates.
const DATE_FORMATS: [&str; 5] = ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d", "%d-%m-%y", "%d/%m/%y"];

// --- Data Structures ---

/// One of the four 3-month sub-periods of an April-start fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }

    /// Parses a single quarter digit (as captured by `Q(\d)`).
    pub fn from_digit(d: u32) -> Option<Self> {
        match d {
            1 => Some(Quarter::Q1),
            2 => Some(Quarter::Q2),
            3 => Some(Quarter::Q3),
            4 => Some(Quarter::Q4),
            _ => None,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved fiscal period. Never partial: resolution always falls
/// back to the current calendar period when no signal is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPeriod {
    pub quarter: Quarter,
    /// "FY" + 4-digit year, labeled by the calendar year the period ends in.
    pub fiscal_year: String,
}

/// Source of "today" for the no-signal fallback. Injectable so tests can
/// pin the date; production uses [`SystemClock`].
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

// --- Resolution ---

/// Resolves a fiscal period from a free-text fragment and/or date string.
///
/// Priority: explicit `Qn` + `FYyyyy` markers in the text, then a parseable
/// date, then the current date. Never fails.
pub fn resolve(raw_date: Option<&str>, text: &str, clock: &impl Clock) -> ResolvedPeriod {
    // 1. Both markers present in the text: use them directly.
    if let (Some(q_cap), Some(fy_cap)) = (QUARTER_RE.captures(text), FISCAL_YEAR_RE.captures(text)) {
        let quarter = q_cap
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .and_then(Quarter::from_digit);
        if let Some(quarter) = quarter {
            if let Some(fy) = fy_cap.get(1).map(|m| expand_fiscal_year(m.as_str())) {
                return ResolvedPeriod { quarter, fiscal_year: fy };
            }
        }
    }

    // 2. Try the raw date against the accepted formats.
    if let Some(date_str) = raw_date {
        if let Some(date) = parse_date(date_str) {
            return period_for_date(date);
        }
    }

    // 3. No signal at all: fall back to today.
    period_for_date(clock.today())
}

/// Expands a 2-digit fiscal year to "FY20xx"; 4-digit years pass through.
pub fn expand_fiscal_year(digits: &str) -> String {
    if digits.len() == 2 {
        format!("FY20{}", digits)
    } else {
        format!("FY{}", digits)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

/// Maps a calendar date into the April-start fiscal year convention:
/// Apr-Jun is Q1, Jul-Sep is Q2, Oct-Dec is Q3 (all of FY year+1);
/// Jan-Mar is Q4 of FY year.
fn period_for_date(date: NaiveDate) -> ResolvedPeriod {
    let month = date.month();
    let year = date.year();
    let (quarter, fy_year) = match month {
        4..=6 => (Quarter::Q1, year + 1),
        7..=9 => (Quarter::Q2, year + 1),
        10..=12 => (Quarter::Q3, year + 1),
        _ => (Quarter::Q4, year),
    };
    ResolvedPeriod {
        quarter,
        fiscal_year: format!("FY{}", fy_year),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(NaiveDate);

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.0
        }
    }

    fn clock(y: i32, m: u32, d: u32) -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn text_markers_win_over_date() {
        // A date is present but both markers are too; markers take priority.
        let p = resolve(Some("15-07-2024"), "Acme Corp Q2 FY24 Transcript 15-07-2024", &clock(2020, 1, 1));
        assert_eq!(p.quarter, Quarter::Q2);
        assert_eq!(p.fiscal_year, "FY2024");
    }

    #[test]
    fn two_digit_fiscal_year_expands() {
        let p = resolve(None, "Q1 FY24 call", &clock(2020, 1, 1));
        assert_eq!(p.fiscal_year, "FY2024");

        let p = resolve(None, "Q3 FY2025 call", &clock(2020, 1, 1));
        assert_eq!(p.fiscal_year, "FY2025");
    }

    #[test]
    fn quarter_marker_alone_is_not_enough() {
        // Only Qn without FY: falls through to date parsing.
        let p = resolve(Some("01-02-2023"), "Q2 results", &clock(2020, 1, 1));
        assert_eq!(p.quarter, Quarter::Q4);
        assert_eq!(p.fiscal_year, "FY2023");
    }

    #[test]
    fn april_start_month_mapping() {
        let cases = [
            ("15-04-2024", Quarter::Q1, "FY2025"),
            ("30-06-2024", Quarter::Q1, "FY2025"),
            ("01-07-2024", Quarter::Q2, "FY2025"),
            ("15-09-2024", Quarter::Q2, "FY2025"),
            ("02-10-2024", Quarter::Q3, "FY2025"),
            ("31-12-2024", Quarter::Q3, "FY2025"),
            ("01-01-2024", Quarter::Q4, "FY2024"),
            ("31-03-2024", Quarter::Q4, "FY2024"),
        ];
        for (date, quarter, fy) in cases {
            let p = resolve(Some(date), "", &clock(1999, 1, 1));
            assert_eq!(p.quarter, quarter, "date {}", date);
            assert_eq!(p.fiscal_year, fy, "date {}", date);
        }
    }

    #[test]
    fn date_format_priority() {
        // ISO format parses once the day-first formats fail.
        let p = resolve(Some("2024-05-20"), "", &clock(1999, 1, 1));
        assert_eq!(p.quarter, Quarter::Q1);
        assert_eq!(p.fiscal_year, "FY2025");

        // Two-digit year variants.
        let p = resolve(Some("20/05/24"), "", &clock(1999, 1, 1));
        assert_eq!(p.quarter, Quarter::Q1);
        assert_eq!(p.fiscal_year, "FY2025");
    }

    #[test]
    fn example_date_without_markers() {
        let p = resolve(Some("01-02-2023"), "", &clock(1999, 1, 1));
        assert_eq!(p.quarter, Quarter::Q4);
        assert_eq!(p.fiscal_year, "FY2023");
    }

    #[test]
    fn unparseable_date_falls_back_to_clock() {
        let p = resolve(Some("not a date"), "no markers here", &clock(2025, 8, 23));
        assert_eq!(p.quarter, Quarter::Q2);
        assert_eq!(p.fiscal_year, "FY2026");
    }

    #[test]
    fn no_signal_falls_back_to_clock() {
        let p = resolve(None, "", &clock(2024, 2, 10));
        assert_eq!(p.quarter, Quarter::Q4);
        assert_eq!(p.fiscal_year, "FY2024");
    }
}
