use chrono::{Datelike, Local};

const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One attendance column, identified by a 4-digit day+month code ("1709" for
/// 17-Sep). The code carries no year: the register workbook this replaces
/// never spanned school years, and two Septembers in one workspace collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateKey {
    day: u32,
    month: u32,
}

impl DateKey {
    pub fn new(day: u32, month: u32) -> Option<DateKey> {
        if !(1..=12).contains(&month) {
            return None;
        }
        // Leap reference year, so 29-Feb stays representable.
        if day == 0 || day as usize > days_in_month(month) {
            return None;
        }
        Some(DateKey { day, month })
    }

    pub fn today() -> DateKey {
        let now = Local::now().date_naive();
        DateKey {
            day: now.day(),
            month: now.month(),
        }
    }

    /// Accepted input forms: "today", "17-Sep", "17-9", "17/09".
    /// A bare 4-digit token is NOT a date here; single numeric tokens are
    /// roll numbers and must stay that way.
    pub fn parse(token: &str) -> Option<DateKey> {
        let t = token.trim();
        if t.eq_ignore_ascii_case("today") {
            return Some(DateKey::today());
        }
        let (day_part, month_part) = t.split_once(|c| c == '-' || c == '/')?;
        let day = day_part.trim().parse::<u32>().ok()?;
        let month = parse_month(month_part.trim())?;
        DateKey::new(day, month)
    }

    /// Reads back a canonical "DDMM" key as stored in the column header.
    pub fn from_key(key: &str) -> Option<DateKey> {
        if key.len() != 4 || !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let day = key[..2].parse::<u32>().ok()?;
        let month = key[2..].parse::<u32>().ok()?;
        DateKey::new(day, month)
    }

    /// Canonical column key, e.g. "1709".
    pub fn key(&self) -> String {
        format!("{:02}{:02}", self.day, self.month)
    }

    /// Human form used in replies, e.g. "17-Sep".
    pub fn label(&self) -> String {
        format!("{:02}-{}", self.day, MONTH_ABBREV[(self.month - 1) as usize])
    }
}

fn parse_month(part: &str) -> Option<u32> {
    if let Ok(m) = part.parse::<u32>() {
        return (1..=12).contains(&m).then_some(m);
    }
    MONTH_ABBREV
        .iter()
        .position(|abbr| abbr.eq_ignore_ascii_case(part))
        .map(|i| (i + 1) as u32)
}

fn days_in_month(month: u32) -> usize {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => 29,
        _ => 0,
    }
}
