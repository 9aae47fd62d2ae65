use super::domain::{FlagSeverity, Grade, HeatLevel};

/// Render a monetary amount with thousands separators, e.g. `$1,234.56`.
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (offset, ch) in digits.chars().enumerate() {
        if offset > 0 && (digits.len() - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-${grouped}.{fraction:02}")
    } else {
        format!("${grouped}.{fraction:02}")
    }
}

/// Parse a raw money string as extracted from a document.
///
/// Tolerates currency symbols, thousands separators, surrounding whitespace,
/// and accounting-style parentheses for negatives. Returns `None` for blank
/// or non-numeric input rather than guessing.
pub fn parse_money(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return None;
    }

    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let inner = if negative {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let cleaned: String = inner
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(if negative { -value } else { value })
}

/// Render a percentage with one decimal place, e.g. `12.5%`.
pub fn format_pct(value: f64) -> String {
    format!("{value:.1}%")
}

/// Render a byte count for file listings, e.g. `1.2 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{bytes:.0} B")
    } else if bytes < KIB * KIB {
        format!("{:.1} KB", bytes / KIB)
    } else {
        format!("{:.1} MB", bytes / (KIB * KIB))
    }
}

/// Round a monetary value to currency precision.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round a quantity to one decimal place.
pub fn round_quantity(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Canonical form used to match line items across documents: lowercased,
/// BOM stripped, runs of whitespace collapsed to single spaces.
pub fn normalize_label(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub const fn severity_color(severity: FlagSeverity) -> &'static str {
    match severity {
        FlagSeverity::Critical => "#dc2626",
        FlagSeverity::Warning => "#d97706",
        FlagSeverity::Info => "#2563eb",
    }
}

pub const fn grade_color(grade: Grade) -> &'static str {
    match grade {
        Grade::A => "#16a34a",
        Grade::B => "#65a30d",
        Grade::C => "#d97706",
        Grade::D => "#ea580c",
        Grade::F => "#dc2626",
    }
}

/// CSS class used by renderers to shade a heatmap cell.
pub const fn heat_class(level: HeatLevel) -> &'static str {
    match level {
        HeatLevel::VeryLow => "heat-very-low",
        HeatLevel::Low => "heat-low",
        HeatLevel::Neutral => "heat-neutral",
        HeatLevel::High => "heat-high",
        HeatLevel::VeryHigh => "heat-very-high",
        HeatLevel::Missing => "heat-missing",
    }
}
