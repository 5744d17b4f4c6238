use unicode_width::UnicodeWidthChar;

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Half-up rounding (`floor(x + 0.5)`), so 2.5 -> 3 and -2.5 -> -2.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Round and clamp at zero, the accounting rule for every score and penalty.
pub fn non_negative_round(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    round_half_up(value).max(0.0) as u32
}

/// `MM:SS` for countdowns and durations.
pub fn format_clock(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Milliseconds as seconds with two decimals ("0.13").
pub fn format_ms(ms: f64) -> String {
    format!("{:.2}", ms / 1000.0)
}

/// Truncate to `limit` display columns, replacing the tail with "...".
pub fn truncate_text(value: &str, limit: usize) -> String {
    let text = value.trim();
    if text.is_empty() {
        return "—".to_string();
    }
    let width: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if width <= limit {
        return text.to_string();
    }

    let budget = limit.saturating_sub(3).max(1);
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[80., 70., 50., 40.]), Some(60.0));
        assert_eq!(mean(&[15., 7., 55., 12., 4.]), Some(18.6));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(2.49), 2.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(7.5), 8.0);
    }

    #[test]
    fn test_non_negative_round() {
        assert_eq!(non_negative_round(12.4), 12);
        assert_eq!(non_negative_round(12.5), 13);
        assert_eq!(non_negative_round(-4.0), 0);
        assert_eq!(non_negative_round(f64::NAN), 0);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(180), "03:00");
        assert_eq!(format_clock(149), "02:29");
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(130.0), "0.13");
        assert_eq!(format_ms(2000.0), "2.00");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("ada", 12), "ada");
        assert_eq!(truncate_text("abcdefghijklmnop", 12), "abcdefghi...");
        assert_eq!(truncate_text("   ", 12), "—");
    }
}
