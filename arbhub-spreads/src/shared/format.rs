/// Display formatting for prices, volumes and freshness labels
///
/// All functions are pure; inputs are assumed to be finite numbers.
use chrono::Utc;

/// Placeholder shown when a volume is unknown
pub const VOLUME_PLACEHOLDER: &str = "—";

/// Format a price with precision scaled to its magnitude
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "$0".to_string();
    }
    if price >= 1000.0 {
        let rounded = round_half_up(price, 2);
        return format!("${}", group_thousands(&format!("{:.2}", rounded)));
    }
    if price >= 1.0 {
        return format!("${:.4}", round_half_up(price, 4));
    }
    if price >= 0.01 {
        return format!("${:.6}", round_half_up(price, 6));
    }
    format!("${:.8}", round_half_up(price, 8))
}

/// Format a quote-currency volume as `$2.5M`, `$120K` or `$950`
pub fn format_volume(volume: f64) -> String {
    if volume == 0.0 {
        return VOLUME_PLACEHOLDER.to_string();
    }
    if volume >= 1_000_000.0 {
        return format!("${:.1}M", round_half_up(volume / 1_000_000.0, 1));
    }
    if volume >= 1_000.0 {
        return format!("${:.0}K", round_half_up(volume / 1_000.0, 0));
    }
    format!("${:.0}", round_half_up(volume, 0))
}

/// Relative label for a past Unix-seconds timestamp, e.g. `42s ago`
///
/// A zero timestamp means "never" and yields an empty string.
pub fn format_time_since(ts: f64) -> String {
    format_time_since_at(ts, unix_now())
}

/// [`format_time_since`] against an explicit clock
pub fn format_time_since_at(ts: f64, now: f64) -> String {
    if ts == 0.0 || ts.is_nan() {
        return String::new();
    }
    let seconds = (now - ts).round().max(0.0) as u64;
    match seconds {
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s => format!("{}h ago", s / 3600),
    }
}

/// Spread percentage with explicit sign, e.g. `+1.48%`
pub fn format_spread_pct(spread: f64) -> String {
    format!("+{spread}%")
}

/// Funding fraction as a signed percentage, e.g. `+0.01%` for 0.0001
pub fn format_funding(funding: f64) -> String {
    let sign = if funding >= 0.0 { "+" } else { "" };
    format!("{sign}{:.2}%", funding * 100.0)
}

/// Toolbar summary, e.g. `2 tokens · 1 spread`
pub fn format_summary(tokens: usize, spreads: usize) -> String {
    format!(
        "{} token{} · {} spread{}",
        tokens,
        plural(tokens),
        spreads,
        plural(spreads)
    )
}

/// Current wall clock as fractional Unix seconds
pub fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Round to `decimals` places with ties away from zero
///
/// `{:.N}` alone resolves exact ties to even (2.5 -> "2").
fn round_half_up(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Insert `,` separators into the integer part of a plain decimal string
fn group_thousands(plain: &str) -> String {
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (plain, None),
    };

    let digits = int_part.len();
    let mut grouped = String::with_capacity(plain.len() + digits / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}
