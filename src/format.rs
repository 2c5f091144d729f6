//! Display strings for the clock and bar values.

/// `2024-06-01` at minute 605.5 → `2024/06/01-10:05`.
pub fn time_label(date: &str, minute_of_day: f64) -> String {
    let minute = minute_of_day.max(0.0);
    let hour = (minute / 60.0).floor() as u32;
    let min = (minute % 60.0).floor() as u32;
    format!("{}-{:02}:{:02}", date.replace('-', "/"), hour, min)
}

/// en-US digit grouping with at most three fraction digits: `1234567.25` → `1,234,567.25`.
pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let negative = value < 0.0;
    let rounded = (value.abs() * 1000.0).round() / 1000.0;
    let whole = rounded.trunc();
    let frac = rounded - whole;

    let digits = format!("{:.0}", whole);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 5);
    if negative && rounded > 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if frac > 0.0 {
        let f = format!("{:.3}", frac);
        let f = f.trim_end_matches('0');
        if let Some(dot) = f.find('.') {
            if dot + 1 < f.len() {
                out.push_str(&f[dot..]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_label_pads_hours_and_minutes() {
        assert_eq!(time_label("2024-06-01", 0.0), "2024/06/01-00:00");
        assert_eq!(time_label("2024-06-01", 605.5), "2024/06/01-10:05");
        assert_eq!(time_label("2024-06-01", 1439.99), "2024/06/01-23:59");
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(1000.0), "1,000");
        assert_eq!(format_count(1234567.0), "1,234,567");
        assert_eq!(format_count(-4321.0), "-4,321");
    }

    #[test]
    fn keeps_up_to_three_fraction_digits() {
        assert_eq!(format_count(1234.5), "1,234.5");
        assert_eq!(format_count(0.1239), "0.124");
        assert_eq!(format_count(2.0004), "2");
    }
}
