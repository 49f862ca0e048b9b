//! `toString`: the one formatting routine every `Print`, string
//! concatenation, and struct-key coercion in the VM funnels through. See
//! spec.md §4.4.
//!
//! Rust's `f64` formatting has no locale dependency to begin with, so the
//! "force the C/POSIX locale" caveat in spec.md §9 is moot here — this
//! builds the `%.14g`-equivalent representation digit-by-digit instead of
//! calling into any locale-aware formatter.

use quill_core::Value;

pub fn stringify(v: Value) -> String {
    match v {
        Value::Nil => "nil".to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => String::from_utf8_lossy(unsafe { s.get() }.as_bytes()).into_owned(),
        Value::Array(a) => format!("array@{:#x}", a.addr()),
        Value::Struct(s) => format!("struct@{:#x}", s.addr()),
        Value::Func(f) => format!("func@{:#x}", f.addr()),
        Value::Thread(t) => format!("thread@{:#x}", t.addr()),
    }
}

/// Shortest decimal that round-trips within 14 significant digits,
/// switching to scientific notation exactly where C's `%g` does: when
/// the base-10 exponent is `< -4` or `>= 14`.
fn format_number(n: f64) -> String {
    if n == 0.0 {
        return if n.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }
    if !n.is_finite() {
        return if n.is_nan() {
            "nan".to_string()
        } else if n > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    const PRECISION: usize = 14;
    let neg = n.is_sign_negative();
    let abs = n.abs();

    let sci = format!("{:.*e}", PRECISION - 1, abs);
    let (mantissa, exp_str) = sci.split_once('e').expect("scientific format always has an exponent");
    let exp: i32 = exp_str.parse().expect("exponent is always a valid integer");
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let body = if exp < -4 || exp >= PRECISION as i32 {
        format_scientific(&digits, exp)
    } else if exp >= 0 {
        format_fixed_integral(&digits, exp)
    } else {
        format_fixed_fractional(&digits, exp)
    };

    if neg { format!("-{body}") } else { body }
}

fn format_scientific(digits: &str, exp: i32) -> String {
    let frac = digits[1..].trim_end_matches('0');
    let mut out = digits[0..1].to_string();
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out.push('e');
    if exp >= 0 {
        out.push('+');
    }
    out.push_str(&exp.to_string());
    out
}

/// `exp >= 0`: the decimal point lands `exp + 1` digits in.
fn format_fixed_integral(digits: &str, exp: i32) -> String {
    let int_len = (exp + 1) as usize;
    if int_len >= digits.len() {
        format!("{digits:0<int_len$}")
    } else {
        let frac = digits[int_len..].trim_end_matches('0');
        if frac.is_empty() {
            digits[..int_len].to_string()
        } else {
            format!("{}.{}", &digits[..int_len], frac)
        }
    }
}

/// `-4 <= exp < 0`: leading zeros after the decimal point.
fn format_fixed_fractional(digits: &str, exp: i32) -> String {
    let zeros = (-exp - 1) as usize;
    let frac = format!("{}{digits}", "0".repeat(zeros));
    let frac = frac.trim_end_matches('0');
    let frac = if frac.is_empty() { "0" } else { frac };
    format!("0.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_stringifies() {
        assert_eq!(stringify(Value::Nil), "nil");
    }

    #[test]
    fn integral_numbers_have_no_trailing_point() {
        assert_eq!(stringify(Value::Number(7.0)), "7");
        assert_eq!(stringify(Value::Number(3628800.0)), "3628800");
    }

    #[test]
    fn fractional_numbers_trim_trailing_zeros() {
        assert_eq!(stringify(Value::Number(0.1)), "0.1");
        assert_eq!(stringify(Value::Number(1.5)), "1.5");
    }

    #[test]
    fn negative_numbers_keep_their_sign() {
        assert_eq!(stringify(Value::Number(-42.0)), "-42");
    }

    #[test]
    fn round_trips_through_rust_parsing() {
        for n in [1.0, -1.0, 0.1, 123456789.125, 1e20, 1e-20, 3628800.0] {
            let s = stringify(Value::Number(n));
            let parsed: f64 = s.parse().unwrap();
            assert_eq!(
                stringify(Value::Number(parsed)),
                s,
                "{n} -> {s} -> {parsed} did not round-trip"
            );
        }
    }
}
