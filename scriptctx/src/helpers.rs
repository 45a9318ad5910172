//! Native helpers injected into every instance: `formatTimestamp` and
//! `sprintf`.
//!
//! Both take native values and report failures as plain strings, which the
//! bridge turns into Lua runtime errors.

use std::sync::OnceLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, TimeZone};
use regex::Regex;
use serde_json::Value;

/// Pattern used by `formatTimestamp` when none (or an empty one) is given.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── formatTimestamp ───────────────────────────────────────────────────────────

/// Format Unix seconds in local time with a strftime-style pattern.
pub fn format_timestamp(secs: i64, pattern: Option<&str>) -> Result<String, String> {
    format_timestamp_in(&Local, secs, pattern)
}

/// [`format_timestamp`] in an explicit time zone.
pub fn format_timestamp_in<Tz>(tz: &Tz, secs: i64, pattern: Option<&str>) -> Result<String, String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let pattern = pattern.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_TIMESTAMP_FORMAT);

    // chrono panics while displaying a pattern it failed to parse.
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid timestamp pattern {pattern:?}"));
    }

    let dt = tz
        .timestamp_opt(secs, 0)
        .earliest()
        .ok_or_else(|| format!("timestamp {secs} is out of range"))?;
    Ok(dt.format_with_items(items.iter()).to_string())
}

// ── sprintf ───────────────────────────────────────────────────────────────────

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"%([-+ 0#]*)(\d+)?(?:\.(\d+))?([a-zA-Z%])").expect("static regex is valid")
    })
}

/// Largest width or precision a directive may ask for.
const MAX_FIELD: usize = 1_000_000;

#[derive(Debug, Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// printf-style formatting over native values.
///
/// Verbs: `%d %i %s %v %f %F %e %E %g %G %x %X %o %c %q %t %%`, with flags
/// `- + 0 space #`, width and precision.  A directive without a matching
/// argument is an error; surplus arguments are ignored.
pub fn sprintf(fmt: &str, args: &[Value]) -> Result<String, String> {
    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut last = 0;

    for caps in directive_re().captures_iter(fmt) {
        let whole = caps.get(0).expect("group 0 always matches");
        out.push_str(&fmt[last..whole.start()]);
        last = whole.end();

        let verb = caps[4].chars().next().unwrap_or('%');
        if verb == '%' {
            out.push('%');
            continue;
        }

        let flags = caps.get(1).map_or("", |m| m.as_str());
        let spec = Spec {
            left: flags.contains('-'),
            zero: flags.contains('0'),
            plus: flags.contains('+'),
            space: flags.contains(' '),
            alt: flags.contains('#'),
            width: field(caps.get(2), "width")?,
            precision: field(caps.get(3), "precision")?,
        };

        let arg = args
            .next()
            .ok_or_else(|| format!("missing argument for %{verb}"))?;
        out.push_str(&format_one(verb, &spec, arg)?);
    }
    out.push_str(&fmt[last..]);
    Ok(out)
}

/// Parse a width or precision, rejecting values past [`MAX_FIELD`].
fn field(m: Option<regex::Match<'_>>, what: &str) -> Result<Option<usize>, String> {
    let Some(m) = m else { return Ok(None) };
    match m.as_str().parse::<usize>() {
        Ok(n) if n <= MAX_FIELD => Ok(Some(n)),
        _ => Err(format!("{what} too large")),
    }
}

fn format_one(verb: char, spec: &Spec, arg: &Value) -> Result<String, String> {
    let (body, numeric) = match verb {
        'd' | 'i' => (signed(spec, as_int(arg, verb)?.to_string()), true),
        'f' | 'F' => {
            let x = as_float(arg, verb)?;
            (signed(spec, format!("{:.*}", spec.precision.unwrap_or(6), x)), true)
        }
        'e' | 'E' => {
            let s = exp_notation(as_float(arg, verb)?, spec.precision.unwrap_or(6));
            let s = if verb == 'E' { s.to_uppercase() } else { s };
            (signed(spec, s), true)
        }
        'g' | 'G' => {
            let s = general(as_float(arg, verb)?, spec.precision);
            let s = if verb == 'G' { s.to_uppercase() } else { s };
            (signed(spec, s), true)
        }
        'x' | 'X' | 'o' => {
            let s = match arg {
                Value::String(s) if verb != 'o' => s.bytes().map(|b| format!("{b:02x}")).collect(),
                _ => {
                    let n = as_int(arg, verb)?;
                    let (neg, mag) = (n < 0, n.unsigned_abs());
                    let digits = match verb {
                        'o' if spec.alt => format!("0{mag:o}"),
                        'o' => format!("{mag:o}"),
                        _ if spec.alt => format!("0x{mag:x}"),
                        _ => format!("{mag:x}"),
                    };
                    if neg { format!("-{digits}") } else { digits }
                }
            };
            let s = if verb == 'X' { s.to_uppercase() } else { s };
            (s, true)
        }
        'c' => {
            let n = as_int(arg, verb)?;
            let c = u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("%c: {n} is not a valid character"))?;
            (c.to_string(), false)
        }
        't' => match arg {
            Value::Bool(b) => (b.to_string(), false),
            other => return Err(format!("%t expects a boolean, got {}", display(other))),
        },
        's' | 'v' => (truncate(display(arg), spec.precision), false),
        'q' => {
            let s = match arg {
                Value::String(s) => s.clone(),
                other => display(other),
            };
            (serde_json::to_string(&s).map_err(|e| e.to_string())?, false)
        }
        other => return Err(format!("unknown verb %{other}")),
    };
    Ok(pad(body, spec, numeric))
}

/// Render a native value the way `%v` and `print` do: strings raw, `null`
/// as `nil`, everything else as JSON.
pub fn display(v: &Value) -> String {
    match v {
        Value::Null => "nil".to_owned(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_int(v: &Value, verb: char) -> Result<i64, String> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| format!("%{verb} expects an integer, got {n}")),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(format!("%{verb} expects an integer, got {}", display(other))),
    }
}

fn as_float(v: &Value, verb: char) -> Result<f64, String> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("%{verb}: {n} is not a float")),
        other => Err(format!("%{verb} expects a number, got {}", display(other))),
    }
}

fn signed(spec: &Spec, s: String) -> String {
    if s.starts_with('-') {
        s
    } else if spec.plus {
        format!("+{s}")
    } else if spec.space {
        format!(" {s}")
    } else {
        s
    }
}

fn truncate(s: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s,
    }
}

/// `1.5e3` -> `1.500000e+03`.
fn exp_notation(x: f64, precision: usize) -> String {
    let s = format!("{x:.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

fn general(x: f64, precision: Option<usize>) -> String {
    if !x.is_finite() {
        return x.to_string();
    }
    let Some(p) = precision else {
        return x.to_string();
    };
    let p = p.max(1);
    let exp = if x == 0.0 { 0 } else { x.abs().log10().floor() as i32 };
    if exp < -4 || exp >= p as i32 {
        let s = exp_notation(x, p - 1);
        match s.split_once('e') {
            Some((m, e)) => format!("{}e{e}", trim_zeros(m)),
            None => s,
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{x:.decimals$}")).to_owned()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn pad(body: String, spec: &Spec, numeric: bool) -> String {
    let Some(width) = spec.width else { return body };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if spec.left {
        format!("{body}{}", " ".repeat(fill))
    } else if spec.zero && numeric {
        // Zeros go between the sign and the digits.
        let (sign, digits) = match body.chars().next() {
            Some(c @ ('-' | '+' | ' ')) => (c.to_string(), &body[1..]),
            _ => (String::new(), body.as_str()),
        };
        format!("{sign}{}{digits}", "0".repeat(fill))
    } else {
        format!("{}{body}", " ".repeat(fill))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn f(fmt: &str, args: &[Value]) -> String {
        sprintf(fmt, args).unwrap()
    }

    #[test]
    fn default_pattern() {
        let s = format_timestamp_in(&Utc, 0, None).unwrap();
        assert_eq!(s, "1970-01-01 00:00:00");
        let s = format_timestamp_in(&Utc, 1_700_000_000, Some("")).unwrap();
        assert_eq!(s, "2023-11-14 22:13:20");
    }

    #[test]
    fn custom_pattern() {
        let s = format_timestamp_in(&Utc, 86_400, Some("%d/%m/%Y")).unwrap();
        assert_eq!(s, "02/01/1970");
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(format_timestamp_in(&Utc, 0, Some("%Q%")).is_err());
    }

    #[test]
    fn local_time_uses_default_shape() {
        let s = format_timestamp(1_700_000_000, None).unwrap();
        assert_eq!(s.len(), "YYYY-MM-DD HH:MM:SS".len());
    }

    #[test]
    fn basic_verbs() {
        assert_eq!(f("%d + %d = %d", &[json!(1), json!(3), json!(4)]), "1 + 3 = 4");
        assert_eq!(f("hello %s", &[json!("world")]), "hello world");
        assert_eq!(f("%v|%v|%v", &[json!(null), json!([1, 2]), json!(true)]), "nil|[1,2]|true");
        assert_eq!(f("100%%", &[]), "100%");
        assert_eq!(f("%t", &[json!(false)]), "false");
        assert_eq!(f("%c", &[json!(65)]), "A");
        assert_eq!(f("%q", &[json!("a\"b")]), r#""a\"b""#);
    }

    #[test]
    fn width_and_flags() {
        assert_eq!(f("[%5d]", &[json!(42)]), "[   42]");
        assert_eq!(f("[%-5d]", &[json!(42)]), "[42   ]");
        assert_eq!(f("[%05d]", &[json!(-42)]), "[-0042]");
        assert_eq!(f("[%+d]", &[json!(7)]), "[+7]");
        assert_eq!(f("[%.3s]", &[json!("abcdef")]), "[abc]");
    }

    #[test]
    fn floats() {
        assert_eq!(f("%.2f", &[json!(3.14159)]), "3.14");
        assert_eq!(f("%f", &[json!(1)]), "1.000000");
        assert_eq!(f("%e", &[json!(1500.0)]), "1.500000e+03");
        assert_eq!(f("%.3g", &[json!(0.0001234)]), "0.000123");
        assert_eq!(f("%.3g", &[json!(123456.0)]), "1.23e+05");
    }

    #[test]
    fn hex_and_octal() {
        assert_eq!(f("%x %X %o", &[json!(255), json!(255), json!(8)]), "ff FF 10");
        assert_eq!(f("%#x", &[json!(255)]), "0xff");
        assert_eq!(f("%x", &[json!("hi")]), "6869");
    }

    #[test]
    fn errors() {
        assert!(sprintf("%d", &[]).unwrap_err().contains("missing argument"));
        assert!(sprintf("%d", &[json!("x")]).is_err());
        assert!(sprintf("%y", &[json!(1)]).unwrap_err().contains("unknown verb"));
    }

    #[test]
    fn oversized_width_and_precision_are_errors() {
        let err = sprintf("%18446744073709551615d", &[json!(1)]).unwrap_err();
        assert_eq!(err, "width too large");
        let err = sprintf("%.99999999f", &[json!(1.5)]).unwrap_err();
        assert_eq!(err, "precision too large");
        let err = sprintf("%-1000001s", &[json!("x")]).unwrap_err();
        assert_eq!(err, "width too large");
        assert_eq!(f("%1000000d", &[json!(1)]).len(), MAX_FIELD);
    }

    #[test]
    fn surplus_arguments_are_ignored() {
        assert_eq!(f("%d", &[json!(1), json!(2)]), "1");
    }
}
