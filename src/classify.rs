/// Fixed grade -> remark and remark -> color tables. Both are process-wide
/// constants; anything outside them classifies to an empty remark.
const NUMERIC_REMARKS: &[(f64, &str)] = &[
    (1.00, "Excellent"),
    (1.25, "Excellent"),
    (1.50, "Very Good"),
    (1.75, "Very Good"),
    (2.00, "Above Average"),
    (2.25, "Above Average"),
    (2.50, "Average"),
    (2.75, "Average"),
    (3.00, "Passing"),
    (5.00, "Failed"),
];

const LITERAL_REMARKS: &[(&str, &str)] = &[
    ("INC", "Incomplete"),
    ("W", "Withdrawn"),
    ("D/F", "Dropped with Failure"),
    ("OD", "Officially Dropped"),
];

const REMARK_COLORS: &[(&str, &str)] = &[
    ("Excellent", "#d4edda"),
    ("Very Good", "#c3e6cb"),
    ("Above Average", "#ffeeba"),
    ("Average", "#fff3cd"),
    ("Passing", "#d1ecf1"),
    ("Failed", "#f8d7da"),
    ("Incomplete", "#f5c6cb"),
    ("Withdrawn", "#e2e3e5"),
    ("Dropped with Failure", "#f8d7da"),
    ("Officially Dropped", "#d6d8d9"),
];

pub const DEFAULT_COLOR: &str = "#fff";

/// A token counts as numeric when it is all ASCII digits with at most one
/// decimal point. No sign, no exponent: "5.00" yes, "-1" and "1e0" no.
fn looks_numeric(token: &str) -> bool {
    !token.is_empty()
        && token.chars().all(|c| c.is_ascii_digit() || c == '.')
        && token.chars().filter(|c| *c == '.').count() <= 1
}

/// Remark for a raw final-grade token. Unknown tokens (including "4.00" and
/// the empty string) resolve to "" rather than an error.
pub fn remark_for(final_grade: &str) -> &'static str {
    let token = final_grade.trim().to_ascii_uppercase();
    if looks_numeric(&token) {
        if let Ok(v) = token.parse::<f64>() {
            for &(key, remark) in NUMERIC_REMARKS {
                if (v - key).abs() < 1e-9 {
                    return remark;
                }
            }
        }
        return "";
    }
    for &(key, remark) in LITERAL_REMARKS {
        if token == key {
            return remark;
        }
    }
    ""
}

pub fn color_for(remark: &str) -> &'static str {
    for &(key, color) in REMARK_COLORS {
        if remark == key {
            return color;
        }
    }
    DEFAULT_COLOR
}

pub fn classify(final_grade: &str) -> (&'static str, &'static str) {
    let remark = remark_for(final_grade);
    (remark, color_for(remark))
}
