/// Body-mass index from kilograms and centimetres.
#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let m = height_cm / 100.0;
    weight_kg / (m * m)
}

#[must_use]
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// One decimal (`20.957` -> `"21.0"`), ties away from zero.
#[must_use]
pub fn format_one_decimal(v: f64) -> String {
    format!("{:.1}", round1(v))
}

/// Renders a number the way it reads in a prompt or a key: `450`, `55.5`.
#[must_use]
pub fn plain_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = v as i64;
        return whole.to_string();
    }
    format!("{v}")
}
