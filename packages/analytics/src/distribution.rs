//! Special functions backing the correlation significance test.
//!
//! Student's t tail probabilities are expressed through the regularized
//! incomplete beta function, evaluated with Lentz's continued fraction.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;

const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

const MAX_ITERATIONS: u32 = 300;
const CONVERGENCE: f64 = 1e-15;
const TINY: f64 = 1e-300;

/// Natural log of the gamma function for `x > 0` (Lanczos approximation).
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx)
        return PI.ln() - (PI * x).sin().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = LANCZOS_COEFFICIENTS[0];
    for (c, shift) in LANCZOS_COEFFICIENTS[1..].iter().zip(1u32..) {
        sum += c / (x + f64::from(shift));
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Regularized incomplete beta function `I_x(a, b)` for `a, b > 0`.
///
/// Returns 0 for `x <= 0` and 1 for `x >= 1`.
#[must_use]
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fastest below the mean; use the
    // symmetry I_x(a, b) = 1 - I_{1-x}(b, a) above it.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = clamp_tiny(1.0 - qab * x / qap).recip();
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = f64::from(m);
        let m2 = 2.0 * m;

        // Even step
        let numerator = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = clamp_tiny(1.0 + numerator * d).recip();
        c = clamp_tiny(1.0 + numerator / c);
        h *= d * c;

        // Odd step
        let numerator = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = clamp_tiny(1.0 + numerator * d).recip();
        c = clamp_tiny(1.0 + numerator / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < CONVERGENCE {
            return h;
        }
    }

    log::debug!("Incomplete beta continued fraction did not converge (a={a}, b={b}, x={x})");
    h
}

fn clamp_tiny(value: f64) -> f64 {
    if value.abs() < TINY { TINY } else { value }
}

/// Two-tailed p-value of Student's t statistic with `df` degrees of
/// freedom.
#[must_use]
pub fn student_t_two_tailed(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t * t))
}
