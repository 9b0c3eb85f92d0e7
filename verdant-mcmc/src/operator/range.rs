//! Mapping an arbitrary kernel distribution onto a bounded interval.
//!
//! A draw `x` from the kernel is first made positive with `exp` when the
//! kernel's support has no lower bound. A half-line support `[a, inf)` is then
//! retracted onto `(0, 1]` with `1 / (x - a + 1)`, and a bounded support
//! `[a, b]` is rescaled affinely to `[0, 1]`. The unit value is finally
//! stretched onto `[low, high]`.

use verdant_stats::{Distribution, Rng};

enum Shape {
    Bounded { a: f64, b: f64 },
    HalfLine { a: f64 },
}

fn shape(kernel: &dyn Distribution) -> (bool, Shape) {
    let (mut a, mut b) = (kernel.lower(), kernel.upper());
    let logged = a == f64::NEG_INFINITY;
    if logged {
        a = 0.0;
        b = b.exp();
    }
    let shape = if b == f64::INFINITY {
        Shape::HalfLine { a }
    } else {
        Shape::Bounded { a, b }
    };
    (logged, shape)
}

/// Draw from `kernel` and map the draw into `[low, high]`.
pub fn sample_range(low: f64, high: f64, kernel: &dyn Distribution, rng: &mut Rng) -> f64 {
    let (logged, shape) = shape(kernel);
    let mut x = kernel.sample(rng);
    if logged {
        x = x.exp();
    }
    let t = match shape {
        Shape::HalfLine { a } => 1.0 / ((x - a).max(0.0) + 1.0),
        Shape::Bounded { a, b } => (x - a) / (b - a),
    };
    let t = if t.is_nan() { 0.5 } else { t.clamp(0.0, 1.0) };
    low + (high - low) * t
}

/// Log density of `y` under [`sample_range`] with the same arguments, or
/// `None` if the kernel has no density.
pub fn range_ln_density(low: f64, high: f64, kernel: &dyn Distribution, y: f64) -> Option<f64> {
    if !(low < high) || y < low || y > high {
        return Some(f64::NEG_INFINITY);
    }
    let (logged, shape) = shape(kernel);
    let t = (y - low) / (high - low);
    let mut ln_jacobian = -(high - low).ln();

    let x = match shape {
        Shape::HalfLine { a } => {
            ln_jacobian -= 2.0 * t.ln();
            a + 1.0 / t - 1.0
        }
        Shape::Bounded { a, b } => {
            ln_jacobian += (b - a).ln();
            (a + t * (b - a)).clamp(a, b)
        }
    };
    let z = if logged {
        ln_jacobian -= x.ln();
        x.ln()
    } else {
        x
    };
    Some(kernel.ln_density(z)? + ln_jacobian)
}
