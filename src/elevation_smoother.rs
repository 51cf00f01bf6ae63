/// ELEVATION SMOOTHER
///
/// Savitzky-Golay filter: each output sample is the value at that point of
/// a least-squares polynomial fitted over a sliding window. Unlike a moving
/// average it keeps the height of short climbs.
///
/// The window widens with point density (`len / density_divisor`) so dense
/// recordings get proportionally more smoothing. The edges, where a centred
/// window does not fit, are evaluated from a polynomial fitted to the first
/// or last full window.

use crate::config::SmoothingConfig;
use crate::error::CourseError;

/// Window length for a series of `len` samples; always odd.
pub fn window_length(len: usize, config: &SmoothingConfig) -> usize {
    let window = config.min_window.max(len / config.density_divisor);
    if window % 2 == 0 {
        window + 1
    } else {
        window
    }
}

/// Smooths `elevations`, returning a series of the same length.
pub fn smooth_elevations(elevations: &[f64], config: &SmoothingConfig) -> Result<Vec<f64>, CourseError> {
    let min = config.min_window.max(config.poly_order + 1);
    if elevations.len() < min {
        return Err(CourseError::SmoothingWindow {
            len: elevations.len(),
            min,
        });
    }

    // A coarse density divisor or an even minimum can push the window past
    // the series; fall back to the widest odd window that fits.
    let mut window = window_length(elevations.len(), config);
    if window > elevations.len() {
        window = if elevations.len() % 2 == 0 {
            elevations.len() - 1
        } else {
            elevations.len()
        };
    }
    if window <= config.poly_order {
        return Err(CourseError::SmoothingWindow {
            len: elevations.len(),
            min: config.poly_order + 2,
        });
    }

    Ok(savitzky_golay(elevations, window, config.poly_order))
}

/// Raw filter. Callers guarantee `window` is odd, `window <= data.len()` and
/// `order < window`.
pub fn savitzky_golay(data: &[f64], window: usize, order: usize) -> Vec<f64> {
    let n = data.len();
    let half = window / 2;
    let coeffs = convolution_coefficients(half, order);
    let mut out = vec![0.0; n];

    for i in half..n - half {
        out[i] = coeffs
            .iter()
            .zip(&data[i - half..=i + half])
            .map(|(c, v)| c * v)
            .sum();
    }

    // Edges: fit the first/last window, centred on its middle sample
    let head = polyfit(&data[..window], half, order);
    for (i, slot) in out.iter_mut().enumerate().take(half) {
        *slot = polyval(&head, i as f64 - half as f64);
    }
    let tail = polyfit(&data[n - window..], half, order);
    for i in n - half..n {
        let x = (i - (n - window)) as f64 - half as f64;
        out[i] = polyval(&tail, x);
    }

    out
}

/// Weights that, applied to `2 * half + 1` samples, give the fitted value at
/// the centre.
fn convolution_coefficients(half: usize, order: usize) -> Vec<f64> {
    let normal = normal_matrix(half, order);
    let mut e0 = vec![0.0; order + 1];
    e0[0] = 1.0;
    let a = solve(normal, e0);

    (-(half as i64)..=half as i64)
        .map(|j| {
            let x = j as f64;
            a.iter().enumerate().map(|(k, ak)| ak * x.powi(k as i32)).sum()
        })
        .collect()
}

/// Least-squares polynomial over `values` at x = -half..=half.
/// Coefficients are lowest degree first.
fn polyfit(values: &[f64], half: usize, order: usize) -> Vec<f64> {
    let normal = normal_matrix(half, order);
    let rhs: Vec<f64> = (0..=order)
        .map(|k| {
            values
                .iter()
                .enumerate()
                .map(|(j, v)| v * (j as f64 - half as f64).powi(k as i32))
                .sum()
        })
        .collect();
    solve(normal, rhs)
}

fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// `M[k][l] = sum over x in -half..=half of x^(k+l)`
fn normal_matrix(half: usize, order: usize) -> Vec<Vec<f64>> {
    let powers: Vec<f64> = (0..=2 * order)
        .map(|p| {
            (-(half as i64)..=half as i64)
                .map(|j| (j as f64).powi(p as i32))
                .sum()
        })
        .collect();
    (0..=order)
        .map(|k| (0..=order).map(|l| powers[k + l]).collect())
        .collect()
}

/// Gaussian elimination with partial pivoting. The normal matrix of a
/// window wider than the polynomial order is symmetric positive definite.
fn solve(mut m: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r1, &r2| m[r1][col].abs().total_cmp(&m[r2][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = m[row][col] / m[col][col];
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / m[row][row];
    }
    x
}
