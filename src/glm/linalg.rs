//! Small dense linear algebra on p x p systems (p = number of groups)

use ndarray::{Array1, Array2, ArrayView1};

/// X' W X for a design `x` (samples x coefs) and per-sample weights
pub fn xtwx(x: &Array2<f64>, weights: &[f64]) -> Array2<f64> {
    let p = x.ncols();
    let mut out = Array2::zeros((p, p));
    for (row, &w) in x.rows().into_iter().zip(weights) {
        for j in 0..p {
            let wj = w * row[j];
            if wj == 0.0 {
                continue;
            }
            for k in 0..p {
                out[[j, k]] += wj * row[k];
            }
        }
    }
    out
}

/// Lower Cholesky factor; non-positive pivots are floored at 1e-12
pub fn cholesky(a: &Array2<f64>) -> Array2<f64> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                l[[i, j]] = sum.max(1e-12).sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    l
}

fn solve_with_factor(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * y[j];
        }
        y[i] = sum / l[[i, i]];
    }
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve A x = b for symmetric positive definite A
pub fn solve_spd(a: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    solve_with_factor(&cholesky(a), b)
}

/// Inverse of a symmetric positive definite matrix
pub fn invert_spd(a: &Array2<f64>) -> Array2<f64> {
    let n = a.nrows();
    let l = cholesky(a);
    let mut inv = Array2::zeros((n, n));
    let mut e = Array1::zeros(n);
    for i in 0..n {
        e.fill(0.0);
        e[i] = 1.0;
        let col = solve_with_factor(&l, e.view());
        inv.column_mut(i).assign(&col);
    }
    inv
}

/// ln|A| for symmetric positive definite A
pub fn log_det_spd(a: &Array2<f64>) -> f64 {
    let l = cholesky(a);
    2.0 * l.diag().iter().map(|d| d.ln()).sum::<f64>()
}
