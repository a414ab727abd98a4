//! Bounded Nelder-Mead simplex descent.

use super::{Bounds, CancelToken, OptimResult};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimizes `f` starting from `x0`, projecting every candidate point onto
/// `bounds` before evaluation. Returns the minimizing point and the final
/// objective; never fails (§4.2 failure contract).
pub fn nelder_mead<Fun>(
    f: Fun,
    x0: &[f64],
    bounds: &Bounds,
    tol: f64,
    max_iter: usize,
    cancel: &impl CancelToken,
) -> OptimResult
where
    Fun: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    assert_eq!(bounds.dim(), n);

    let eval = |x: &[f64]| -> f64 {
        let mut p = x.to_vec();
        bounds.project(&mut p);
        let v = f(&p);
        if v.is_finite() {
            v
        } else {
            f64::MAX / 2.0
        }
    };

    // Build the initial simplex: x0 plus one perturbed vertex per dimension.
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    let mut x0p = x0.to_vec();
    bounds.project(&mut x0p);
    simplex.push(x0p.clone());
    for i in 0..n {
        let mut v = x0p.clone();
        let span = (bounds.upper[i] - bounds.lower[i]).abs();
        let step = if v[i].abs() > 1e-8 {
            v[i] * 0.05
        } else {
            0.00025_f64.max(span * 0.05)
        };
        v[i] += if step.abs() > 1e-12 { step } else { 0.01 };
        bounds.project(&mut v);
        simplex.push(v);
    }

    let mut fvals: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    while iterations < max_iter {
        if cancel.cancelled() {
            break;
        }
        // Order by objective value ascending.
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| fvals[a].partial_cmp(&fvals[b]).unwrap());
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        fvals = order.iter().map(|&i| fvals[i]).collect();

        let spread = fvals[n] - fvals[0];
        if spread.abs() < tol {
            break;
        }

        // Centroid of all but the worst point.
        let mut centroid = vec![0.0; n];
        for v in simplex.iter().take(n) {
            for j in 0..n {
                centroid[j] += v[j] / n as f64;
            }
        }

        let worst = &simplex[n];
        let reflected: Vec<f64> = (0..n)
            .map(|j| centroid[j] + REFLECT * (centroid[j] - worst[j]))
            .collect();
        let f_reflected = eval(&reflected);

        if f_reflected < fvals[0] {
            let expanded: Vec<f64> = (0..n)
                .map(|j| centroid[j] + EXPAND * (reflected[j] - centroid[j]))
                .collect();
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                fvals[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                fvals[n] = f_reflected;
            }
        } else if f_reflected < fvals[n - 1] {
            simplex[n] = reflected;
            fvals[n] = f_reflected;
        } else {
            let contracted: Vec<f64> = (0..n)
                .map(|j| centroid[j] + CONTRACT * (worst[j] - centroid[j]))
                .collect();
            let f_contracted = eval(&contracted);
            if f_contracted < fvals[n] {
                simplex[n] = contracted;
                fvals[n] = f_contracted;
            } else {
                // Shrink the whole simplex toward the best point.
                let best = simplex[0].clone();
                for i in 1..=n {
                    for j in 0..n {
                        simplex[i][j] = best[j] + SHRINK * (simplex[i][j] - best[j]);
                    }
                    fvals[i] = eval(&simplex[i]);
                }
            }
        }

        iterations += 1;
    }

    let mut order: Vec<usize> = (0..=n).collect();
    order.sort_by(|&a, &b| fvals[a].partial_cmp(&fvals[b]).unwrap());
    let mut best = simplex[order[0]].clone();
    bounds.project(&mut best);
    OptimResult {
        x: best,
        f: fvals[order[0]],
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_quadratic_bowl() {
        let bounds = Bounds::new(vec![-10.0, -10.0], vec![10.0, 10.0]);
        let result = nelder_mead(
            |x| (x[0] - 3.0).powi(2) + (x[1] + 2.0).powi(2),
            &[0.0, 0.0],
            &bounds,
            1e-10,
            2000,
            &(),
        );
        assert!((result.x[0] - 3.0).abs() < 1e-3);
        assert!((result.x[1] + 2.0).abs() < 1e-3);
    }

    #[test]
    fn respects_bounds() {
        let bounds = Bounds::new(vec![0.0], vec![1.0]);
        let result = nelder_mead(|x| (x[0] - 5.0).powi(2), &[0.5], &bounds, 1e-12, 500, &());
        assert!(result.x[0] <= 1.0 + 1e-9 && result.x[0] >= 0.0);
    }
}
