//! Limited-memory, bound-projected quasi-Newton descent (L-BFGS).

use super::{Bounds, CancelToken, OptimResult};

const HISTORY: usize = 10;
const GRAD_EPS: f64 = 1e-6;

fn numerical_gradient<Fun>(f: &Fun, x: &[f64]) -> Vec<f64>
where
    Fun: Fn(&[f64]) -> f64,
{
    let n = x.len();
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        let h = GRAD_EPS * (1.0 + x[i].abs());
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * h);
    }
    grad
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Two-loop recursion over the (s, y) history producing an approximate
/// `H * grad` search direction.
fn two_loop(
    grad: &[f64],
    s_hist: &[Vec<f64>],
    y_hist: &[Vec<f64>],
    rho: &[f64],
) -> Vec<f64> {
    let m = s_hist.len();
    let mut q = grad.to_vec();
    let mut alpha = vec![0.0; m];
    for i in (0..m).rev() {
        alpha[i] = rho[i] * dot(&s_hist[i], &q);
        for j in 0..q.len() {
            q[j] -= alpha[i] * y_hist[i][j];
        }
    }
    let gamma = if m > 0 {
        let last_s = &s_hist[m - 1];
        let last_y = &y_hist[m - 1];
        dot(last_s, last_y) / dot(last_y, last_y).max(1e-12)
    } else {
        1.0
    };
    for v in q.iter_mut() {
        *v *= gamma;
    }
    for i in 0..m {
        let beta = rho[i] * dot(&y_hist[i], &q);
        for j in 0..q.len() {
            q[j] += s_hist[i][j] * (alpha[i] - beta);
        }
    }
    q
}

/// Minimizes `f` from `x0` within `bounds`, using numerical central-
/// difference gradients and a backtracking line search. Returns on
/// gradient-norm convergence or `max_iter`; never fails.
pub fn lbfgs<Fun>(
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

    let mut x = x0.to_vec();
    bounds.project(&mut x);
    let mut fx = eval(&x);
    let mut grad = numerical_gradient(&|p| eval(p), &x);

    let mut s_hist: Vec<Vec<f64>> = Vec::with_capacity(HISTORY);
    let mut y_hist: Vec<Vec<f64>> = Vec::with_capacity(HISTORY);
    let mut rho: Vec<f64> = Vec::with_capacity(HISTORY);

    let mut iterations = 0;
    while iterations < max_iter {
        if cancel.cancelled() {
            break;
        }
        let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
        if grad_norm < tol {
            break;
        }

        let direction = two_loop(&grad, &s_hist, &y_hist, &rho);
        let mut step_dir = vec![0.0; n];
        for j in 0..n {
            step_dir[j] = -direction[j];
        }

        // Backtracking line search satisfying a simple Armijo condition.
        let mut step = 1.0;
        let c1 = 1e-4;
        let directional_deriv = dot(&grad, &step_dir);
        let mut next_x = x.clone();
        let mut next_f = fx;
        let mut accepted = false;
        for _ in 0..30 {
            for j in 0..n {
                next_x[j] = x[j] + step * step_dir[j];
            }
            bounds.project(&mut next_x);
            next_f = eval(&next_x);
            if next_f <= fx + c1 * step * directional_deriv || directional_deriv.abs() < 1e-14 {
                accepted = true;
                break;
            }
            step *= 0.5;
        }
        if !accepted {
            break;
        }

        let next_grad = numerical_gradient(&|p| eval(p), &next_x);

        let s: Vec<f64> = (0..n).map(|j| next_x[j] - x[j]).collect();
        let y: Vec<f64> = (0..n).map(|j| next_grad[j] - grad[j]).collect();
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            if s_hist.len() == HISTORY {
                s_hist.remove(0);
                y_hist.remove(0);
                rho.remove(0);
            }
            s_hist.push(s);
            y_hist.push(y);
            rho.push(1.0 / sy);
        }

        x = next_x;
        fx = next_f;
        grad = next_grad;
        iterations += 1;
    }

    OptimResult {
        x,
        f: fx,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_quadratic_bowl() {
        let bounds = Bounds::new(vec![-10.0, -10.0], vec![10.0, 10.0]);
        let result = lbfgs(
            |x| (x[0] - 1.5).powi(2) + (x[1] + 0.5).powi(2),
            &[0.0, 0.0],
            &bounds,
            1e-8,
            200,
            &(),
        );
        assert!((result.x[0] - 1.5).abs() < 1e-2);
        assert!((result.x[1] + 0.5).abs() < 1e-2);
    }

    #[test]
    fn respects_bounds() {
        let bounds = Bounds::new(vec![0.0], vec![1.0]);
        let result = lbfgs(|x| (x[0] - 5.0).powi(2), &[0.5], &bounds, 1e-10, 200, &());
        assert!(result.x[0] <= 1.0 + 1e-9);
    }
}
