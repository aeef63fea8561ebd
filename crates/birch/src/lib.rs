//! third-order Birch-Murnaghan equation of state fitting
//!
//! The model is
//!
//! ```text
//! E(V) = E0 + 9 V0 B0 / 16 * [x^3 B0' + x^2 (6 - 4y)]
//! y = (V0/V)^(2/3)
//! x = y - 1
//! ```
//!
//! with the four parameters E0, V0, B0, and B0'. Energies are in eV and
//! volumes in cubic Angstroms, making B0 come out in eV/A^3.

use na::Cholesky;
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[cfg(test)]
mod tests;

pub type Dmat = na::DMatrix<f64>;
pub type Dvec = na::DVector<f64>;

/// 1 eV/A^3 in GPa
pub const EV_PER_CUBIC_ANGSTROM: f64 = 160.21766208;

const MAXIT: usize = 200;

#[derive(Debug, PartialEq)]
pub struct FitError(pub String);

/// the fitted equation of state parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EosFit {
    /// minimum energy in eV
    pub e0: f64,
    /// equilibrium volume in A^3
    pub v0: f64,
    /// bulk modulus in eV/A^3
    pub b0: f64,
    /// pressure derivative of the bulk modulus, dimensionless
    pub bp: f64,
    /// sum of squared residuals of the converged fit
    pub rss: f64,
}

impl EosFit {
    pub fn b0_gpa(&self) -> f64 {
        self.b0 * EV_PER_CUBIC_ANGSTROM
    }
}

impl Display for EosFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "E0 = {:16.8} eV", self.e0)?;
        writeln!(f, "V0 = {:16.8} A^3", self.v0)?;
        writeln!(
            f,
            "B0 = {:16.8} eV/A^3 = {:12.4} GPa",
            self.b0,
            self.b0_gpa()
        )?;
        writeln!(f, "B0' = {:15.8}", self.bp)?;
        write!(f, "RSS = {:15.8e}", self.rss)
    }
}

/// the (volume, energy) data to fit
#[derive(Clone, Debug, PartialEq)]
pub struct Birch {
    pub volumes: Dvec,
    pub energies: Dvec,
}

impl Birch {
    /// build a fitting problem from (volume, energy) pairs. the model has
    /// four parameters, so four points is the bare minimum
    pub fn new(points: &[(f64, f64)]) -> Result<Self, FitError> {
        if points.len() < 4 {
            return Err(FitError(format!(
                "need at least 4 (volume, energy) points, got {}",
                points.len()
            )));
        }
        if let Some((v, _)) = points.iter().find(|(v, _)| *v <= 0.0) {
            return Err(FitError(format!("non-positive volume {v}")));
        }
        Ok(Self {
            volumes: Dvec::from_iterator(
                points.len(),
                points.iter().map(|p| p.0),
            ),
            energies: Dvec::from_iterator(
                points.len(),
                points.iter().map(|p| p.1),
            ),
        })
    }

    /// evaluate the model at volume `v` for the parameters
    /// `[e0, v0, b0, bp]`
    pub fn eval(p: &[f64; 4], v: f64) -> f64 {
        let [e0, v0, b0, bp] = *p;
        let y = (v0 / v).powf(2.0 / 3.0);
        let x = y - 1.0;
        e0 + 9.0 * v0 * b0 / 16.0
            * (x.powi(3) * bp + x.powi(2) * (6.0 - 4.0 * y))
    }

    fn rss(&self, p: &[f64; 4]) -> f64 {
        self.volumes
            .iter()
            .zip(self.energies.iter())
            .map(|(&v, &e)| {
                let r = Self::eval(p, v) - e;
                r * r
            })
            .sum()
    }

    /// residuals r_i = E_model(v_i) - E_i and the Jacobian of the model with
    /// respect to the parameters, evaluated at `p`
    fn jacobian(&self, p: &[f64; 4]) -> (Dmat, Dvec) {
        let [e0, v0, b0, bp] = *p;
        let n = self.volumes.len();
        let mut jac = Dmat::zeros(n, 4);
        let mut res = Dvec::zeros(n);
        for i in 0..n {
            let v = self.volumes[i];
            let y = (v0 / v).powf(2.0 / 3.0);
            let x = y - 1.0;
            let c = 9.0 * v0 * b0 / 16.0;
            let f = Self::eval(p, v);
            jac[(i, 0)] = 1.0;
            // the bracket scales linearly with both c factors
            jac[(i, 2)] = (f - e0) / b0;
            jac[(i, 3)] = c * x.powi(3);
            let dbracket = 3.0 * x.powi(2) * bp + 2.0 * x * (6.0 - 4.0 * y)
                - 4.0 * x.powi(2);
            let dy = 2.0 * y / (3.0 * v0);
            jac[(i, 1)] = (f - e0) / v0 + c * dbracket * dy;
            res[i] = f - self.energies[i];
        }
        (jac, res)
    }

    /// seed the nonlinear fit with a quadratic fit E = c0 + c1 V + c2 V^2.
    /// the parabola minimum gives V0 and E0, its curvature gives B0, and
    /// B0' = 4 is the usual starting guess
    fn seed(&self) -> Result<[f64; 4], FitError> {
        let n = self.volumes.len();
        let mut x = Dmat::zeros(n, 3);
        for i in 0..n {
            let v = self.volumes[i];
            x[(i, 0)] = 1.0;
            x[(i, 1)] = v;
            x[(i, 2)] = v * v;
        }
        let xt = x.transpose();
        let c = solve(&(&xt * &x), &(&xt * &self.energies))?;
        let (c0, c1, c2) = (c[0], c[1], c[2]);
        if c2 <= 0.0 {
            return Err(FitError(
                "no energy minimum in the sampled volume range".to_string(),
            ));
        }
        let v0 = -c1 / (2.0 * c2);
        if v0 <= 0.0 {
            return Err(FitError(format!(
                "unphysical seed volume {v0}"
            )));
        }
        let e0 = c0 - c1 * c1 / (4.0 * c2);
        let b0 = 2.0 * c2 * v0;
        Ok([e0, v0, b0, 4.0])
    }

    /// fit the four equation of state parameters to the data by
    /// Levenberg-Marquardt iteration from the quadratic seed
    pub fn fit(&self) -> Result<EosFit, FitError> {
        self.fit_with(MAXIT)
    }

    fn fit_with(&self, maxit: usize) -> Result<EosFit, FitError> {
        let mut p = self.seed()?;
        let mut lambda = 1e-3;
        let mut rss = self.rss(&p);
        let mut converged = false;
        for _ in 0..maxit {
            let (jac, res) = self.jacobian(&p);
            let jt = jac.transpose();
            let mut a = &jt * &jac;
            let g = &jt * &res;
            for i in 0..4 {
                a[(i, i)] *= 1.0 + lambda;
            }
            let delta = solve(&a, &g)?;
            let trial = [
                p[0] - delta[0],
                p[1] - delta[1],
                p[2] - delta[2],
                p[3] - delta[3],
            ];
            let trial_rss = self.rss(&trial);
            if trial_rss <= rss {
                let done = delta.amax() < 1e-12
                    || rss - trial_rss < 1e-14 * (1.0 + rss);
                p = trial;
                rss = trial_rss;
                lambda = (lambda / 10.0).max(1e-12);
                if done {
                    converged = true;
                    break;
                }
            } else {
                lambda *= 10.0;
                if lambda > 1e10 {
                    return Err(FitError(
                        "Levenberg-Marquardt failed to make progress"
                            .to_string(),
                    ));
                }
            }
        }
        if !converged {
            return Err(FitError("too many iterations".to_string()));
        }
        let [e0, v0, b0, bp] = p;
        if v0 <= 0.0 || b0 <= 0.0 {
            return Err(FitError(format!(
                "converged to unphysical parameters V0 = {v0}, B0 = {b0}"
            )));
        }
        Ok(EosFit {
            e0,
            v0,
            b0,
            bp,
            rss,
        })
    }
}

/// solve the linear system `a`x = `b`, trying the Cholesky decomposition
/// first and falling back on the LU decomposition if it fails
fn solve(a: &Dmat, b: &Dvec) -> Result<Dvec, FitError> {
    if let Some(chol) = Cholesky::new(a.clone()) {
        let l = chol.l();
        let z = l.solve_lower_triangular(b).unwrap();
        let r = l.transpose();
        return Ok(r.solve_upper_triangular(&z).unwrap());
    }
    match na::LU::new(a.clone()).try_inverse() {
        Some(inv) => Ok(inv * b),
        None => Err(FitError(
            "failed to solve the normal equations".to_string(),
        )),
    }
}
