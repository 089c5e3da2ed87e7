//! Polar Newton-Raphson power flow.
//!
//! Unknowns are the angles at PV and PQ buses followed by the magnitudes at PQ
//! buses. The mismatch is computed minus specified injection, and each step
//! solves `J dx = -mismatch` with a sparse LU factorisation. The specified
//! injection at a bus is its constant-power part plus its constant-current part
//! scaled by `|V|`.

use log::{debug, info, warn};
use nalgebra::DVector;
use num_complex::Complex64;
use rsparse::data::{Numeric, Trpl};
use rsparse::{lsolve, lu, sqr, usolve};
use std::fmt;

use crate::admittance::{Admittance, Element};
use crate::config::SolverConfig;
use crate::error::{PowerFlowError, Result};
use crate::network::{BusType, Network, Topology};

/// Converged operating point of one admittance set.
#[derive(Debug, Clone)]
pub struct PowerFlowSolution {
    pub bus_ids: Vec<String>,
    pub voltages: Vec<Complex64>,
    /// Computed net injection `V * conj(Y V)` at every bus, slack included.
    pub bus_power: Vec<Complex64>,
    pub iterations: usize,
    pub max_mismatch: f64,
}

/// Terminal powers of one element. Positive power flows into the element.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchFlow {
    pub id: String,
    pub s_from: Complex64,
    pub s_to: Complex64,
    pub loss: Complex64,
}

impl PowerFlowSolution {
    pub fn voltage(&self, bus_id: &str) -> Option<Complex64> {
        self.bus_ids
            .iter()
            .position(|id| id == bus_id)
            .map(|k| self.voltages[k])
    }

    pub fn power(&self, bus_id: &str) -> Option<Complex64> {
        self.bus_ids
            .iter()
            .position(|id| id == bus_id)
            .map(|k| self.bus_power[k])
    }

    /// Flows on every in-service element whose two ends were solved here.
    pub fn branch_flows(&self, topology: &Topology) -> Vec<BranchFlow> {
        topology
            .elements()
            .filter_map(|element| {
                let (from, to) = element.endpoints();
                let (vf, vt) = (self.voltage(from)?, self.voltage(to)?);
                let stamp = element.stamp();
                let i_from = stamp.yff * vf + stamp.yft * vt;
                let i_to = stamp.ytf * vf + stamp.ytt * vt;
                Some(BranchFlow {
                    id: element.id().to_string(),
                    s_from: vf * i_from.conj(),
                    s_to: vt * i_to.conj(),
                    loss: element.losses(vf, vt),
                })
            })
            .collect()
    }
}

impl fmt::Display for PowerFlowSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Converged in {} iterations, max mismatch {:.3e}",
            self.iterations, self.max_mismatch
        )?;
        for ((id, v), s) in self.bus_ids.iter().zip(&self.voltages).zip(&self.bus_power) {
            writeln!(
                f,
                "  Bus {:<10} |V|={:.6}  Angle={:>9.6}  P={:>9.4}  Q={:>9.4}",
                id,
                v.norm(),
                v.arg(),
                s.re,
                s.im
            )?;
        }
        Ok(())
    }
}

/// Positions of the unknowns in the state vector.
struct Ordering {
    pvpq: Vec<usize>,
    pq: Vec<usize>,
}

impl Ordering {
    fn new(bus_types: &[BusType]) -> Self {
        let pick = |wanted: &[BusType]| -> Vec<usize> {
            bus_types
                .iter()
                .enumerate()
                .filter(|(_, t)| wanted.contains(t))
                .map(|(i, _)| i)
                .collect()
        };
        Self {
            pvpq: pick(&[BusType::PV, BusType::PQ]),
            pq: pick(&[BusType::PQ]),
        }
    }

    fn len(&self) -> usize {
        self.pvpq.len() + self.pq.len()
    }
}

fn initial_voltages(admittance: &Admittance, guess: Option<&[Complex64]>) -> DVector<Complex64> {
    let mut v = admittance.setpoints.clone();
    match guess {
        Some(guess) if guess.len() == v.len() && guess.iter().all(|z| z.norm().is_finite()) => {
            for (k, bus_type) in admittance.bus_types.iter().enumerate() {
                match bus_type {
                    BusType::Slack => {}
                    BusType::PV => {
                        v[k] = Complex64::from_polar(admittance.setpoints[k].norm(), guess[k].arg())
                    }
                    BusType::PQ => v[k] = guess[k],
                }
            }
        }
        Some(_) => warn!("initial guess does not fit the network, using flat start"),
        None => {}
    }
    v
}

fn mismatch(
    admittance: &Admittance,
    v: &DVector<Complex64>,
    order: &Ordering,
) -> (DVector<Complex64>, DVector<f64>) {
    let current = &admittance.y * v;
    let computed = v.zip_map(&current, |vi, ii| vi * ii.conj());
    let specified = |i: usize| admittance.injections[i] + admittance.currents[i] * v[i].norm();
    let mut f = DVector::<f64>::zeros(order.len());
    for (row, &i) in order.pvpq.iter().enumerate() {
        f[row] = computed[i].re - specified(i).re;
    }
    for (row, &i) in order.pq.iter().enumerate() {
        f[order.pvpq.len() + row] = computed[i].im - specified(i).im;
    }
    (current, f)
}

/// Jacobian of the mismatch wrt (angle at pvpq, magnitude at pq).
///
/// `None` when a row or column is structurally empty.
#[allow(non_snake_case)]
fn jacobian(
    admittance: &Admittance,
    v: &DVector<Complex64>,
    current: &DVector<Complex64>,
    order: &Ordering,
) -> Option<Trpl<f64>> {
    let y = &admittance.y;
    let n_pvpq = order.pvpq.len();

    // dS_i/dtheta_k = j V_i conj(delta_ik I_i - Y_ik V_k)
    let dS_dVa = |i: usize, k: usize| -> Complex64 {
        let diag = if i == k { current[i] } else { Complex64::new(0.0, 0.0) };
        Complex64::i() * v[i] * (diag - y[(i, k)] * v[k]).conj()
    };
    // dS_i/d|V_k| = V_i conj(Y_ik Vn_k) + delta_ik (conj(I_i) Vn_k - Iconst_i)
    let dS_dVm = |i: usize, k: usize| -> Complex64 {
        let vn = v[k] / v[k].norm();
        let diag = if i == k {
            current[i].conj() * vn - admittance.currents[i]
        } else {
            Complex64::new(0.0, 0.0)
        };
        v[i] * (y[(i, k)] * vn).conj() + diag
    };

    let mut jac = Trpl::<f64>::new();
    jac.m = order.len();
    jac.n = order.len();
    let mut row_hit = vec![false; order.len()];
    let mut col_hit = vec![false; order.len()];
    let mut push = |row: usize, col: usize, value: f64| {
        if value != 0.0 {
            jac.append(row, col, value);
            row_hit[row] = true;
            col_hit[col] = true;
        }
    };

    for (r, &i) in order.pvpq.iter().enumerate() {
        for (c, &k) in order.pvpq.iter().enumerate() {
            push(r, c, dS_dVa(i, k).re);
        }
        for (c, &k) in order.pq.iter().enumerate() {
            push(r, n_pvpq + c, dS_dVm(i, k).re);
        }
    }
    for (r, &i) in order.pq.iter().enumerate() {
        for (c, &k) in order.pvpq.iter().enumerate() {
            push(n_pvpq + r, c, dS_dVa(i, k).im);
        }
        for (c, &k) in order.pq.iter().enumerate() {
            push(n_pvpq + r, n_pvpq + c, dS_dVm(i, k).im);
        }
    }
    if row_hit.contains(&false) || col_hit.contains(&false) {
        return None;
    }
    jac.sum_dupl();
    Some(jac)
}

/// Solves `jac * x = rhs` in place; `None` when the factorisation breaks down.
fn lu_solve(jac: &Trpl<f64>, rhs: &mut [f64]) -> Option<()> {
    let n = rhs.len();
    let a = jac.to_sprs();
    let mut symbolic = sqr(&a, 1, false);
    let numeric = lu(&a, &mut symbolic, 1.0).ok()?;
    let mut x = vec![0.0; n];
    ipvec(&numeric.pinv, rhs, &mut x); // x = P*b
    lsolve(&numeric.l, &mut x); // x = L\x
    usolve(&numeric.u, &mut x); // x = U\x
    ipvec(&symbolic.q, &x, rhs); // b = Q*x
    rhs.iter().all(|value| value.is_finite()).then_some(())
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(perm) => {
            for k in 0..b.len() {
                x[perm[k] as usize] = b[k];
            }
        }
        None => x.copy_from_slice(b),
    }
}

// NaN anywhere makes the result NaN.
fn max_abs(f: &DVector<f64>) -> f64 {
    f.iter().fold(0.0, |acc: f64, x| {
        if x.is_nan() || acc.is_nan() {
            f64::NAN
        } else {
            acc.max(x.abs())
        }
    })
}

/// Newton-Raphson solve of one admittance set.
///
/// `initial_guess` is used when its length matches the bus count (warm start),
/// otherwise the solve starts flat. Slack voltages and PV magnitudes always come
/// from the setpoints.
pub fn solve(
    admittance: &Admittance,
    config: &SolverConfig,
    initial_guess: Option<&[Complex64]>,
) -> std::result::Result<PowerFlowSolution, PowerFlowError> {
    let order = Ordering::new(&admittance.bus_types);
    let mut v = initial_voltages(admittance, initial_guess);
    let mut iterations = 0;

    loop {
        let (current, mut f) = mismatch(admittance, &v, &order);
        let max_mismatch = max_abs(&f);
        debug!("iteration {:>3}: max mismatch {:.3e}", iterations, max_mismatch);

        if !max_mismatch.is_finite() {
            warn!("power flow diverged at iteration {}", iterations);
            return Err(PowerFlowError::NonConvergence {
                iterations,
                max_mismatch,
            });
        }
        if max_mismatch < config.tolerance {
            let bus_power = v.zip_map(&current, |vi, ii| vi * ii.conj());
            info!(
                "power flow converged in {} iterations ({} buses)",
                iterations,
                admittance.len()
            );
            return Ok(PowerFlowSolution {
                bus_ids: admittance.bus_ids.clone(),
                voltages: v.iter().copied().collect(),
                bus_power: bus_power.iter().copied().collect(),
                iterations,
                max_mismatch,
            });
        }
        if iterations >= config.max_iterations {
            warn!(
                "power flow did not converge in {} iterations, max mismatch {:.3e}",
                iterations, max_mismatch
            );
            return Err(PowerFlowError::NonConvergence {
                iterations,
                max_mismatch,
            });
        }

        f.neg_mut();
        let step = jacobian(admittance, &v, &current, &order)
            .and_then(|jac| lu_solve(&jac, f.as_mut_slice()));
        if step.is_none() {
            warn!("singular Jacobian at iteration {}", iterations);
            return Err(PowerFlowError::SingularJacobian {
                iteration: iterations,
                max_mismatch,
            });
        }

        let n_pvpq = order.pvpq.len();
        let mut angle: Vec<f64> = v.iter().map(|z| z.arg()).collect();
        let mut magnitude: Vec<f64> = v.iter().map(|z| z.norm()).collect();
        for (row, &i) in order.pvpq.iter().enumerate() {
            angle[i] += f[row];
        }
        for (row, &i) in order.pq.iter().enumerate() {
            magnitude[i] += f[n_pvpq + row];
        }
        for &i in &order.pvpq {
            v[i] = Complex64::from_polar(magnitude[i], angle[i]);
        }
        iterations += 1;
    }
}

impl Network {
    /// Assembles and solves the whole network, warm-starting from `previous`
    /// when it covers the same buses.
    pub fn solve(
        &self,
        config: &SolverConfig,
        previous: Option<&PowerFlowSolution>,
    ) -> Result<PowerFlowSolution> {
        let admittance = Admittance::assemble(&self.topology())?;
        let guess = previous
            .filter(|p| p.bus_ids == admittance.bus_ids)
            .map(|p| p.voltages.as_slice());
        Ok(solve(&admittance, config, guess)?)
    }

    /// Solves every island independently; one result per island.
    pub fn solve_islands(&self, config: &SolverConfig) -> Vec<Result<PowerFlowSolution>> {
        Admittance::assemble_islands(&self.topology())
            .into_iter()
            .map(|island| Ok(solve(&island?, config, None)?))
            .collect()
    }
}
