//   Copyright 2026 The snopt-rs Developers
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.

//! Minimize a quadratic bowl subject to one linear and one non-linear
//! constraint, then print the solution and the constraint multipliers.
//!
//! The unconstrained minimum at `(0, -1)` violates both constraints, so the
//! solver has to trade the two off along their boundaries.

use snopt::*;

/// Minimize `0.25 (x^2 + (y + 1)^2)` subject to
/// `x^2 + y^2 <= 4` and `x + y >= 1`.
struct NLP;

impl BasicProblem for NLP {
    fn num_variables(&self) -> usize {
        2
    }
    fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool {
        x_l.fill(-SNOPT_INFINITY);
        x_u.fill(SNOPT_INFINITY);
        true
    }
    fn initial_point(&self, x: &mut [Number]) -> bool {
        x[0] = 0.5;
        x[1] = 0.8;
        true
    }
    fn objective(&self, x: &[Number], obj: &mut Number) -> bool {
        *obj = 0.25 * (x[0] * x[0] + (x[1] + 1.0) * (x[1] + 1.0));
        true
    }
    fn objective_grad(&self, x: &[Number], grad_f: &mut [Number]) -> bool {
        grad_f[0] = 0.5 * x[0];
        grad_f[1] = 0.5 * (x[1] + 1.0);
        true
    }
}

impl ConstrainedProblem for NLP {
    fn num_constraints(&self) -> usize {
        2
    }
    fn num_jacobian_non_zeros(&self) -> usize {
        4
    }
    fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool {
        // Disc of radius 2 around the origin.
        g_l[0] = -SNOPT_INFINITY;
        g_u[0] = 4.0;
        // Half plane above the line x + y = 1.
        g_l[1] = 1.0;
        g_u[1] = SNOPT_INFINITY;
        true
    }
    fn constraints(&self, x: &[Number], g: &mut [Number]) -> bool {
        g[0] = x[0] * x[0] + x[1] * x[1];
        g[1] = x[0] + x[1];
        true
    }
    fn jacobian_indices(&self, rows: &mut [Index], cols: &mut [Index]) -> bool {
        rows[0] = 0;
        cols[0] = 0;
        rows[1] = 0;
        cols[1] = 1;
        rows[2] = 1;
        cols[2] = 0;
        rows[3] = 1;
        cols[3] = 1;
        true
    }
    fn jacobian_values(&self, x: &[Number], vals: &mut [Number]) -> bool {
        vals[0] = 2.0 * x[0];
        vals[1] = 2.0 * x[1];
        vals[2] = 1.0;
        vals[3] = 1.0;
        true
    }
}

fn main() {
    let mut snopt = SnoptSolver::new(NLP).expect("failed to set up the solver");
    snopt
        .apply_default_options()
        .and_then(|s| s.set_option("Major optimality tolerance", 1e-8))
        .expect("failed to configure the solver");

    let result = snopt.solve();

    println!("status: {:?}", result.status);
    println!("objective: {:.6}", result.objective_value);

    let solution = &result.solver_data.solution;
    for (i, x) in solution.primal_variables.iter().enumerate() {
        println!("x[{}] = {:.6}", i, x);
    }
    for (i, (g, mul)) in solution
        .constraint_values
        .iter()
        .zip(solution.constraint_multipliers.iter())
        .enumerate()
    {
        println!("g[{}] = {:.6}  (multiplier {:.6})", i, g, mul);
    }

    assert!(result.status.is_success());
}
