//! Safe interface to the SNOPT sparse nonlinear optimizer.
//!
//! SNOPT solves problems in "snOptA" form: a single vector-valued function
//! `F(x)` whose rows hold the objective and every constraint, with bounds on
//! `x` and on each row of `F`, and a sparse pattern describing which entries
//! of the derivative matrix are structurally nonzero. This crate adapts a
//! problem described through the [`BasicProblem`]/[`ConstrainedProblem`]
//! traits into that calling convention: it copies the problem's metadata
//! into the flat buffers SNOPT expects, registers an `extern "C"` callback
//! that delegates function and derivative evaluation back to the problem,
//! and forwards solver options. No optimization logic lives here.

use snopt_sys as ffi;

use std::cell::Cell;
use std::ffi::{CString, NulError};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::slice;

use tracing::debug;

pub use ffi::{Index, Number, SNOPT_INFINITY};

/// The non-linear problem to be solved by SNOPT, without general constraints
/// (simple bounds on the variables are still allowed).
///
/// `x` in the callbacks below always has length `num_variables`, and slices
/// to be filled are pre-sized by the solver wrapper. Evaluation callbacks may
/// fail by returning `false`, which tells SNOPT that the function is
/// undefined at the current point so it can try a shorter step.
pub trait BasicProblem {
    /// Total number of optimization variables.
    fn num_variables(&self) -> usize;

    /// Fill the lower and upper variable bounds.
    ///
    /// Use `-SNOPT_INFINITY`/`SNOPT_INFINITY` for absent bounds.
    fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool;

    /// Fill the initial guess for the variables.
    fn initial_point(&self, x: &mut [Number]) -> bool;

    /// Whether the problem has an objective at all. Pure feasibility
    /// problems (constraints only) return `false`; such problems can only be
    /// solved through [`SnoptSolver::new`], since without constraints there
    /// would be nothing left to do.
    fn has_objective(&self) -> bool {
        true
    }

    /// Objective function to be minimized.
    fn objective(&self, x: &[Number], obj: &mut Number) -> bool;

    /// Gradient of the objective function.
    ///
    /// The objective row is treated as structurally dense: `grad_f` has one
    /// entry per variable and every entry must be written.
    fn objective_grad(&self, x: &[Number], grad_f: &mut [Number]) -> bool;
}

/// Extends [`BasicProblem`] with general equality and inequality
/// constraints. An equality constraint is expressed by setting its lower and
/// upper bounds to the same value.
///
/// SNOPT consumes first derivatives only, so unlike interior point codes
/// there is no Hessian interface to implement.
pub trait ConstrainedProblem: BasicProblem {
    /// Number of equality and inequality constraints.
    fn num_constraints(&self) -> usize;

    /// Number of structural non-zeros in the constraint Jacobian.
    fn num_jacobian_non_zeros(&self) -> usize;

    /// Fill the lower and upper bounds on the constraint values.
    fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool;

    /// Fill the value of each constraint at `x`.
    fn constraints(&self, x: &[Number], g: &mut [Number]) -> bool;

    /// Fill the Jacobian sparsity structure as zero-based
    /// (constraint, variable) index pairs.
    ///
    /// The structure is read once at construction and must not change over
    /// the life of the solver.
    fn jacobian_indices(&self, rows: &mut [Index], cols: &mut [Index]) -> bool;

    /// Fill the Jacobian non-zero values at `x`, in the exact order the
    /// structure was declared by `jacobian_indices`.
    fn jacobian_values(&self, x: &[Number], vals: &mut [Number]) -> bool;
}

/// Type of option you can specify to SNOPT, used internally for conversion.
///
/// SNOPT option names are free-form phrases like `"Major print level"`;
/// string-valued options are forwarded as a single `"name value"`
/// specification line.
pub enum SnoptOption<'a> {
    /// Real-valued option.
    Num(f64),
    /// String-valued option.
    Str(&'a str),
    /// Integer-valued option.
    Int(i32),
}

impl<'a> From<f64> for SnoptOption<'a> {
    fn from(opt: f64) -> Self {
        SnoptOption::Num(opt)
    }
}

impl<'a> From<&'a str> for SnoptOption<'a> {
    fn from(opt: &'a str) -> Self {
        SnoptOption::Str(opt)
    }
}

impl<'a> From<i32> for SnoptOption<'a> {
    fn from(opt: i32) -> Self {
        SnoptOption::Int(opt)
    }
}

/// Errors produced while setting up the solver or forwarding options.
///
/// Solve outcomes are not errors; they are reported through [`SolveStatus`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The problem reported zero optimization variables.
    #[error("the problem has no optimization variables")]
    NoVariables,
    /// An unconstrained problem was created without an objective.
    #[error("an unconstrained problem must supply an objective")]
    MissingObjective,
    /// A metadata callback failed or produced out-of-range data.
    #[error("the problem reported invalid metadata: {0}")]
    InvalidMetadata(&'static str),
    /// An option name or value contained an interior NUL byte.
    #[error("option string contains an interior NUL byte")]
    InvalidOptionString(#[from] NulError),
    /// SNOPT did not recognize the option.
    #[error("option {0:?} was rejected by the solver")]
    OptionRejected(String),
}

/// How `solve` should initialize the active set.
///
/// `Basis` and `Warm` reuse the variable and row states left in the solver
/// by a previous solve on the same problem.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Start {
    Cold = 0,
    Basis = 1,
    Warm = 2,
}

/// Outcome of a solve, derived from SNOPT's `INFO` code.
///
/// Variants follow the manual's EXIT classes (`EXIT = INFO - INFO % 10`),
/// with the successful and limit-related codes kept distinct since callers
/// routinely branch on them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// Optimality conditions satisfied (INFO 1).
    Optimal,
    /// A feasible point was found but optimality was not requested (INFO 2).
    FeasiblePointFound,
    /// The requested accuracy could not be achieved (INFO 3).
    RequestedAccuracyNotAchieved,
    /// The problem appears infeasible (EXIT 10).
    Infeasible,
    /// The problem appears unbounded (EXIT 20).
    Unbounded,
    /// The (total) iteration limit was reached (INFO 31).
    IterationLimit,
    /// The major iteration limit was reached (INFO 32).
    MajorIterationLimit,
    /// The superbasics limit is too small (INFO 33).
    SuperbasicsLimit,
    /// The time limit was reached (INFO 34).
    TimeLimit,
    /// The solve was terminated after numerical difficulties (EXIT 40).
    NumericalDifficulties,
    /// The supplied derivatives appear to be incorrect (EXIT 50).
    IncorrectDerivatives,
    /// The problem functions were undefined where evaluated (EXIT 60).
    UndefinedFunction,
    /// The user callback requested termination (EXIT 70).
    UserRequestedStop,
    /// SNOPT ran out of workspace storage (EXIT 80).
    InsufficientStorage,
    /// An input argument was out of range (EXIT 90).
    InvalidInput,
    /// An internal solver error occurred (EXIT 140).
    SystemError,
    /// An `INFO` code not covered by the classes above.
    Unknown(i32),
}

impl SolveStatus {
    fn from_info(info: i32) -> Self {
        use SolveStatus::*;
        match info {
            1 => Optimal,
            2 => FeasiblePointFound,
            3 => RequestedAccuracyNotAchieved,
            11..=15 => Infeasible,
            21 | 22 => Unbounded,
            31 => IterationLimit,
            32 => MajorIterationLimit,
            33 => SuperbasicsLimit,
            34 => TimeLimit,
            41..=45 => NumericalDifficulties,
            51 | 52 => IncorrectDerivatives,
            61..=63 => UndefinedFunction,
            71..=74 => UserRequestedStop,
            81..=84 => InsufficientStorage,
            91 | 92 => InvalidInput,
            141 | 142 => SystemError,
            other => Unknown(other),
        }
    }

    /// Whether the solve finished successfully (EXIT 0: the point returned
    /// is optimal, feasible, or as accurate as the solver could make it).
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SolveStatus::Optimal
                | SolveStatus::FeasiblePointFound
                | SolveStatus::RequestedAccuracyNotAchieved
        )
    }
}

/// A view of the solved state stored in the solver's buffers.
#[derive(Debug)]
pub struct Solution<'a> {
    /// Values of the primal variables at the final point.
    pub primal_variables: &'a [Number],
    /// Values of the constraints at the final point.
    pub constraint_values: &'a [Number],
    /// Dual variables for the variable bounds.
    pub bound_multipliers: &'a [Number],
    /// Dual variables for the constraint rows.
    pub constraint_multipliers: &'a [Number],
}

/// Mutable access to the problem alongside the borrowed [`Solution`].
#[derive(Debug)]
pub struct SolverDataMut<'a, P> {
    /// The user problem, so warm-start data can be stashed on it.
    pub problem: &'a mut P,
    /// The solution buffers after the solve.
    pub solution: Solution<'a>,
}

/// Everything returned by [`SnoptSolver::solve`].
#[derive(Debug)]
pub struct SolveResult<'a, P> {
    /// Problem and solution views.
    pub solver_data: SolverDataMut<'a, P>,
    /// Final value of the objective (zero for feasibility problems).
    pub objective_value: Number,
    /// Number of superbasic variables at the final point.
    pub num_superbasics: usize,
    /// Number of infeasible constraint rows at the final point.
    pub num_infeasibilities: usize,
    /// Sum of the constraint infeasibilities at the final point.
    pub sum_infeasibilities: Number,
    /// Outcome reported by the solver.
    pub status: SolveStatus,
}

/// Flat buffers mirroring the snOptA argument layout.
///
/// Sized once from the problem's metadata when the solver is constructed and
/// never resized afterwards; a problem whose dimensions change needs a new
/// solver. Rows of `f` are the objective (when present) followed by every
/// constraint, and `igfun`/`jgvar` hold the 1-based nonlinear derivative
/// pattern in the same row convention.
struct Workspace {
    /// 1-based row of the objective within `f`; 0 for feasibility problems.
    obj_row: Index,
    /// Constant added to the objective row for reporting.
    obj_add: Number,
    x: Vec<Number>,
    xlow: Vec<Number>,
    xupp: Vec<Number>,
    xstate: Vec<Index>,
    xmul: Vec<Number>,
    f: Vec<Number>,
    flow: Vec<Number>,
    fupp: Vec<Number>,
    fstate: Vec<Index>,
    fmul: Vec<Number>,
    igfun: Vec<Index>,
    jgvar: Vec<Index>,
}

impl Workspace {
    fn for_unconstrained<P: BasicProblem>(problem: &P) -> Result<Self, Error> {
        let n = problem.num_variables();
        if n == 0 {
            return Err(Error::NoVariables);
        }

        let mut ws = Workspace::zeroed(n, 1);
        ws.obj_row = 1;
        ws.fill_variables(problem)?;
        ws.flow[0] = -SNOPT_INFINITY;
        ws.fupp[0] = SNOPT_INFINITY;
        ws.push_dense_objective_row(n);
        Ok(ws)
    }

    fn for_constrained<P: ConstrainedProblem>(problem: &P) -> Result<Self, Error> {
        let n = problem.num_variables();
        if n == 0 {
            return Err(Error::NoVariables);
        }
        let m = problem.num_constraints();
        let obj_count = problem.has_objective() as usize;
        if m + obj_count == 0 {
            return Err(Error::MissingObjective);
        }

        let mut ws = Workspace::zeroed(n, m + obj_count);
        ws.fill_variables(problem)?;

        // The objective row, when present, is the first row of F and is
        // unbounded; constraint rows follow with the problem's own bounds.
        if obj_count == 1 {
            ws.obj_row = 1;
            ws.flow[0] = -SNOPT_INFINITY;
            ws.fupp[0] = SNOPT_INFINITY;
            ws.push_dense_objective_row(n);
        }
        if !problem.constraint_bounds(&mut ws.flow[obj_count..], &mut ws.fupp[obj_count..]) {
            return Err(Error::InvalidMetadata("constraint bounds"));
        }

        // Every derivative is declared nonlinear; the Jacobian triplets are
        // shifted past the objective row and into SNOPT's 1-based indexing.
        let nnz = problem.num_jacobian_non_zeros();
        let mut rows = vec![0 as Index; nnz];
        let mut cols = vec![0 as Index; nnz];
        if !problem.jacobian_indices(&mut rows, &mut cols) {
            return Err(Error::InvalidMetadata("jacobian structure"));
        }
        for (&row, &col) in rows.iter().zip(cols.iter()) {
            if row < 0 || row as usize >= m || col < 0 || col as usize >= n {
                return Err(Error::InvalidMetadata("jacobian index out of range"));
            }
            ws.igfun.push(row + 1 + obj_count as Index);
            ws.jgvar.push(col + 1);
        }
        Ok(ws)
    }

    fn zeroed(n: usize, nf: usize) -> Self {
        Workspace {
            obj_row: 0,
            obj_add: 0.0,
            x: vec![0.0; n],
            xlow: vec![0.0; n],
            xupp: vec![0.0; n],
            xstate: vec![0; n],
            xmul: vec![0.0; n],
            f: vec![0.0; nf],
            flow: vec![0.0; nf],
            fupp: vec![0.0; nf],
            fstate: vec![0; nf],
            fmul: vec![0.0; nf],
            igfun: Vec::new(),
            jgvar: Vec::new(),
        }
    }

    fn fill_variables<P: BasicProblem>(&mut self, problem: &P) -> Result<(), Error> {
        if !problem.bounds(&mut self.xlow, &mut self.xupp) {
            return Err(Error::InvalidMetadata("variable bounds"));
        }
        if !problem.initial_point(&mut self.x) {
            return Err(Error::InvalidMetadata("initial point"));
        }
        Ok(())
    }

    /// The objective row is assumed dense: one derivative entry per
    /// variable, all in row 1.
    fn push_dense_objective_row(&mut self, n: usize) {
        for var in 0..n {
            self.igfun.push(1);
            self.jgvar.push(var as Index + 1);
        }
    }

    fn num_variables(&self) -> usize {
        self.x.len()
    }

    fn num_rows(&self) -> usize {
        self.f.len()
    }

    fn obj_count(&self) -> usize {
        (self.obj_row > 0) as usize
    }
}

/// Evaluate an unconstrained problem into the F/G buffers.
fn eval_unconstrained<P: BasicProblem>(
    problem: &P,
    x: &[Number],
    need_f: bool,
    f: &mut [Number],
    need_g: bool,
    g: &mut [Number],
) -> bool {
    if need_f && !problem.objective(x, &mut f[0]) {
        return false;
    }
    if need_g && !problem.objective_grad(x, g) {
        return false;
    }
    true
}

/// Evaluate a constrained problem into the F/G buffers.
///
/// F holds the objective value (when the problem has one) followed by the
/// constraint values; G holds the dense objective gradient followed by the
/// Jacobian non-zeros, in the order the structure was declared.
fn eval_constrained<P: ConstrainedProblem>(
    problem: &P,
    x: &[Number],
    need_f: bool,
    f: &mut [Number],
    need_g: bool,
    g: &mut [Number],
) -> bool {
    let obj_count = problem.has_objective() as usize;
    if need_f {
        let (obj, constraints) = f.split_at_mut(obj_count);
        if obj_count == 1 && !problem.objective(x, &mut obj[0]) {
            return false;
        }
        if !problem.constraints(x, constraints) {
            return false;
        }
    }
    if need_g {
        let (grad, jac) = g.split_at_mut(obj_count * x.len());
        if obj_count == 1 && !problem.objective_grad(x, grad) {
            return false;
        }
        if !problem.jacobian_values(x, jac) {
            return false;
        }
    }
    true
}

// snOptA's user function carries no user-data pointer, so the problem being
// solved is published thread-locally for the duration of the solveA call.
// The trampoline registered alongside it is monomorphized for the same P,
// which keeps the cast below consistent by construction.
thread_local! {
    static CURRENT_PROBLEM: Cell<*const c_void> = const { Cell::new(ptr::null()) };
}

/// Tells SNOPT that F could not be evaluated at the current point.
const UNDEFINED_AT_POINT: Index = -1;

/// Adapter owning the SNOPT workspace handle and the marshalling buffers for
/// one problem instance.
///
/// Dropping the solver releases the solver-side workspace.
pub struct SnoptSolver<P> {
    /// User specified interface defining the problem to be solved.
    problem: P,
    /// SNOPT's workspace handle.
    prob: ffi::snProblem,
    /// Flat buffers in snOptA layout.
    ws: Workspace,
    /// Monomorphized callback registered with the solver.
    usrfun: ffi::SnFunA,
    /// Problem name; SNOPT keeps a pointer to it for the handle's lifetime.
    name: CString,
}

impl<P: BasicProblem> SnoptSolver<P> {
    /// Wrap a problem without general constraints (variable bounds still
    /// apply).
    pub fn new_unconstrained(problem: P) -> Result<Self, Error> {
        if !problem.has_objective() {
            return Err(Error::MissingObjective);
        }
        let ws = Workspace::for_unconstrained(&problem)?;
        Self::with_workspace(problem, ws, Self::usrfun_unconstrained)
    }

    fn with_workspace(problem: P, ws: Workspace, usrfun: ffi::SnFunA) -> Result<Self, Error> {
        let name = CString::new("snopt").expect("static name");
        let print_file = CString::new("").expect("static name");
        let mut prob = ffi::snProblem::zeroed();
        unsafe {
            // Summary output stays off; callers opting into solver output do
            // so through the print level options or a print file.
            ffi::snInit(
                &mut prob,
                name.as_ptr() as *mut c_char,
                print_file.as_ptr() as *mut c_char,
                0,
            );
        }
        debug!(
            n = ws.num_variables(),
            nf = ws.num_rows(),
            neg = ws.igfun.len(),
            "initialized snopt workspace"
        );

        let mut solver = SnoptSolver {
            problem,
            prob,
            ws,
            usrfun,
            name,
        };
        // Every derivative entry is supplied through the pattern, so SNOPT
        // never needs to estimate missing ones.
        solver.set_option("Derivative option", 1)?;
        Ok(solver)
    }

    /// Get an immutable reference to the provided problem object.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Get a mutable reference to the provided problem object.
    pub fn problem_mut(&mut self) -> &mut P {
        &mut self.problem
    }

    /// Set a SNOPT option by name.
    ///
    /// Real and integer values map onto the corresponding typed setters;
    /// string values are forwarded as a `"name value"` specification line.
    pub fn set_option<'a, O>(&mut self, name: &str, option: O) -> Result<&mut Self, Error>
    where
        O: Into<SnoptOption<'a>>,
    {
        let accepted = unsafe {
            match option.into() {
                SnoptOption::Num(opt) => {
                    let name_c = CString::new(name)?;
                    ffi::setRealParameter(&mut self.prob, name_c.as_ptr() as *mut c_char, opt) == 0
                }
                SnoptOption::Int(opt) => {
                    let name_c = CString::new(name)?;
                    ffi::setIntParameter(&mut self.prob, name_c.as_ptr() as *mut c_char, opt) == 0
                }
                SnoptOption::Str(opt) => {
                    let spec = CString::new(format!("{} {}", name, opt))?;
                    ffi::setParameter(&mut self.prob, spec.as_ptr() as *mut c_char) == 0
                }
            }
        };
        if accepted {
            Ok(self)
        } else {
            Err(Error::OptionRejected(name.to_string()))
        }
    }

    /// Route SNOPT's print-level output to the named file.
    pub fn set_print_file(&mut self, path: &str) -> Result<&mut Self, Error> {
        let path_c = CString::new(path)?;
        let accepted =
            unsafe { ffi::setPrintfile(&mut self.prob, path_c.as_ptr() as *mut c_char) == 0 };
        if accepted {
            Ok(self)
        } else {
            Err(Error::OptionRejected(path.to_string()))
        }
    }

    /// Apply the conventional option set for gradient-based problems:
    /// moderate printing, a generous iteration limit, full derivative
    /// verification and loose-ish tolerances suitable for noisy problems.
    pub fn apply_default_options(&mut self) -> Result<&mut Self, Error> {
        self.set_option("Major print level", 1)?
            .set_option("Minor print level", 1)?
            .set_option("Verify level", 3)?
            .set_option("Iterations limit", 200000)?
            .set_option("Major feasibility tolerance", 1.0e-4)?
            .set_option("Minor feasibility tolerance", 1.0e-4)?
            .set_option("Major optimality tolerance", 1.0e-2)
    }

    /// Solve the problem from a cold start.
    pub fn solve(&mut self) -> SolveResult<P> {
        self.solve_with_start(Start::Cold)
    }

    /// Solve the problem with an explicit start mode. `Warm` and `Basis`
    /// reuse the states and multipliers left in the buffers by the previous
    /// solve.
    pub fn solve_with_start(&mut self, start: Start) -> SolveResult<P> {
        let mut num_superbasics: c_int = 0;
        let mut num_infeasibilities: c_int = 0;
        let mut sum_infeasibilities: Number = 0.0;

        CURRENT_PROBLEM.with(|cell| cell.set(&self.problem as *const P as *const c_void));
        let ws = &mut self.ws;
        let info = unsafe {
            ffi::solveA(
                &mut self.prob,
                start as c_int,
                ws.num_rows() as Index,
                ws.num_variables() as Index,
                ws.obj_add,
                ws.obj_row,
                self.usrfun,
                // No separate linear part: every derivative is nonlinear.
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ws.igfun.len() as c_int,
                ws.igfun.as_mut_ptr(),
                ws.jgvar.as_mut_ptr(),
                ws.xlow.as_mut_ptr(),
                ws.xupp.as_mut_ptr(),
                ws.flow.as_mut_ptr(),
                ws.fupp.as_mut_ptr(),
                ws.x.as_mut_ptr(),
                ws.xstate.as_mut_ptr(),
                ws.xmul.as_mut_ptr(),
                ws.f.as_mut_ptr(),
                ws.fstate.as_mut_ptr(),
                ws.fmul.as_mut_ptr(),
                &mut num_superbasics,
                &mut num_infeasibilities,
                &mut sum_infeasibilities,
            )
        };
        CURRENT_PROBLEM.with(|cell| cell.set(ptr::null()));

        let status = SolveStatus::from_info(info);
        let objective_value = if ws.obj_row > 0 {
            ws.f[ws.obj_row as usize - 1] + ws.obj_add
        } else {
            0.0
        };
        debug!(info, ?status, objective_value, "solveA returned");

        let obj_count = ws.obj_count();
        SolveResult {
            solver_data: SolverDataMut {
                problem: &mut self.problem,
                solution: Solution {
                    primal_variables: &ws.x,
                    constraint_values: &ws.f[obj_count..],
                    bound_multipliers: &ws.xmul,
                    constraint_multipliers: &ws.fmul[obj_count..],
                },
            },
            objective_value,
            num_superbasics: num_superbasics as usize,
            num_infeasibilities: num_infeasibilities as usize,
            sum_infeasibilities,
            status,
        }
    }

    unsafe extern "C" fn usrfun_unconstrained(
        status: *mut Index,
        n: *mut Index,
        x: *mut Number,
        need_f: *mut Index,
        nf: *mut Index,
        f: *mut Number,
        need_g: *mut Index,
        neg: *mut Index,
        g: *mut Number,
        _cu: *mut c_char,
        _lencu: *mut Index,
        _iu: *mut Index,
        _leniu: *mut Index,
        _ru: *mut Number,
        _lenru: *mut Index,
    ) {
        let problem = &*(CURRENT_PROBLEM.with(|cell| cell.get()) as *const P);
        let ok = eval_unconstrained(
            problem,
            slice::from_raw_parts(x, *n as usize),
            *need_f > 0,
            slice::from_raw_parts_mut(f, *nf as usize),
            *need_g > 0,
            slice::from_raw_parts_mut(g, *neg as usize),
        );
        if !ok {
            *status = UNDEFINED_AT_POINT;
        }
    }
}

impl<P: ConstrainedProblem> SnoptSolver<P> {
    /// Wrap a constrained problem. This is the target use case for SNOPT.
    pub fn new(problem: P) -> Result<Self, Error> {
        let ws = Workspace::for_constrained(&problem)?;
        Self::with_workspace(problem, ws, Self::usrfun_constrained)
    }

    unsafe extern "C" fn usrfun_constrained(
        status: *mut Index,
        n: *mut Index,
        x: *mut Number,
        need_f: *mut Index,
        nf: *mut Index,
        f: *mut Number,
        need_g: *mut Index,
        neg: *mut Index,
        g: *mut Number,
        _cu: *mut c_char,
        _lencu: *mut Index,
        _iu: *mut Index,
        _leniu: *mut Index,
        _ru: *mut Number,
        _lenru: *mut Index,
    ) {
        let problem = &*(CURRENT_PROBLEM.with(|cell| cell.get()) as *const P);
        let ok = eval_constrained(
            problem,
            slice::from_raw_parts(x, *n as usize),
            *need_f > 0,
            slice::from_raw_parts_mut(f, *nf as usize),
            *need_g > 0,
            slice::from_raw_parts_mut(g, *neg as usize),
        );
        if !ok {
            *status = UNDEFINED_AT_POINT;
        }
    }
}

impl<P> Drop for SnoptSolver<P> {
    fn drop(&mut self) {
        // Keep the name alive until the workspace handle is gone; SNOPT
        // stores the pointer rather than copying the string.
        let _ = &self.name;
        unsafe {
            ffi::deleteSNOPT(&mut self.prob);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The two-variable example problem used throughout: minimize
    /// `-(x1 - 2)^2` subject to `x0^2 + x1 = 1` with `x0` in `[-1, 1]`.
    struct Toy {
        feasibility_only: bool,
    }

    impl Toy {
        fn new() -> Self {
            Toy {
                feasibility_only: false,
            }
        }
    }

    impl BasicProblem for Toy {
        fn num_variables(&self) -> usize {
            2
        }
        fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool {
            x_l[0] = -1.0;
            x_u[0] = 1.0;
            x_l[1] = -SNOPT_INFINITY;
            x_u[1] = SNOPT_INFINITY;
            true
        }
        fn initial_point(&self, x: &mut [Number]) -> bool {
            x[0] = 3.5;
            x[1] = 1.5;
            true
        }
        fn has_objective(&self) -> bool {
            !self.feasibility_only
        }
        fn objective(&self, x: &[Number], obj: &mut Number) -> bool {
            *obj = -(x[1] - 2.0) * (x[1] - 2.0);
            true
        }
        fn objective_grad(&self, x: &[Number], grad_f: &mut [Number]) -> bool {
            grad_f[0] = 0.0;
            grad_f[1] = -2.0 * (x[1] - 2.0);
            true
        }
    }

    impl ConstrainedProblem for Toy {
        fn num_constraints(&self) -> usize {
            1
        }
        fn num_jacobian_non_zeros(&self) -> usize {
            2
        }
        fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool {
            g_l[0] = 1.0;
            g_u[0] = 1.0;
            true
        }
        fn constraints(&self, x: &[Number], g: &mut [Number]) -> bool {
            g[0] = x[0] * x[0] + x[1];
            true
        }
        fn jacobian_indices(&self, rows: &mut [Index], cols: &mut [Index]) -> bool {
            rows[0] = 0;
            cols[0] = 0;
            rows[1] = 0;
            cols[1] = 1;
            true
        }
        fn jacobian_values(&self, x: &[Number], vals: &mut [Number]) -> bool {
            vals[0] = 2.0 * x[0];
            vals[1] = 1.0;
            true
        }
    }

    #[test]
    fn constrained_workspace_layout() {
        let ws = Workspace::for_constrained(&Toy::new()).unwrap();

        assert_eq!(ws.num_variables(), 2);
        assert_eq!(ws.num_rows(), 2);
        assert_eq!(ws.obj_row, 1);
        assert_eq!(ws.obj_add, 0.0);

        assert_eq!(ws.x, vec![3.5, 1.5]);
        assert_eq!(ws.xlow, vec![-1.0, -SNOPT_INFINITY]);
        assert_eq!(ws.xupp, vec![1.0, SNOPT_INFINITY]);
        assert_eq!(ws.xstate, vec![0, 0]);
        assert_eq!(ws.xmul, vec![0.0, 0.0]);

        // Objective row first and unbounded, then the equality constraint.
        assert_eq!(ws.flow, vec![-SNOPT_INFINITY, 1.0]);
        assert_eq!(ws.fupp, vec![SNOPT_INFINITY, 1.0]);
        assert_eq!(ws.fmul, vec![0.0, 0.0]);

        // Dense objective row followed by the shifted Jacobian triplets,
        // all 1-based.
        assert_eq!(ws.igfun, vec![1, 1, 2, 2]);
        assert_eq!(ws.jgvar, vec![1, 2, 1, 2]);
    }

    #[test]
    fn feasibility_workspace_layout() {
        let ws = Workspace::for_constrained(&Toy {
            feasibility_only: true,
        })
        .unwrap();

        assert_eq!(ws.obj_row, 0);
        assert_eq!(ws.num_rows(), 1);
        assert_eq!(ws.flow, vec![1.0]);
        assert_eq!(ws.fupp, vec![1.0]);
        assert_eq!(ws.igfun, vec![1, 1]);
        assert_eq!(ws.jgvar, vec![1, 2]);
    }

    #[test]
    fn unconstrained_workspace_layout() {
        let ws = Workspace::for_unconstrained(&Toy::new()).unwrap();

        assert_eq!(ws.obj_row, 1);
        assert_eq!(ws.num_rows(), 1);
        assert_eq!(ws.flow, vec![-SNOPT_INFINITY]);
        assert_eq!(ws.fupp, vec![SNOPT_INFINITY]);
        assert_eq!(ws.igfun, vec![1, 1]);
        assert_eq!(ws.jgvar, vec![1, 2]);
    }

    #[test]
    fn constrained_evaluation_order() {
        let toy = Toy::new();
        let x = [0.5, 3.0];
        let mut f = [0.0; 2];
        let mut g = [0.0; 4];

        assert!(eval_constrained(&toy, &x, true, &mut f, true, &mut g));
        assert_eq!(f, [-1.0, 3.25]);
        assert_eq!(g, [0.0, -2.0, 1.0, 1.0]);

        // The two outputs are requested independently.
        let mut f = [0.0; 2];
        let mut g = [0.0; 4];
        assert!(eval_constrained(&toy, &x, true, &mut f, false, &mut g));
        assert_eq!(f, [-1.0, 3.25]);
        assert_eq!(g, [0.0; 4]);

        let mut f = [0.0; 2];
        assert!(eval_constrained(&toy, &x, false, &mut f, true, &mut g));
        assert_eq!(f, [0.0; 2]);
        assert_eq!(g, [0.0, -2.0, 1.0, 1.0]);
    }

    #[test]
    fn feasibility_evaluation_skips_objective() {
        let toy = Toy {
            feasibility_only: true,
        };
        let x = [0.5, 3.0];
        let mut f = [0.0; 1];
        let mut g = [0.0; 2];

        assert!(eval_constrained(&toy, &x, true, &mut f, true, &mut g));
        assert_eq!(f, [3.25]);
        assert_eq!(g, [1.0, 1.0]);
    }

    #[test]
    fn unconstrained_evaluation() {
        let toy = Toy::new();
        let x = [0.0, 0.0];
        let mut f = [0.0; 1];
        let mut g = [0.0; 2];

        assert!(eval_unconstrained(&toy, &x, true, &mut f, true, &mut g));
        assert_eq!(f, [-4.0]);
        assert_eq!(g, [0.0, 4.0]);
    }

    struct Failing;

    impl BasicProblem for Failing {
        fn num_variables(&self) -> usize {
            1
        }
        fn bounds(&self, _: &mut [Number], _: &mut [Number]) -> bool {
            true
        }
        fn initial_point(&self, _: &mut [Number]) -> bool {
            true
        }
        fn objective(&self, _: &[Number], _: &mut Number) -> bool {
            false
        }
        fn objective_grad(&self, _: &[Number], _: &mut [Number]) -> bool {
            true
        }
    }

    #[test]
    fn evaluation_failure_propagates() {
        let mut f = [0.0; 1];
        let mut g = [0.0; 1];
        assert!(!eval_unconstrained(
            &Failing,
            &[0.0],
            true,
            &mut f,
            true,
            &mut g
        ));
        // Gradient-only requests never touch the failing objective.
        assert!(eval_unconstrained(
            &Failing,
            &[0.0],
            false,
            &mut f,
            true,
            &mut g
        ));
    }

    struct BadJacobian;

    impl BasicProblem for BadJacobian {
        fn num_variables(&self) -> usize {
            1
        }
        fn bounds(&self, _: &mut [Number], _: &mut [Number]) -> bool {
            true
        }
        fn initial_point(&self, _: &mut [Number]) -> bool {
            true
        }
        fn objective(&self, _: &[Number], obj: &mut Number) -> bool {
            *obj = 0.0;
            true
        }
        fn objective_grad(&self, _: &[Number], _: &mut [Number]) -> bool {
            true
        }
    }

    impl ConstrainedProblem for BadJacobian {
        fn num_constraints(&self) -> usize {
            1
        }
        fn num_jacobian_non_zeros(&self) -> usize {
            1
        }
        fn constraint_bounds(&self, _: &mut [Number], _: &mut [Number]) -> bool {
            true
        }
        fn constraints(&self, _: &[Number], _: &mut [Number]) -> bool {
            true
        }
        fn jacobian_indices(&self, rows: &mut [Index], cols: &mut [Index]) -> bool {
            // Column index out of range for a one-variable problem.
            rows[0] = 0;
            cols[0] = 5;
            true
        }
        fn jacobian_values(&self, _: &[Number], _: &mut [Number]) -> bool {
            true
        }
    }

    #[test]
    fn out_of_range_jacobian_entry_is_rejected() {
        match Workspace::for_constrained(&BadJacobian) {
            Err(Error::InvalidMetadata(what)) => assert!(what.contains("jacobian")),
            other => panic!("expected metadata error, got {:?}", other.map(|_| ())),
        }
    }

    struct Empty;

    impl BasicProblem for Empty {
        fn num_variables(&self) -> usize {
            0
        }
        fn bounds(&self, _: &mut [Number], _: &mut [Number]) -> bool {
            true
        }
        fn initial_point(&self, _: &mut [Number]) -> bool {
            true
        }
        fn objective(&self, _: &[Number], _: &mut Number) -> bool {
            true
        }
        fn objective_grad(&self, _: &[Number], _: &mut [Number]) -> bool {
            true
        }
    }

    #[test]
    fn zero_variable_problem_is_rejected() {
        assert!(matches!(
            Workspace::for_unconstrained(&Empty),
            Err(Error::NoVariables)
        ));
    }

    #[test]
    fn status_codes_follow_exit_classes() {
        use SolveStatus::*;

        assert_eq!(SolveStatus::from_info(1), Optimal);
        assert_eq!(SolveStatus::from_info(2), FeasiblePointFound);
        assert_eq!(SolveStatus::from_info(3), RequestedAccuracyNotAchieved);
        assert_eq!(SolveStatus::from_info(13), Infeasible);
        assert_eq!(SolveStatus::from_info(21), Unbounded);
        assert_eq!(SolveStatus::from_info(32), MajorIterationLimit);
        assert_eq!(SolveStatus::from_info(43), NumericalDifficulties);
        assert_eq!(SolveStatus::from_info(52), IncorrectDerivatives);
        assert_eq!(SolveStatus::from_info(62), UndefinedFunction);
        assert_eq!(SolveStatus::from_info(74), UserRequestedStop);
        assert_eq!(SolveStatus::from_info(83), InsufficientStorage);
        assert_eq!(SolveStatus::from_info(91), InvalidInput);
        assert_eq!(SolveStatus::from_info(142), SystemError);
        assert_eq!(SolveStatus::from_info(999), Unknown(999));

        assert!(Optimal.is_success());
        assert!(FeasiblePointFound.is_success());
        assert!(RequestedAccuracyNotAchieved.is_success());
        assert!(!Infeasible.is_success());
        assert!(!MajorIterationLimit.is_success());
    }
}
