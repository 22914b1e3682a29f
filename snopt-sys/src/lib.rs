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

//! Raw FFI bindings to the SNOPT C interface.
//!
//! These declarations are written by hand against `snopt_cwrap.h` as shipped
//! with the SNOPT 7.7 C interface. Only the snOptA portion of the interface
//! is bound: the A form of the solver takes the whole problem as one
//! vector-valued function `F(x)` with a sparse derivative pattern, which is
//! the calling convention the `snopt` crate adapts problems to.
//!
//! SNOPT itself is proprietary and is never built or downloaded by this
//! crate; see `build.rs` for how an existing installation is located.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]

use libc::{c_char, c_int};

/// Row/column index and dimension type used throughout the SNOPT C interface.
pub type Index = c_int;
/// Floating point type used by SNOPT.
pub type Number = f64;

/// SNOPT's default "Infinite bound size". Bounds at or beyond this magnitude
/// are treated by the solver as absent.
pub const SNOPT_INFINITY: Number = 1.0e20;

/// User function evaluating the problem vector `F` and/or the nonlinear
/// derivative entries `G` at `x`.
///
/// `needF`/`needG` select which outputs the solver wants on this call.
/// `Status` is `1` on the first call and `>= 2` on the final call; the
/// callback may set it to `-1` to report that `F` is undefined at `x`, or to
/// any value `<= -2` to abort the solve. `cu`/`iu`/`ru` are the user
/// workspaces registered on the [`snProblem`]; the solver threads them
/// through untouched.
pub type SnFunA = unsafe extern "C" fn(
    Status: *mut Index,
    n: *mut Index,
    x: *mut Number,
    needF: *mut Index,
    nF: *mut Index,
    F: *mut Number,
    needG: *mut Index,
    neG: *mut Index,
    G: *mut Number,
    cu: *mut c_char,
    lencu: *mut Index,
    iu: *mut Index,
    leniu: *mut Index,
    ru: *mut Number,
    lenru: *mut Index,
);

/// The SNOPT workspace handle, mirroring the `snProblem` struct from
/// `snopt_cwrap.h`.
///
/// The struct is initialized by [`snInit`], which allocates the solver
/// workspaces `iw`/`rw`; [`deleteSNOPT`] releases them. Fields are laid out
/// exactly as in the C header and must not be reordered. Treat every field
/// as owned by the C side between `snInit` and `deleteSNOPT`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct snProblem {
    pub name: *mut c_char,

    pub memCalled: c_int,
    pub initCalled: c_int,

    pub lenrw: c_int,
    pub leniw: c_int,
    pub iw: *mut c_int,
    pub rw: *mut Number,

    pub lenru: c_int,
    pub leniu: c_int,
    pub iu: *mut c_int,
    pub ru: *mut Number,
}

impl snProblem {
    /// An all-zero struct suitable for passing to [`snInit`].
    pub fn zeroed() -> Self {
        snProblem {
            name: std::ptr::null_mut(),
            memCalled: 0,
            initCalled: 0,
            lenrw: 0,
            leniw: 0,
            iw: std::ptr::null_mut(),
            rw: std::ptr::null_mut(),
            lenru: 0,
            leniu: 0,
            iu: std::ptr::null_mut(),
            ru: std::ptr::null_mut(),
        }
    }
}

extern "C" {
    /// Initialize `prob`, allocating the default solver workspace. `name` is
    /// the problem name reported in SNOPT's output, `prtfile` the print file
    /// path (empty string for none) and `summOn` nonzero to enable the
    /// summary listing on standard output.
    pub fn snInit(prob: *mut snProblem, name: *mut c_char, prtfile: *mut c_char, summOn: c_int);

    /// Redirect SNOPT's print file output. Returns zero on success.
    pub fn setPrintfile(prob: *mut snProblem, prtname: *mut c_char) -> c_int;

    /// Set an option from a full specification string, e.g.
    /// `"Major print level 1"`. Returns zero on success.
    pub fn setParameter(prob: *mut snProblem, stropt: *mut c_char) -> c_int;

    /// Set an integer-valued option. Returns zero on success.
    pub fn setIntParameter(prob: *mut snProblem, stropt: *mut c_char, opt: c_int) -> c_int;

    /// Set a real-valued option. Returns zero on success.
    pub fn setRealParameter(prob: *mut snProblem, stropt: *mut c_char, opt: Number) -> c_int;

    /// Register user workspaces passed through to the user function.
    pub fn setUserI(prob: *mut snProblem, iu: *mut c_int, leniu: c_int);
    pub fn setUserR(prob: *mut snProblem, ru: *mut Number, lenru: c_int);

    /// Solve a problem in snOptA form.
    ///
    /// `start` is 0 for a cold start, 1 to start from an existing basis and
    /// 2 for a warm start from the incoming `xstate`/`Fstate`. `ObjRow` is
    /// the 1-based row of `F` holding the objective, or 0 for a feasibility
    /// problem; `ObjAdd` a constant added to it for reporting. The linear
    /// part of `F` is `A` in coordinate form (`iAfun`/`jAvar`, `neA`
    /// entries) and the nonlinear derivative pattern is `iGfun`/`jGvar`
    /// (`neG` entries), both 1-based. All of `x`, `xstate`, `xmul`, `F`,
    /// `Fstate`, `Fmul` are in/out. Returns the SNOPT `INFO` code.
    pub fn solveA(
        prob: *mut snProblem,
        start: c_int,
        nF: Index,
        n: Index,
        ObjAdd: Number,
        ObjRow: Index,
        usrfun: SnFunA,
        neA: c_int,
        iAfun: *mut Index,
        jAvar: *mut Index,
        A: *mut Number,
        neG: c_int,
        iGfun: *mut Index,
        jGvar: *mut Index,
        xlow: *mut Number,
        xupp: *mut Number,
        Flow: *mut Number,
        Fupp: *mut Number,
        x: *mut Number,
        xstate: *mut Index,
        xmul: *mut Number,
        F: *mut Number,
        Fstate: *mut Index,
        Fmul: *mut Number,
        nS: *mut c_int,
        nInf: *mut c_int,
        sInf: *mut Number,
    ) -> c_int;

    /// Release the workspaces allocated by [`snInit`].
    pub fn deleteSNOPT(prob: *mut snProblem);
}
