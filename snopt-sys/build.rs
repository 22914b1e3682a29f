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

/*!
 * SNOPT is licensed software, so unlike open source solvers it can neither
 * be built from source nor downloaded here. This build script only locates
 * an installation the user already has:
 *
 * 1. `SNOPT_LIB_DIR` (or the `lib/` subdirectory of `SNOPT_DIR`) names the
 *    directory holding the solver libraries. The libraries linked default
 *    to `snopt7` (the combined library shipped with the C interface) and
 *    can be overridden with a comma-separated `SNOPT_LIBS`.
 * 2. Failing that, pkg-config is probed for a `snopt7` package.
 *
 * If neither strategy succeeds no link directives are emitted: the crate
 * still compiles (the declarations are lazily resolved), and only final
 * artifacts that actually call into SNOPT will fail to link. This keeps
 * downstream marshalling tests usable on machines without a license.
 */

use std::env;
use std::path::PathBuf;

const DEFAULT_LIBS: &str = "snopt7";

fn main() {
    println!("cargo:rerun-if-env-changed=SNOPT_DIR");
    println!("cargo:rerun-if-env-changed=SNOPT_LIB_DIR");
    println!("cargo:rerun-if-env-changed=SNOPT_LIBS");

    if let Some(lib_dir) = find_lib_dir() {
        println!("cargo:rustc-link-search=native={}", lib_dir.display());
        let libs = env::var("SNOPT_LIBS").unwrap_or_else(|_| DEFAULT_LIBS.to_string());
        for lib in libs.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            println!("cargo:rustc-link-lib=dylib={}", lib);
        }
        return;
    }

    if pkg_config::Config::new().probe("snopt7").is_ok() {
        return;
    }

    println!(
        "cargo:warning=no SNOPT installation found; set SNOPT_DIR or \
         SNOPT_LIB_DIR to link against the native solver"
    );
}

fn find_lib_dir() -> Option<PathBuf> {
    if let Ok(dir) = env::var("SNOPT_LIB_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(dir) = env::var("SNOPT_DIR") {
        let lib = PathBuf::from(&dir).join("lib");
        return Some(if lib.is_dir() { lib } else { PathBuf::from(dir) });
    }
    None
}
