//! Registered test and benchmark units.
//!
//! Units are declared explicitly through the [`test_unit!`] and
//! [`bench_unit!`] macros rather than discovered by introspection; the
//! macros capture the declaring module path and source file, from which
//! the module and suite names are resolved.
//!
//! [`test_unit!`]: crate::test_unit
//! [`bench_unit!`]: crate::bench_unit

use crate::context::{Bencher, TestContext};

/// A test body.
pub type TestFn = fn(&mut TestContext);

/// A benchmark body.
pub type BenchFn = fn(&mut Bencher);

/// What kind of unit this is, with its entry point.
#[derive(Clone, Copy)]
pub enum UnitKind {
    Test(TestFn),
    Bench(BenchFn),
}

/// One declared unit: a top-level test or benchmark function.
#[derive(Clone, Copy)]
pub struct UnitSpec {
    /// Unit name, usually the function name.
    pub name: &'static str,
    /// Module path of the declaring module (`module_path!`).
    pub module: &'static str,
    /// Source file of the declaration (`file!`).
    pub file: &'static str,
    /// Line of the declaration.
    pub line: u32,
    pub kind: UnitKind,
}

impl UnitSpec {
    /// The module name the unit resolves to: the declaring module path.
    pub fn module_name(&self) -> &'static str {
        self.module
    }

    /// The suite name the unit resolves to: the source file basename.
    pub fn suite_name(&self) -> &'static str {
        self.file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.file)
    }
}

/// Declare a test unit from a `fn(&mut TestContext)`.
#[macro_export]
macro_rules! test_unit {
    ($f:path) => {
        $crate::UnitSpec {
            name: stringify!($f),
            module: module_path!(),
            file: file!(),
            line: line!(),
            kind: $crate::UnitKind::Test($f),
        }
    };
}

/// Declare a benchmark unit from a `fn(&mut Bencher)`.
#[macro_export]
macro_rules! bench_unit {
    ($f:path) => {
        $crate::UnitSpec {
            name: stringify!($f),
            module: module_path!(),
            file: file!(),
            line: line!(),
            kind: $crate::UnitKind::Bench($f),
        }
    };
}
