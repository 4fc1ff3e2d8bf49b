/*! Case registration and execution.
 *
 *  A case goes through three steps: support check, program build and
 *  instance iteration. An unmet precondition ends the case with
 *  `NotSupported`. Errors from the driver or the shader compiler end the run.
 */

mod case;
mod group;

use std::fmt;

pub use case::{BodyFn, FunctionCase, SupportFn, TestCase, TestInstance};
pub use group::{TestCaseGroup, TestNode};

use crate::{
    shader::{build_programs, ShaderCompiler, SourceCollection},
    Error, StatusCode, TestStatus,
};

/// Runs one case to a verdict.
pub fn execute_case<C>(
    case: &dyn TestCase<C>,
    context: &C,
    compiler: &dyn ShaderCompiler,
) -> Result<TestStatus, Error> {
    if let Err(reason) = case.check_support(context) {
        log::info!("Not supported: {}", reason);
        return Ok(reason.into());
    }

    let mut programs = SourceCollection::new();
    case.init_programs(&mut programs);
    let binaries = {
        profiling::scope!("build programs");
        build_programs(compiler, &programs)?
    };

    let mut instance = case.create_instance(context, &binaries)?;
    instance.iterate()
}

/// Totals of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub not_supported: usize,
}

impl Summary {
    pub fn record(&mut self, status: &TestStatus) {
        match status.code() {
            StatusCode::Pass => self.passed += 1,
            StatusCode::Fail => self.failed += 1,
            StatusCode::NotSupported => self.not_supported += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.not_supported
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cases: {} passed, {} failed, {} not supported",
            self.total(),
            self.passed,
            self.failed,
            self.not_supported
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        shader::{GlslSource, ProgramBinary, ShaderStage},
        NotSupported, ShaderError,
    };

    struct Flag(bool);

    struct NoCompiler;

    impl ShaderCompiler for NoCompiler {
        fn compile(&self, name: &str, _: &GlslSource) -> Result<ProgramBinary, ShaderError> {
            Err(ShaderError::Compilation {
                name: name.to_string(),
                message: "no compiler".to_string(),
            })
        }
    }

    fn needs_flag(context: &Flag, _: &()) -> Result<(), NotSupported> {
        if context.0 {
            Ok(())
        } else {
            Err(NotSupported::new("flag is off"))
        }
    }

    fn passes(_: &Flag, _: &()) -> Result<TestStatus, Error> {
        Ok(TestStatus::pass("Pass"))
    }

    fn tree() -> TestCaseGroup<Flag> {
        let mut root = TestCaseGroup::new("root", "");
        let mut inner = TestCaseGroup::new("inner", "Inner cases");
        inner.add_case("a", FunctionCase::new("a", passes, ()));
        inner.add_case(
            "b",
            FunctionCase::new("b", passes, ()).with_support(needs_flag),
        );
        root.add_child(inner);
        root.add_case("c", FunctionCase::new("c", passes, ()));
        root
    }

    #[test]
    fn paths_are_relative_to_the_root() {
        let root = tree();
        let paths: Vec<_> = root.cases().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, ["inner.a", "inner.b", "c"]);
        assert!(root.find("inner.b").is_some());
        assert!(root.find("inner").is_none());
        assert!(root.find("c.d").is_none());
        assert!(root.find("root.c").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate node")]
    fn duplicate_names_are_rejected() {
        let mut root = tree();
        root.add_case("c", FunctionCase::new("again", passes, ()));
    }

    #[test]
    fn support_check_short_circuits() {
        let root = tree();
        let case = root.find("inner.b").unwrap();

        let status = execute_case(case, &Flag(false), &NoCompiler).unwrap();
        assert!(status.is_not_supported());
        assert_eq!(status.description(), "flag is off");

        let status = execute_case(case, &Flag(true), &NoCompiler).unwrap();
        assert!(status.is_pass());
    }

    struct NeedsProgram;

    impl TestCase<Flag> for NeedsProgram {
        fn description(&self) -> &str {
            "needs a program"
        }

        fn init_programs(&self, programs: &mut SourceCollection) {
            programs.add("miss", GlslSource::new(ShaderStage::Miss, "void main() {}"));
        }

        fn create_instance<'a>(
            &'a self,
            _: &'a Flag,
            _: &'a crate::shader::BinaryCollection,
        ) -> Result<Box<dyn TestInstance + 'a>, Error> {
            unreachable!("program build fails first")
        }
    }

    #[test]
    fn compiler_errors_abort() {
        let result = execute_case(&NeedsProgram, &Flag(true), &NoCompiler);
        assert!(matches!(result, Err(Error::Shader(ShaderError::Compilation { .. }))));
    }

    #[test]
    fn summary_counts() {
        let mut summary = Summary::default();
        summary.record(&TestStatus::pass("Pass"));
        summary.record(&TestStatus::not_supported("no"));
        assert!(summary.is_success());
        summary.record(&TestStatus::fail("failures=3"));
        assert!(!summary.is_success());
        assert_eq!(summary.total(), 3);
        assert_eq!(
            summary.to_string(),
            "3 cases: 1 passed, 1 failed, 1 not supported"
        );
    }
}
