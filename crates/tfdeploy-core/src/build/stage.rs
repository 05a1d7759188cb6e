//! Build steps run for every Lambda.

/// The two steps each Lambda goes through, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStep {
    /// `make test`
    Test,

    /// `make target`
    Target,
}

impl BuildStep {
    /// Steps in execution order, as run by `build_one`.
    pub const SEQUENCE: [BuildStep; 2] = [BuildStep::Test, BuildStep::Target];

    /// Get the step name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuildStep::Test => "test",
            BuildStep::Target => "target",
        }
    }

    /// Full command line for `program`, e.g. `["make", "test"]`.
    pub fn command(&self, program: &str) -> Vec<String> {
        vec![program.to_string(), self.name().to_string()]
    }
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names() {
        assert_eq!(BuildStep::Test.name(), "test");
        assert_eq!(BuildStep::Target.name(), "target");
    }

    #[test]
    fn test_tests_run_before_target() {
        assert_eq!(BuildStep::SEQUENCE, [BuildStep::Test, BuildStep::Target]);
    }

    #[test]
    fn test_step_command() {
        assert_eq!(BuildStep::Test.command("make"), vec!["make", "test"]);
        assert_eq!(BuildStep::Target.command("gmake"), vec!["gmake", "target"]);
    }
}
