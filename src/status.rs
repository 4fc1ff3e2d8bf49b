use std::{borrow::Cow, fmt};

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Pass,
    Fail,
    /// A precondition is unmet. Not a defect.
    NotSupported,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::NotSupported => "NotSupported",
        }
    }
}

/// Final verdict of a single case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestStatus {
    code: StatusCode,
    description: String,
}

impl TestStatus {
    pub fn new(code: StatusCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn pass(description: impl Into<String>) -> Self {
        Self::new(StatusCode::Pass, description)
    }

    pub fn fail(description: impl Into<String>) -> Self {
        Self::new(StatusCode::Fail, description)
    }

    pub fn not_supported(description: impl Into<String>) -> Self {
        Self::new(StatusCode::NotSupported, description)
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_pass(&self) -> bool {
        self.code == StatusCode::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.code == StatusCode::Fail
    }

    pub fn is_not_supported(&self) -> bool {
        self.code == StatusCode::NotSupported
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code.as_str(), self.description)
    }
}

/// Raised by support checks at the first unmet precondition.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NotSupported(Cow<'static, str>);

impl NotSupported {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<NotSupported> for TestStatus {
    fn from(ns: NotSupported) -> Self {
        TestStatus::not_supported(ns.0)
    }
}

/// Accumulates non-fatal failures so that a case can report all of them at once.
#[derive(Debug)]
pub struct ResultCollector {
    code: StatusCode,
    messages: Vec<String>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self {
            code: StatusCode::Pass,
            messages: Vec::new(),
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.code = StatusCode::Fail;
        self.messages.push(message);
    }

    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> bool {
        if !condition {
            self.fail(message);
        }
        condition
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_status(self) -> TestStatus {
        if self.messages.is_empty() {
            TestStatus::new(self.code, self.code.as_str())
        } else {
            TestStatus::new(self.code, self.messages.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_passes() {
        let status = ResultCollector::new().into_status();
        assert!(status.is_pass());
        assert_eq!(status.description(), "Pass");
    }

    #[test]
    fn collector_keeps_every_message() {
        let mut results = ResultCollector::new();
        assert!(results.check(true, "never recorded"));
        assert!(!results.check(false, "first"));
        results.fail("second");

        assert_eq!(results.code(), StatusCode::Fail);
        assert_eq!(results.messages(), ["first", "second"]);
        assert_eq!(results.into_status(), TestStatus::fail("first; second"));
    }

    #[test]
    fn not_supported_converts_to_status() {
        let status = TestStatus::from(NotSupported::new("Extension is not supported"));
        assert!(status.is_not_supported());
        assert!(!status.is_fail());
        assert_eq!(status.description(), "Extension is not supported");
    }
}
