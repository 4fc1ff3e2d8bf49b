use crate::{
    shader::{BinaryCollection, SourceCollection},
    Error, NotSupported, TestStatus,
};

/// Per-run state of a case.
pub trait TestInstance {
    fn iterate(&mut self) -> Result<TestStatus, Error>;
}

/// A registered case. `C` is the context the case runs against.
///
/// Support is checked first and programs are built before the instance is
/// created, so an instance never sees a context it cannot run on.
pub trait TestCase<C>: Send + Sync {
    fn description(&self) -> &str;

    fn check_support(&self, _context: &C) -> Result<(), NotSupported> {
        Ok(())
    }

    fn init_programs(&self, _programs: &mut SourceCollection) {}

    fn create_instance<'a>(
        &'a self,
        context: &'a C,
        binaries: &'a BinaryCollection,
    ) -> Result<Box<dyn TestInstance + 'a>, Error>;
}

pub type SupportFn<C, P> = fn(&C, &P) -> Result<(), NotSupported>;
pub type BodyFn<C, P> = fn(&C, &P) -> Result<TestStatus, Error>;

/// A case made of a plain function and its parameters.
pub struct FunctionCase<C, P> {
    description: String,
    support: Option<SupportFn<C, P>>,
    body: BodyFn<C, P>,
    params: P,
}

impl<C, P> FunctionCase<C, P> {
    pub fn new(description: impl Into<String>, body: BodyFn<C, P>, params: P) -> Self {
        Self {
            description: description.into(),
            support: None,
            body,
            params,
        }
    }

    #[must_use]
    pub fn with_support(mut self, support: SupportFn<C, P>) -> Self {
        self.support = Some(support);
        self
    }
}

struct FunctionInstance<'a, C, P> {
    context: &'a C,
    body: BodyFn<C, P>,
    params: &'a P,
}

impl<C, P> TestInstance for FunctionInstance<'_, C, P> {
    fn iterate(&mut self) -> Result<TestStatus, Error> {
        (self.body)(self.context, self.params)
    }
}

impl<C, P> TestCase<C> for FunctionCase<C, P>
where
    P: Send + Sync,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn check_support(&self, context: &C) -> Result<(), NotSupported> {
        match self.support {
            Some(support) => support(context, &self.params),
            None => Ok(()),
        }
    }

    fn create_instance<'a>(
        &'a self,
        context: &'a C,
        _binaries: &'a BinaryCollection,
    ) -> Result<Box<dyn TestInstance + 'a>, Error> {
        Ok(Box::new(FunctionInstance {
            context,
            body: self.body,
            params: &self.params,
        }))
    }
}
