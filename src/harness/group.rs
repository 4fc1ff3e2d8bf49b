use super::TestCase;

pub enum TestNode<C> {
    Group(TestCaseGroup<C>),
    Case {
        name: String,
        case: Box<dyn TestCase<C>>,
    },
}

impl<C> TestNode<C> {
    pub fn name(&self) -> &str {
        match *self {
            Self::Group(ref group) => group.name(),
            Self::Case { ref name, .. } => name,
        }
    }
}

/// A named node of the case tree.
pub struct TestCaseGroup<C> {
    name: String,
    description: String,
    children: Vec<TestNode<C>>,
}

impl<C> TestCaseGroup<C> {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn children(&self) -> &[TestNode<C>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&TestNode<C>> {
        self.children.iter().find(|node| node.name() == name)
    }

    /// # Panics
    ///
    /// If a sibling of the same name exists. Names must resolve to one node.
    pub fn add_child(&mut self, group: TestCaseGroup<C>) {
        self.assert_unique(group.name());
        self.children.push(TestNode::Group(group));
    }

    /// # Panics
    ///
    /// If a sibling of the same name exists.
    pub fn add_case(&mut self, name: impl Into<String>, case: impl TestCase<C> + 'static) {
        let name = name.into();
        self.assert_unique(&name);
        self.children.push(TestNode::Case {
            name,
            case: Box::new(case),
        });
    }

    fn assert_unique(&self, name: &str) {
        assert!(
            self.child(name).is_none(),
            "duplicate node `{}` in group `{}`",
            name,
            self.name
        );
    }

    /// Resolves a dot-separated path relative to this group.
    pub fn find(&self, path: &str) -> Option<&dyn TestCase<C>> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        match (self.child(head)?, rest) {
            (&TestNode::Group(ref group), Some(rest)) => group.find(rest),
            (&TestNode::Case { ref case, .. }, None) => Some(case.as_ref()),
            _ => None,
        }
    }

    /// Every case below this group with its dot-separated path, depth first in
    /// registration order. The path does not include this group's name.
    pub fn cases(&self) -> Vec<(String, &dyn TestCase<C>)> {
        let mut out = Vec::new();
        self.collect_cases("", &mut out);
        out
    }

    fn collect_cases<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a dyn TestCase<C>)>) {
        for node in self.children.iter() {
            let path = if prefix.is_empty() {
                node.name().to_string()
            } else {
                format!("{}.{}", prefix, node.name())
            };
            match *node {
                TestNode::Group(ref group) => group.collect_cases(&path, out),
                TestNode::Case { ref case, .. } => out.push((path, case.as_ref())),
            }
        }
    }
}
