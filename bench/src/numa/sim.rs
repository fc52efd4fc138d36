//! Simulated NUMA controller

use std::cell::RefCell;
use std::collections::BTreeSet;

use numacopy_shared::NumaNodeId;

use super::{BindError, NumaControl};

/// Logged controller call
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NumaCall {
    Bind(NumaNodeId),
    Unbind,
}

#[derive(Debug, Default)]
struct State {
    bound: Option<NumaNodeId>,
    calls: Vec<NumaCall>,
}

/// In-memory NUMA controller tracking the current binding
#[derive(Debug)]
pub struct SimulatedNuma {
    nodes: Vec<NumaNodeId>,
    available: bool,
    failing: BTreeSet<NumaNodeId>,
    state: RefCell<State>,
}

impl SimulatedNuma {
    /// A host with the given online nodes
    pub fn new(nodes: Vec<NumaNodeId>) -> Self {
        Self {
            nodes,
            available: true,
            failing: BTreeSet::new(),
            state: RefCell::new(State::default()),
        }
    }

    /// A host whose kernel rejects NUMA policy calls
    pub fn unavailable(nodes: Vec<NumaNodeId>) -> Self {
        Self {
            available: false,
            ..Self::new(nodes)
        }
    }

    /// Make binding to `node` fail with an OS error
    pub fn with_failing_node(mut self, node: NumaNodeId) -> Self {
        self.failing.insert(node);
        self
    }

    /// Node the caller is currently bound to
    pub fn bound_node(&self) -> Option<NumaNodeId> {
        self.state.borrow().bound
    }

    pub fn calls(&self) -> Vec<NumaCall> {
        self.state.borrow().calls.clone()
    }

    pub fn bind_count(&self) -> usize {
        self.count(|c| matches!(c, NumaCall::Bind(_)))
    }

    pub fn unbind_count(&self) -> usize {
        self.count(|c| matches!(c, NumaCall::Unbind))
    }

    fn count(&self, pred: impl Fn(&NumaCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }
}

impl NumaControl for SimulatedNuma {
    fn is_available(&self) -> bool {
        self.available
    }

    fn nodes(&self) -> Result<Vec<NumaNodeId>, BindError> {
        Ok(self.nodes.clone())
    }

    fn bind(&self, node: NumaNodeId) -> Result<(), BindError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(NumaCall::Bind(node));

        if !self.available {
            return Err(BindError::Unsupported);
        }
        if !self.nodes.contains(&node) {
            return Err(BindError::UnknownNode(node));
        }
        if self.failing.contains(&node) {
            return Err(BindError::Os {
                api: "set_mempolicy",
                source: std::io::Error::from_raw_os_error(libc::EINVAL),
            });
        }
        state.bound = Some(node);
        Ok(())
    }

    fn unbind(&self) -> Result<(), BindError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(NumaCall::Unbind);
        state.bound = None;
        Ok(())
    }
}
