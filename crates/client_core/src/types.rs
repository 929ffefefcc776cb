use std::fmt;

use shared::domain::{Record, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Create,
    Update,
    Remove,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Load,
        Operation::Create,
        Operation::Update,
        Operation::Remove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Remove => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    Success,
    Error(String),
}

impl RequestState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestState::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Idle => f.write_str("idle"),
            RequestState::Loading => f.write_str("loading"),
            RequestState::Success => f.write_str("success"),
            RequestState::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// Latest [`RequestState`] for each operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestStates {
    pub load: RequestState,
    pub create: RequestState,
    pub update: RequestState,
    pub remove: RequestState,
}

impl RequestStates {
    pub fn get(&self, operation: Operation) -> &RequestState {
        match operation {
            Operation::Load => &self.load,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Remove => &self.remove,
        }
    }

    pub(crate) fn set(&mut self, operation: Operation, state: RequestState) {
        let slot = match operation {
            Operation::Load => &mut self.load,
            Operation::Create => &mut self.create,
            Operation::Update => &mut self.update,
            Operation::Remove => &mut self.remove,
        };
        *slot = state;
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSnapshot {
    pub mounted: bool,
    pub records: Vec<Record>,
    pub states: RequestStates,
    /// Ids with an update or removal still in flight, sorted.
    pub pending: Vec<RecordId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    CollectionChanged {
        len: usize,
    },
    RequestStateChanged {
        operation: Operation,
        state: RequestState,
    },
    Error {
        operation: Operation,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    /// Another load was already outstanding; no request was issued.
    AlreadyInFlight,
}
