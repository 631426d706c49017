use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::Iri;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outgoing edge: the focus node is the subject.
    Forward,
    /// Incoming edge: the focus node is the object.
    Inverse,
}

/// An edge label together with the direction it is followed in.
///
/// `ex:p` and `^ex:p` are distinct properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Property {
    pub iri: Iri,
    pub direction: Direction,
}

impl Property {
    pub fn forward(iri: impl Into<Iri>) -> Self {
        Self {
            iri: iri.into(),
            direction: Direction::Forward,
        }
    }

    pub fn inverse(iri: impl Into<Iri>) -> Self {
        Self {
            iri: iri.into(),
            direction: Direction::Inverse,
        }
    }

    pub fn is_inverse(&self) -> bool {
        self.direction == Direction::Inverse
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Forward => write!(f, "{}", self.iri),
            Direction::Inverse => write!(f, "^{}", self.iri),
        }
    }
}
