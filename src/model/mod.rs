//! Operation model consumed by the backend
//!
//! Interfaces, operations and parameters are produced once by the front-end
//! (here: [`description`]) and only read afterwards. Parameter order is
//! declaration order and is significant.

pub mod description;

use serde::{Deserialize, Serialize};

/// Parameter direction as declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    /// Does a parameter with this direction travel in `message`?
    pub fn travels_in(self, message: MessageDirection) -> bool {
        match message {
            MessageDirection::Request => matches!(self, Direction::In | Direction::InOut),
            MessageDirection::Reply => matches!(self, Direction::Out | Direction::InOut),
        }
    }
}

/// Which of an operation's two messages a layout describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    /// Client to server
    Request,
    /// Server to client
    Reply,
}

impl MessageDirection {
    pub fn opposite(self) -> Self {
        match self {
            MessageDirection::Request => MessageDirection::Reply,
            MessageDirection::Reply => MessageDirection::Request,
        }
    }
}

/// Number of elements in a variable-length sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceLength {
    /// Known when generating
    Constant(u32),
    /// Known only at runtime, optionally bounded
    Runtime { max: Option<u32> },
}

/// Element type of a variable-length sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementKind {
    pub size_bits: u32,
    pub length: SequenceLength,
}

impl ElementKind {
    /// Bytes per element
    pub fn element_bytes(&self) -> u32 {
        self.size_bits.div_ceil(8)
    }
}

/// Wire classification of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Fixed-size value
    Fixed { size_bits: u32 },
    /// Sequence placed in the variable tail
    VariableSequence(ElementKind),
    /// Kernel-managed resource page
    ResourcePage,
}

impl ParamKind {
    /// Does the size of this parameter depend on runtime data?
    pub fn is_runtime_sized(&self) -> bool {
        matches!(
            self,
            ParamKind::VariableSequence(ElementKind {
                length: SequenceLength::Runtime { .. },
                ..
            })
        )
    }
}

/// One operation parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub direction: Direction,
    pub kind: ParamKind,
}

impl Parameter {
    pub fn fixed(name: impl Into<String>, direction: Direction, size_bits: u32) -> Self {
        Self {
            name: name.into(),
            direction,
            kind: ParamKind::Fixed { size_bits },
        }
    }

    pub fn sequence(
        name: impl Into<String>,
        direction: Direction,
        element_bits: u32,
        length: SequenceLength,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            kind: ParamKind::VariableSequence(ElementKind {
                size_bits: element_bits,
                length,
            }),
        }
    }

    pub fn resource(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
            kind: ParamKind::ResourcePage,
        }
    }
}

/// One remotely invokable function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    /// Discriminator carried in the request header
    pub id: u32,
    /// No reply message exists
    pub oneway: bool,
    pub parameters: Vec<Parameter>,
}

impl Operation {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
            oneway: false,
            parameters: Vec::new(),
        }
    }

    /// Builder: append a parameter
    pub fn with_param(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Builder: mark as oneway
    pub fn oneway(mut self) -> Self {
        self.oneway = true;
        self
    }

    /// Parameters travelling in `message`, in declaration order
    pub fn parameters_for(&self, message: MessageDirection) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.direction.travels_in(message))
    }
}

/// A named set of operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    /// First discriminator handed out by declaration order
    pub base: u32,
    pub operations: Vec<Operation>,
}
