use confpp_expr::ExprError;
use confpp_xml::{NodeKind, XmlError};
use thiserror::Error;

use crate::loader::LoadError;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("<{element}> is missing required attribute(s): {}", attributes.join(", "))]
    MissingAttribute { element: String, attributes: Vec<String> },
    #[error("symbol '{0}' is not defined")]
    UndefinedSymbol(String),
    #[error("invalid expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },
    #[error("cannot include '{href}'")]
    IncludeNotFound {
        href: String,
        #[source]
        source: LoadError,
    },
    #[error("include cycle: '{0}' is already being expanded")]
    IncludeCycle(String),
    #[error("XML parse error")]
    Parse(#[from] XmlError),
    #[error("expression '{expr}' failed")]
    Expression {
        expr: String,
        #[source]
        source: ExprError,
    },
    #[error("unhandled node kind: {0}")]
    UnhandledNodeKind(NodeKind),
    #[error("<{0}> is only allowed as a child of <element>")]
    MisplacedDirective(String),
    #[error("expansion nested deeper than {0} levels")]
    RecursionLimit(usize),
    #[error("loop exceeded {0} iterations")]
    IterationLimit(usize),
    #[error("in <{element}> at {location}")]
    At {
        element: String,
        location: String,
        #[source]
        source: Box<PreprocessError>,
    },
}

impl PreprocessError {
    /// The violated contract, with any location context stripped.
    pub fn root_cause(&self) -> &PreprocessError {
        match self {
            PreprocessError::At { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn expression(expr: &str, source: ExprError) -> Self {
        match source {
            ExprError::UndefinedVariable(name) => PreprocessError::UndefinedSymbol(name),
            source => PreprocessError::Expression { expr: expr.to_string(), source },
        }
    }
}
