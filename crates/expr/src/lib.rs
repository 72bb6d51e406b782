//! Small XPath-flavoured expression language evaluated by the confpp directives.
//!
//! Bare identifiers are variables, except `true` and `false`, which are the
//! boolean literals (`true()` and `false()` work as well). Write `$true` to
//! reach a variable of that name.
//!
//! ```
//! use confpp_expr::{Expression, Sequence, Variables};
//!
//! let expr = Expression::parse("$i * 2 + 1").unwrap();
//! let vars = Variables::new().with("i", Sequence::one(20i64));
//! assert_eq!(expr.evaluate_string(&vars).unwrap(), "41");
//! ```
pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod value;

pub use error::ExprError;
pub use evaluator::{Expression, Variables};
pub use value::{Sequence, Value, format_double, parse_number};
