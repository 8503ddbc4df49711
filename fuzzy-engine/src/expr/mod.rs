//! Generator expression language
//!
//! Each `$...$` spec is a small expression evaluated in a closed namespace:
//! integers, quoted strings, list literals, `+ - *`, indexing and slicing,
//! the `string` constants module and a fixed set of helper functions
//! (`range`, `len`, `str`, `upper`, `lower`, `reversed`, `chars`, `split`,
//! `lines`, `read`). There is no access to anything else.

pub mod ast;
pub mod builtins;
pub mod grammar;
pub mod interpreter;
pub mod value;

pub use ast::{BinOp, Expr};
pub use grammar::{parse_expression, SyntaxError};
pub use interpreter::Interpreter;
pub use value::Value;
