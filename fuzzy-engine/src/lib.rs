//! Fuzzy Engine - Template expansion for fuzzy requests
//!
//! A request head and body may contain `$expression$` generators. Each
//! expression is evaluated once into a list of strings, and the engine
//! yields one concrete request per element of the Cartesian product of all
//! lists, in odometer order, without materialising the product.

pub mod config;
pub mod error;
pub mod expr;
pub mod generator;
pub mod parser;
pub mod replay;

#[cfg(test)]
mod tests;

pub use config::FuzzerConfig;

pub use error::{FuzzyError, FuzzyErrorKind, FuzzyResult, TemplatePart};

pub use parser::{GeneratorSpec, ParsedTemplate, ParsedText, Segment, TemplateParser};

pub use generator::{evaluate, Combinations, ConcreteRequest, EvaluatedTemplate, FuzzyGenerator};

pub use replay::{
    replay, Exchange, RawResponse, ReplayOutcome, RequestSender, StopReason, TransportError,
};
