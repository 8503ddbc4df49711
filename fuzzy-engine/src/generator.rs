//! Combination of evaluated generators into concrete requests
//!
//! Every generator is evaluated exactly once; the resulting value tables are
//! then walked with a mixed-radix counter, the last generator changing
//! fastest. Iteration is lazy and can be restarted any number of times.

use crate::config::FuzzerConfig;
use crate::error::FuzzyResult;
use crate::expr::Interpreter;
use crate::parser::{GeneratorSpec, ParsedTemplate, TemplateParser};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One generated request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcreteRequest {
    pub head: String,
    pub body: String,
}

/// A parsed template together with the cached values of every generator
#[derive(Debug, Clone)]
pub struct EvaluatedTemplate {
    template: ParsedTemplate,
    /// Values per generator, indexed by spec occurrence
    values: Vec<Vec<String>>,
    lengths: Vec<usize>,
}

/// Evaluate every generator of a parsed template once.
///
/// Any failure aborts the whole template; nothing is partially evaluated.
pub fn evaluate(template: ParsedTemplate, config: &FuzzerConfig) -> FuzzyResult<EvaluatedTemplate> {
    let interpreter = Interpreter::new(config);
    let mut values = Vec::with_capacity(template.specs.len());

    for spec in &template.specs {
        let produced = interpreter.evaluate(&spec.source)?;
        debug!(
            index = spec.index,
            part = %spec.part,
            values = produced.len(),
            "Evaluated generator"
        );
        values.push(produced);
    }

    let lengths = values.iter().map(Vec::len).collect();
    let evaluated = EvaluatedTemplate {
        template,
        values,
        lengths,
    };

    info!(
        generators = evaluated.values.len(),
        requests = evaluated.count(),
        "Template evaluated"
    );

    Ok(evaluated)
}

impl EvaluatedTemplate {
    /// Total number of requests: the product of all generator lengths,
    /// 1 without generators. Saturates at `usize::MAX`.
    pub fn count(&self) -> usize {
        self.lengths
            .iter()
            .fold(1usize, |total, len| total.saturating_mul(*len))
    }

    /// Lazily produce every request, starting from the first combination
    pub fn generate(&self) -> Combinations<'_> {
        Combinations::new(self, None)
    }

    /// Like [`generate`](Self::generate), stopping early once `cancel` fires.
    /// The token is checked before each request is produced.
    pub fn generate_with_cancel(&self, cancel: CancellationToken) -> Combinations<'_> {
        Combinations::new(self, Some(cancel))
    }

    /// The request at `ordinal` in generation order, without enumerating
    pub fn request_at(&self, ordinal: usize) -> Option<ConcreteRequest> {
        decode(ordinal, &self.lengths).map(|vector| self.render(&vector))
    }

    /// The first `limit` requests
    pub fn preview(&self, limit: usize) -> Vec<ConcreteRequest> {
        self.generate().take(limit).collect()
    }

    pub fn template(&self) -> &ParsedTemplate {
        &self.template
    }

    /// Cached values of one generator
    pub fn values(&self, index: usize) -> Option<&[String]> {
        self.values.get(index).map(Vec::as_slice)
    }

    fn render(&self, vector: &[usize]) -> ConcreteRequest {
        let value_of = |index: usize| self.values[index][vector[index]].as_str();
        ConcreteRequest {
            head: self.template.head.render(value_of),
            body: self.template.body.render(value_of),
        }
    }
}

impl<'t> IntoIterator for &'t EvaluatedTemplate {
    type Item = ConcreteRequest;
    type IntoIter = Combinations<'t>;

    fn into_iter(self) -> Self::IntoIter {
        self.generate()
    }
}

/// Lazy iterator over all generator combinations
#[derive(Debug, Clone)]
pub struct Combinations<'t> {
    template: &'t EvaluatedTemplate,
    /// Next combination to render; `None` once exhausted
    cursor: Option<Vec<usize>>,
    cancel: Option<CancellationToken>,
}

impl<'t> Combinations<'t> {
    fn new(template: &'t EvaluatedTemplate, cancel: Option<CancellationToken>) -> Self {
        let cursor = if template.lengths.contains(&0) {
            None
        } else {
            Some(vec![0; template.lengths.len()])
        };

        Self {
            template,
            cursor,
            cancel,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    fn remaining(&self) -> Option<usize> {
        match &self.cursor {
            None => Some(0),
            Some(vector) => {
                let position = encode(vector, &self.template.lengths)?;
                let total = self
                    .template
                    .lengths
                    .iter()
                    .try_fold(1usize, |total, len| total.checked_mul(*len))?;
                Some(total - position)
            }
        }
    }
}

impl Iterator for Combinations<'_> {
    type Item = ConcreteRequest;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_some() && self.cancelled() {
            debug!("Request generation cancelled");
            self.cursor = None;
        }

        let vector = self.cursor.as_mut()?;
        let request = self.template.render(vector);
        if !advance(vector, &self.template.lengths) {
            self.cursor = None;
        }

        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cancel.is_some() {
            return (0, self.remaining());
        }
        match self.remaining() {
            Some(remaining) => (remaining, Some(remaining)),
            None => (usize::MAX, None),
        }
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        let template = self.template;
        let lengths = &template.lengths;
        let vector = self.cursor.as_mut()?;

        match encode(vector, lengths) {
            Some(position) => {
                match position.checked_add(n).and_then(|target| decode(target, lengths)) {
                    Some(target) => *vector = target,
                    None => {
                        self.cursor = None;
                        return None;
                    }
                }
            }
            // Ordinal does not fit in a usize, step the counter instead
            None => {
                for _ in 0..n {
                    if !advance(vector, lengths) {
                        self.cursor = None;
                        return None;
                    }
                }
            }
        }

        self.next()
    }
}

impl FusedIterator for Combinations<'_> {}

/// Step the counter once; false when it wraps around past the last combination
fn advance(vector: &mut [usize], lengths: &[usize]) -> bool {
    for i in (0..vector.len()).rev() {
        vector[i] += 1;
        if vector[i] < lengths[i] {
            return true;
        }
        vector[i] = 0;
    }
    false
}

/// Ordinal of a combination vector, `None` on overflow
fn encode(vector: &[usize], lengths: &[usize]) -> Option<usize> {
    vector
        .iter()
        .zip(lengths)
        .try_fold(0usize, |acc, (digit, len)| acc.checked_mul(*len)?.checked_add(*digit))
}

/// Combination vector of an ordinal, `None` past the last combination
fn decode(mut ordinal: usize, lengths: &[usize]) -> Option<Vec<usize>> {
    if lengths.contains(&0) {
        return None;
    }

    let mut vector = vec![0; lengths.len()];
    for i in (0..lengths.len()).rev() {
        vector[i] = ordinal % lengths[i];
        ordinal /= lengths[i];
    }

    if ordinal == 0 {
        Some(vector)
    } else {
        None
    }
}

/// Parses and evaluates a request template, then hands out its requests
#[derive(Debug, Clone)]
pub struct FuzzyGenerator {
    evaluated: EvaluatedTemplate,
    confirm_threshold: usize,
}

impl FuzzyGenerator {
    pub fn new(head: &str, body: &str, config: &FuzzerConfig) -> FuzzyResult<Self> {
        config.validate()?;
        let parsed = TemplateParser::parse(head, body)?;
        let evaluated = evaluate(parsed, config)?;

        Ok(Self {
            evaluated,
            confirm_threshold: config.confirm_threshold,
        })
    }

    pub fn count(&self) -> usize {
        self.evaluated.count()
    }

    pub fn generate(&self) -> Combinations<'_> {
        self.evaluated.generate()
    }

    pub fn generate_with_cancel(&self, cancel: CancellationToken) -> Combinations<'_> {
        self.evaluated.generate_with_cancel(cancel)
    }

    pub fn request_at(&self, ordinal: usize) -> Option<ConcreteRequest> {
        self.evaluated.request_at(ordinal)
    }

    pub fn preview(&self, limit: usize) -> Vec<ConcreteRequest> {
        self.evaluated.preview(limit)
    }

    pub fn specs(&self) -> &[GeneratorSpec] {
        &self.evaluated.template().specs
    }

    /// Whether the total is large enough that sending should be confirmed
    pub fn needs_confirmation(&self) -> bool {
        self.count() > self.confirm_threshold
    }

    pub fn evaluated(&self) -> &EvaluatedTemplate {
        &self.evaluated
    }
}
