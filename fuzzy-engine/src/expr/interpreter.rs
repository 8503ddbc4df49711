use super::ast::{BinOp, Expr};
use super::builtins::{self, check_len, EvalResult};
use super::grammar::parse_expression;
use super::value::Value;
use crate::config::FuzzerConfig;
use crate::error::{FuzzyError, FuzzyResult};
use std::cell::Cell;

/// Work allowed for one expression, in multiples of the sequence limit
const BUDGET_FACTOR: usize = 16;

/// Evaluates generator expressions against the helper namespace
pub struct Interpreter<'c> {
    config: &'c FuzzerConfig,
    /// Values and string bytes built so far by the current expression
    spent: Cell<usize>,
}

impl<'c> Interpreter<'c> {
    pub fn new(config: &'c FuzzerConfig) -> Self {
        Self {
            config,
            spent: Cell::new(0),
        }
    }

    /// Parse and evaluate one generator spec into its substitution values
    pub fn evaluate(&self, source: &str) -> FuzzyResult<Vec<String>> {
        self.spent.set(0);
        let expr = parse_expression(source).map_err(|e| FuzzyError::eval(source, e.to_string()))?;
        let value = self
            .eval(&expr)
            .map_err(|reason| FuzzyError::eval(source, reason))?;

        let found = value.type_name();
        value
            .into_sequence()
            .ok_or_else(|| FuzzyError::type_error(source, found))
    }

    pub fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Str(text) => Ok(Value::Str(text.clone())),
            Expr::List(items) => {
                check_len(items.len(), self.config)?;
                let mut total = 0usize;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval(item)?;
                    total = total.saturating_add(value.item_count());
                    check_len(total, self.config)?;
                    values.push(value);
                }
                Ok(Value::List(values))
            }
            Expr::Name(name) => lookup(name),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
                other => Err(format!("bad operand for unary -: {}", other.type_name())),
            },
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary(*op, left, right)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.int_operand(index, "index")?;
                index_into(target, index)
            }
            Expr::Slice {
                target,
                start,
                stop,
                step,
            } => {
                let target = self.eval(target)?;
                let start = self.optional_int(start.as_deref())?;
                let stop = self.optional_int(stop.as_deref())?;
                let step = self.optional_int(step.as_deref())?;
                let value = slice(target, start, stop, step)?;
                self.charge(value.size())?;
                Ok(value)
            }
            Expr::Attr { target, name } => match self.eval(target)? {
                Value::StringModule => builtins::string_constant(name)
                    .map(|text| Value::Str(text.to_string()))
                    .ok_or_else(|| format!("module 'string' has no attribute '{}'", name)),
                other => Err(format!("{} has no attribute '{}'", other.type_name(), name)),
            },
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Name(name) if builtins::is_function(name) => {
                    let args = args
                        .iter()
                        .map(|arg| self.eval(arg))
                        .collect::<EvalResult<Vec<_>>>()?;
                    let value = builtins::call(name, args, self.config)?;
                    self.charge(value.size())?;
                    Ok(value)
                }
                other => {
                    let value = self.eval(other)?;
                    Err(format!("{} is not callable", value.type_name()))
                }
            },
        }
    }

    /// Account for newly built values, failing once the budget is spent
    fn charge(&self, size: usize) -> EvalResult<()> {
        let budget = self.config.max_sequence_len.saturating_mul(BUDGET_FACTOR);
        let spent = self.spent.get().saturating_add(size);
        if spent > budget {
            return Err(format!("expression builds more than {} values", budget));
        }
        self.spent.set(spent);
        Ok(())
    }

    fn int_operand(&self, expr: &Expr, what: &str) -> EvalResult<i64> {
        match self.eval(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(format!("{} must be an integer, not {}", what, other.type_name())),
        }
    }

    fn optional_int(&self, expr: Option<&Expr>) -> EvalResult<Option<i64>> {
        expr.map(|e| self.int_operand(e, "slice bound")).transpose()
    }

    fn binary(&self, op: BinOp, left: Value, right: Value) -> EvalResult<Value> {
        match (op, left, right) {
            (BinOp::Add, Value::Int(a), Value::Int(b)) => {
                a.checked_add(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Sub, Value::Int(a), Value::Int(b)) => {
                a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Mul, Value::Int(a), Value::Int(b)) => {
                a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Add, Value::Str(a), Value::Str(b)) => {
                check_len(a.chars().count() + b.chars().count(), self.config)?;
                self.charge(a.len() + b.len())?;
                Ok(Value::Str(a + &b))
            }
            (BinOp::Add, Value::List(mut a), Value::List(b)) => {
                let count = nested_count(&a).saturating_add(nested_count(&b));
                check_len(count, self.config)?;
                self.charge(a.len() + b.len())?;
                a.extend(b);
                Ok(Value::List(a))
            }
            (BinOp::Mul, Value::Str(text), Value::Int(n))
            | (BinOp::Mul, Value::Int(n), Value::Str(text)) => {
                let times = repeat_count(text.chars().count(), n, self.config)?;
                self.charge(text.len().saturating_mul(times))?;
                Ok(Value::Str(text.repeat(times)))
            }
            (BinOp::Mul, Value::List(items), Value::Int(n))
            | (BinOp::Mul, Value::Int(n), Value::List(items)) => {
                let times = repeat_count(nested_count(&items), n, self.config)?;
                let size: usize = items.iter().map(Value::size).sum();
                self.charge(size.saturating_mul(times))?;
                let total = items.len() * times;
                Ok(Value::List(items.into_iter().cycle().take(total).collect()))
            }
            (op, left, right) => Err(format!(
                "unsupported operand types for {}: {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            )),
        }
    }
}

fn lookup(name: &str) -> EvalResult<Value> {
    if name == "string" {
        Ok(Value::StringModule)
    } else if builtins::is_function(name) {
        Err(format!("{}() must be called", name))
    } else {
        Err(format!("name '{}' is not defined", name))
    }
}

fn overflow() -> String {
    "integer overflow".to_string()
}

/// Scalar values in a list's items, nested lists included
fn nested_count(items: &[Value]) -> usize {
    items.iter().map(Value::item_count).sum()
}

/// Number of repetitions for `seq * n`, zero when the result would be empty
fn repeat_count(len: usize, n: i64, config: &FuzzerConfig) -> EvalResult<usize> {
    if n <= 0 || len == 0 {
        return Ok(0);
    }
    let times = usize::try_from(n).map_err(|_| overflow())?;
    let total = len.checked_mul(times).ok_or_else(overflow)?;
    check_len(total, config)?;
    Ok(times)
}

fn normalize_index(index: i64, len: usize) -> EvalResult<usize> {
    let signed_len = len as i64;
    let position = if index < 0 { index + signed_len } else { index };
    if position < 0 || position >= signed_len {
        return Err(format!("index {} out of range for length {}", index, len));
    }
    Ok(position as usize)
}

fn index_into(target: Value, index: i64) -> EvalResult<Value> {
    match target {
        Value::List(mut items) => {
            let position = normalize_index(index, items.len())?;
            Ok(items.swap_remove(position))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let position = normalize_index(index, chars.len())?;
            Ok(Value::Str(chars[position].to_string()))
        }
        other => Err(format!("{} is not subscriptable", other.type_name())),
    }
}

/// Positions selected by `[start:stop:step]` over a sequence of `len` items
fn slice_positions(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err("slice step cannot be zero".to_string());
    }

    let len = len as i64;
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
    let clamp = |bound: i64| {
        if bound < 0 {
            (bound + len).max(lower)
        } else {
            bound.min(upper)
        }
    };
    let start = start
        .map(clamp)
        .unwrap_or(if step < 0 { upper } else { lower });
    let stop = stop
        .map(clamp)
        .unwrap_or(if step < 0 { lower } else { upper });

    let mut positions = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        positions.push(current as usize);
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(positions)
}

fn slice(
    target: Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> EvalResult<Value> {
    match target {
        Value::List(items) => {
            let positions = slice_positions(items.len(), start, stop, step)?;
            Ok(Value::List(
                positions.into_iter().map(|i| items[i].clone()).collect(),
            ))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let positions = slice_positions(chars.len(), start, stop, step)?;
            Ok(Value::Str(positions.into_iter().map(|i| chars[i]).collect()))
        }
        other => Err(format!("{} is not subscriptable", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FuzzyErrorKind;

    fn evaluate(source: &str) -> FuzzyResult<Vec<String>> {
        let config = FuzzerConfig::default();
        Interpreter::new(&config).evaluate(source)
    }

    #[test]
    fn test_help_examples() {
        assert_eq!(evaluate("range(5)").unwrap(), vec!["0", "1", "2", "3", "4"]);
        assert_eq!(
            evaluate("string.lowercase[:10]").unwrap(),
            vec!["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]
        );
        assert_eq!(evaluate("['spam', 'eggs']").unwrap(), vec!["spam", "eggs"]);
    }

    #[test]
    fn test_string_is_sequence_of_chars() {
        assert_eq!(evaluate("'abc'").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(evaluate("string.digits[::-3]").unwrap(), vec!["9", "6", "3", "0"]);
    }

    #[test]
    fn test_integer_is_type_error() {
        let err = evaluate("5").unwrap_err();
        assert_eq!(err.kind(), FuzzyErrorKind::Type);
        assert_eq!(err, FuzzyError::type_error("5", "an integer"));

        let err = evaluate("len('abc')").unwrap_err();
        assert_eq!(err.kind(), FuzzyErrorKind::Type);

        let err = evaluate("string").unwrap_err();
        assert_eq!(err.kind(), FuzzyErrorKind::Type);
    }

    #[test]
    fn test_list_operations() {
        assert_eq!(evaluate("[1, 2] + ['x']").unwrap(), vec!["1", "2", "x"]);
        assert_eq!(evaluate("['a'] * 3").unwrap(), vec!["a", "a", "a"]);
        assert_eq!(evaluate("2 * [0, 1]").unwrap(), vec!["0", "1", "0", "1"]);
        assert!(evaluate("[1] * -2").unwrap().is_empty());
        assert_eq!(evaluate("[range(2)]").unwrap(), vec!["[0, 1]"]);
        assert_eq!(evaluate("range(3)[-1:]").unwrap(), vec!["2"]);
        assert_eq!(evaluate("[range(3)[1]]").unwrap(), vec!["1"]);
    }

    #[test]
    fn test_string_operations() {
        assert_eq!(evaluate("['a' * 3]").unwrap(), vec!["aaa"]);
        assert_eq!(evaluate("['id=' + str(7)]").unwrap(), vec!["id=7"]);
        assert_eq!(evaluate("[upper('abc')[1]]").unwrap(), vec!["B"]);
        assert_eq!(evaluate("split('a b c')[::2]").unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate("range(2 * 3 - 4)").unwrap(), vec!["0", "1"]);
        assert_eq!(evaluate("range(-(-2))").unwrap(), vec!["0", "1"]);
        assert_eq!(evaluate("[(1 + 2) * 3]").unwrap(), vec!["9"]);
        assert_eq!(
            evaluate("[9223372036854775807 + 1]").unwrap_err(),
            FuzzyError::eval("[9223372036854775807 + 1]", "integer overflow")
        );
    }

    #[test]
    fn test_eval_errors() {
        let cases = [
            ("foo", "name 'foo' is not defined"),
            ("range", "range() must be called"),
            ("string.nothing", "module 'string' has no attribute 'nothing'"),
            ("'a' + 1", "unsupported operand types for +: a string and an integer"),
            ("[1][3]", "index 3 out of range for length 1"),
            ("[1][::0]", "slice step cannot be zero"),
            ("string()", "a module is not callable"),
            ("5[0]", "an integer is not subscriptable"),
            ("[1]['a']", "index must be an integer, not a string"),
        ];

        for (source, reason) in cases {
            let err = evaluate(source).unwrap_err();
            assert_eq!(err, FuzzyError::eval(source, reason), "source: {}", source);
        }
    }

    #[test]
    fn test_syntax_error_is_eval_error() {
        let err = evaluate("range(").unwrap_err();
        assert_eq!(err.kind(), FuzzyErrorKind::Eval);
        assert!(err.to_string().contains("range("));
    }

    #[test]
    fn test_repetition_respects_limit() {
        let config = FuzzerConfig {
            max_sequence_len: 5,
            ..Default::default()
        };
        let interpreter = Interpreter::new(&config);
        assert!(interpreter.evaluate("['a'] * 5").is_ok());
        assert!(interpreter
            .evaluate("['a'] * 6")
            .unwrap_err()
            .to_string()
            .contains("exceeds the limit"));
        assert!(interpreter.evaluate("'ab' * 3").is_err());
    }

    #[test]
    fn test_helper_output_respects_limit() {
        let config = FuzzerConfig {
            max_sequence_len: 10,
            ..Default::default()
        };
        let interpreter = Interpreter::new(&config);

        for source in ["str(range(10))", "chars(str(range(10)))", "[range(6), range(5)]"] {
            let err = interpreter.evaluate(source).unwrap_err();
            assert!(err.to_string().contains("exceeds the limit"), "{}", source);
        }
        assert!(interpreter.evaluate("[range(5), range(5)]").is_ok());
    }

    #[test]
    fn test_nested_repetition_respects_limit() {
        let err = evaluate("[range(1000000)] * 1000000").unwrap_err();
        assert_eq!(err.kind(), FuzzyErrorKind::Eval);
        assert!(err.to_string().contains("exceeds the limit"));

        let err = evaluate("[[[]]] * 1000000000000").unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"));

        let err = evaluate("[range(600000)] + [range(600000)]").unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"));
    }

    #[test]
    fn test_work_budget() {
        let config = FuzzerConfig {
            max_sequence_len: 10,
            ..Default::default()
        };
        let interpreter = Interpreter::new(&config);

        let heavy = format!("range({})", vec!["len(range(10))"; 17].join(" - "));
        let err = interpreter.evaluate(&heavy).unwrap_err();
        assert!(err.to_string().contains("builds more than 160 values"));

        // The budget starts over for every expression
        let light = format!("range({})", vec!["len(range(10))"; 3].join(" - "));
        assert!(interpreter.evaluate(&light).is_ok());
        assert!(interpreter.evaluate(&light).is_ok());
    }

    #[test]
    fn test_deep_nesting_is_an_eval_error() {
        let source = format!("{}[1]{}", "(".repeat(5000), ")".repeat(5000));
        let err = evaluate(&source).unwrap_err();
        assert_eq!(err.kind(), FuzzyErrorKind::Eval);
        assert!(err.to_string().contains("nested too deeply"));

        let source = format!("[{}1]", "-".repeat(200_000));
        assert_eq!(evaluate(&source).unwrap_err().kind(), FuzzyErrorKind::Eval);
    }

    #[test]
    fn test_slice_positions() {
        assert_eq!(slice_positions(5, None, None, None).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(slice_positions(5, Some(1), Some(-1), None).unwrap(), vec![1, 2, 3]);
        assert_eq!(slice_positions(5, None, None, Some(-2)).unwrap(), vec![4, 2, 0]);
        assert_eq!(slice_positions(5, Some(10), None, None).unwrap(), Vec::<usize>::new());
        assert_eq!(slice_positions(5, Some(-10), Some(2), None).unwrap(), vec![0, 1]);
        assert_eq!(slice_positions(0, None, None, Some(-1)).unwrap(), Vec::<usize>::new());
    }
}
