use std::fmt;

/// Runtime value of a generator expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    List(Vec<Value>),
    /// The `string` helper module
    StringModule,
}

impl Value {
    /// Article-prefixed kind name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "an integer",
            Value::Str(_) => "a string",
            Value::List(_) => "a list",
            Value::StringModule => "a module",
        }
    }

    /// Expand into the substitution values a generator produces.
    ///
    /// Lists yield their items and strings yield their characters; anything
    /// else is not a sequence.
    pub fn into_sequence(self) -> Option<Vec<String>> {
        match self {
            Value::List(items) => Some(items.iter().map(Value::to_string).collect()),
            Value::Str(text) => Some(text.chars().map(String::from).collect()),
            Value::Int(_) | Value::StringModule => None,
        }
    }

    /// Scalar values held, counting the items of nested lists
    pub fn item_count(&self) -> usize {
        match self {
            Value::List(items) => items.iter().map(Value::item_count).sum::<usize>().max(1),
            _ => 1,
        }
    }

    /// Footprint in values plus string bytes
    pub fn size(&self) -> usize {
        match self {
            Value::Str(text) => text.len().max(1),
            Value::List(items) => items.iter().map(Value::size).sum::<usize>().max(1),
            Value::Int(_) | Value::StringModule => 1,
        }
    }

    /// Quoted form used when a value is nested inside a list
    fn repr(&self) -> String {
        match self {
            Value::Str(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(text) => f.write_str(text),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Value::StringModule => f.write_str("<module 'string'>"),
        }
    }
}
