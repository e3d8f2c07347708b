// ── Query documents ──
//
// GraphQL-shaped documents addressing one Api. Every top-level field of
// every operation is one method invocation; the (aliased) field name keys
// its result. Selection sets below a field are accepted and ignored since
// the Api returns whole values.

mod parser;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::CoreError;
use crate::uri::Uri;

// ── Document model ──────────────────────────────────────────────────

/// A parsed query document, reusable across calls with different variables.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Operation {
    pub(crate) kind: OperationKind,
    pub(crate) name: Option<String>,
    pub(crate) variables: Vec<VariableDefinition>,
    pub(crate) fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct VariableDefinition {
    pub(crate) name: String,
    pub(crate) default: Option<InputValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Field {
    pub(crate) alias: Option<String>,
    pub(crate) method: String,
    pub(crate) args: Vec<(String, InputValue)>,
}

impl Field {
    fn result_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.method)
    }
}

/// Argument value as written in the document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InputValue {
    Variable(String),
    Literal(Value),
    List(Vec<InputValue>),
    Object(Vec<(String, InputValue)>),
}

impl QueryDocument {
    pub fn parse(source: &str) -> Result<Self, CoreError> {
        let operations = parser::parse_document(source)?;
        Ok(Self { operations })
    }

    /// Number of top-level invocations across all operations.
    pub fn invocation_count(&self) -> usize {
        self.operations.iter().map(|op| op.fields.len()).sum()
    }

    /// Operation names, in document order. Anonymous operations are skipped.
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations
            .iter()
            .filter_map(|op| op.name.as_deref())
            .collect()
    }
}

impl FromStr for QueryDocument {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── Invocations ─────────────────────────────────────────────────────

/// One method call extracted from a query document.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryInvocation {
    pub uri: Uri,
    pub method: String,
    pub args: Map<String, Value>,
}

/// Turn a document into named invocations against `uri`, keyed by result
/// name in document order.
///
/// Variables come from `variables`, falling back to the operation's
/// declared default.
pub fn parse_query(
    uri: &Uri,
    document: &QueryDocument,
    variables: &Map<String, Value>,
) -> Result<IndexMap<String, QueryInvocation>, CoreError> {
    let mut invocations = IndexMap::new();

    for operation in &document.operations {
        trace!(kind = %operation.kind, name = ?operation.name, "expanding operation");
        let scope = VariableScope {
            supplied: variables,
            declared: &operation.variables,
        };

        for field in &operation.fields {
            let key = field.result_key();
            if invocations.contains_key(key) {
                return Err(CoreError::DuplicateInvocation {
                    name: key.to_owned(),
                });
            }

            let mut args = Map::new();
            for (name, value) in &field.args {
                args.insert(name.clone(), scope.evaluate(value)?);
            }

            invocations.insert(
                key.to_owned(),
                QueryInvocation {
                    uri: uri.clone(),
                    method: field.method.clone(),
                    args,
                },
            );
        }
    }

    Ok(invocations)
}

struct VariableScope<'a> {
    supplied: &'a Map<String, Value>,
    declared: &'a [VariableDefinition],
}

impl VariableScope<'_> {
    fn evaluate(&self, value: &InputValue) -> Result<Value, CoreError> {
        match value {
            InputValue::Literal(v) => Ok(v.clone()),
            InputValue::Variable(name) => self.lookup(name),
            InputValue::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            InputValue::Object(fields) => {
                let mut object = Map::new();
                for (key, item) in fields {
                    object.insert(key.clone(), self.evaluate(item)?);
                }
                Ok(Value::Object(object))
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, CoreError> {
        if let Some(value) = self.supplied.get(name) {
            return Ok(value.clone());
        }
        // Defaults are constants, so they never recurse into `lookup`.
        match self
            .declared
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.default.as_ref())
        {
            Some(default) => self.evaluate(default),
            None => Err(CoreError::MissingVariable {
                name: name.to_owned(),
            }),
        }
    }
}
