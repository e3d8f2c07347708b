// pest grammar (`query.pest`) plus the walk from parse pairs into the
// document model.

use pest::Parser;
use pest::error::{Error as PestError, LineColLocation};
use pest::iterators::{Pair, Pairs};
use serde_json::{Number, Value};

use super::{Field, InputValue, Operation, OperationKind, VariableDefinition};
use crate::error::CoreError;

/// Deepest `{`, `[` or `(` nesting a document may use.
pub(super) const MAX_NESTING: usize = 64;

#[derive(pest_derive::Parser)]
#[grammar = "query/query.pest"]
struct QueryGrammar;

pub(super) fn parse_document(source: &str) -> Result<Vec<Operation>, CoreError> {
    // The grammar and the walk below both recurse per nesting level.
    check_nesting(source)?;

    let mut pairs = QueryGrammar::parse(Rule::document, source).map_err(syntax_error)?;
    let document = next_inner(&mut pairs)?;

    let mut operations = Vec::new();
    for pair in document.into_inner() {
        match pair.as_rule() {
            Rule::operation => operations.push(build_operation(pair)?),
            Rule::fragment_definition => return Err(parse_error("fragments are not supported")),
            _ => {}
        }
    }
    if operations.is_empty() {
        return Err(parse_error("document contains no operations"));
    }
    Ok(operations)
}

fn parse_error(message: impl Into<String>) -> CoreError {
    CoreError::QueryParse {
        message: message.into(),
    }
}

fn syntax_error(err: PestError<Rule>) -> CoreError {
    let err = err.renamed_rules(|rule| describe_rule(*rule));
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
    };
    parse_error(format!(
        "{} at line {line}, column {column}",
        err.variant.message()
    ))
}

fn describe_rule(rule: Rule) -> String {
    match rule {
        Rule::EOI => "end of document".into(),
        Rule::operation => "an operation".into(),
        Rule::operation_type => "query, mutation or subscription".into(),
        Rule::selection_set => "a selection set".into(),
        Rule::field | Rule::spread => "a field".into(),
        Rule::name | Rule::alias | Rule::named_type => "a name".into(),
        Rule::variable => "a variable".into(),
        Rule::string | Rule::characters => "a string".into(),
        Rule::int | Rule::float => "a number".into(),
        Rule::boolean | Rule::null | Rule::enum_value | Rule::list | Rule::object => {
            "a value".into()
        }
        other => format!("{other:?}"),
    }
}

fn next_inner<'i>(pairs: &mut Pairs<'i, Rule>) -> Result<Pair<'i, Rule>, CoreError> {
    pairs
        .next()
        .ok_or_else(|| parse_error("malformed document"))
}

// ── Nesting limit ───────────────────────────────────────────────────

/// Reject documents nested deeper than [`MAX_NESTING`] before parsing.
/// Brackets inside strings and comments do not count.
fn check_nesting(source: &str) -> Result<(), CoreError> {
    let mut depth = 0usize;
    let mut chars = source.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' | '\n' => break,
                        _ => {}
                    }
                }
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' | '[' | '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(parse_error(format!(
                        "document nests deeper than {MAX_NESTING} levels"
                    )));
                }
            }
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// ── Operations ──────────────────────────────────────────────────────

fn build_operation(pair: Pair<'_, Rule>) -> Result<Operation, CoreError> {
    // `{ ... }` shorthand is an anonymous query.
    let mut operation = Operation {
        kind: OperationKind::Query,
        name: None,
        variables: Vec::new(),
        fields: Vec::new(),
    };

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::operation_type => {
                operation.kind = match part.as_str() {
                    "mutation" => OperationKind::Mutation,
                    "subscription" => OperationKind::Subscription,
                    _ => OperationKind::Query,
                };
            }
            Rule::name => operation.name = Some(part.as_str().to_owned()),
            Rule::variable_definitions => {
                operation.variables = part
                    .into_inner()
                    .map(build_variable_definition)
                    .collect::<Result<_, _>>()?;
            }
            Rule::selection_set => operation.fields = build_selection_set(part)?,
            // Directives carry no meaning for invocations.
            _ => {}
        }
    }
    Ok(operation)
}

fn build_variable_definition(pair: Pair<'_, Rule>) -> Result<VariableDefinition, CoreError> {
    let mut name = String::new();
    let mut default = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::variable => name = variable_name(&part),
            Rule::default_value => {
                let value = next_inner(&mut part.into_inner())?;
                default = Some(build_value(value, true)?);
            }
            // Types only matter to a schema-aware validator.
            _ => {}
        }
    }
    Ok(VariableDefinition { name, default })
}

fn variable_name(pair: &Pair<'_, Rule>) -> String {
    pair.as_str().trim_start_matches('$').to_owned()
}

// ── Selections ──────────────────────────────────────────────────────

fn build_selection_set(pair: Pair<'_, Rule>) -> Result<Vec<Field>, CoreError> {
    let mut fields = Vec::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::spread => return Err(parse_error("fragment spreads are not supported")),
            Rule::field => fields.push(build_field(part)?),
            _ => {}
        }
    }
    Ok(fields)
}

fn build_field(pair: Pair<'_, Rule>) -> Result<Field, CoreError> {
    let mut alias = None;
    let mut method = String::new();
    let mut args = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::alias => alias = Some(part.as_str().to_owned()),
            Rule::name => method = part.as_str().to_owned(),
            Rule::arguments => args = build_arguments(part)?,
            // Validated for shape, then dropped.
            Rule::selection_set => {
                build_selection_set(part)?;
            }
            _ => {}
        }
    }
    Ok(Field {
        alias,
        method,
        args,
    })
}

fn build_arguments(pair: Pair<'_, Rule>) -> Result<Vec<(String, InputValue)>, CoreError> {
    pair.into_inner()
        .map(|argument| build_entry(argument, false))
        .collect()
}

/// `name: value`, as found in arguments and object literals.
fn build_entry(pair: Pair<'_, Rule>, constant: bool) -> Result<(String, InputValue), CoreError> {
    let mut inner = pair.into_inner();
    let name = next_inner(&mut inner)?.as_str().to_owned();
    let value = build_value(next_inner(&mut inner)?, constant)?;
    Ok((name, value))
}

// ── Values ──────────────────────────────────────────────────────────

fn build_value(pair: Pair<'_, Rule>, constant: bool) -> Result<InputValue, CoreError> {
    let text = pair.as_str();
    let value = match pair.as_rule() {
        Rule::variable => {
            let name = variable_name(&pair);
            if constant {
                return Err(parse_error(format!(
                    "variable '${name}' is not allowed in a default value"
                )));
            }
            InputValue::Variable(name)
        }
        Rule::int => {
            let n: i64 = text
                .parse()
                .map_err(|_| parse_error(format!("integer out of range '{text}'")))?;
            InputValue::Literal(Value::from(n))
        }
        Rule::float => {
            let number = text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| parse_error(format!("float '{text}' is not finite")))?;
            InputValue::Literal(Value::Number(number))
        }
        Rule::string => {
            let characters = next_inner(&mut pair.into_inner())?;
            InputValue::Literal(Value::String(unescape(characters.as_str())?))
        }
        Rule::boolean => InputValue::Literal(Value::Bool(text == "true")),
        Rule::null => InputValue::Literal(Value::Null),
        // Enum values travel as their names.
        Rule::enum_value => InputValue::Literal(Value::String(text.to_owned())),
        Rule::list => InputValue::List(
            pair.into_inner()
                .map(|item| build_value(item, constant))
                .collect::<Result<_, _>>()?,
        ),
        Rule::object => InputValue::Object(
            pair.into_inner()
                .map(|field| build_entry(field, constant))
                .collect::<Result<_, _>>()?,
        ),
        other => {
            return Err(parse_error(format!(
                "expected a value, found {}",
                describe_rule(other)
            )));
        }
    };
    Ok(value)
}

/// Decode the escapes the grammar admitted.
fn unescape(raw: &str) -> Result<String, CoreError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| parse_error(format!("invalid unicode escape '\\u{hex}'")))?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => return Err(parse_error("dangling escape in string")),
        }
    }
    Ok(out)
}
