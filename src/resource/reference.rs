// ABOUTME: Scanning and substitution of `${kind.name.output}` references.
// ABOUTME: References become concrete graph edges before planning.

use crate::types::{Address, Value};
use thiserror::Error;

/// A reference occurrence inside one attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub to: Address,
    pub output: String,
}

/// A fully-resolved reference edge: `from`'s attribute is computed from
/// `to`'s output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub from: Address,
    pub to: Address,
    pub output: String,
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceSyntaxError {
    #[error("unterminated reference, missing `}}`")]
    Unterminated,

    #[error("malformed reference `${{{0}}}`, expected `kind.name.output`")]
    Malformed(String),
}

/// Errors substituting reference values at execution time.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{address}` has no recorded output `{output}`")]
    MissingOutput { address: Address, output: String },

    #[error("`{address}` is not ready, its outputs are unavailable")]
    NotReady { address: Address },

    #[error("output `{output}` of `{address}` is a list and cannot be spliced into a string")]
    ListFragment { address: Address, output: String },
}

/// Scan a string for `${kind.name.output}` occurrences.
///
/// Returns the references in order of appearance. An empty result means
/// the string is a plain literal.
pub fn scan(value: &str) -> Result<Vec<RawReference>, ReferenceSyntaxError> {
    let mut refs = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ReferenceSyntaxError::Unterminated)?;
        let inner = &after[..end];
        refs.push(parse_inner(inner)?);
        rest = &after[end + 1..];
    }

    Ok(refs)
}

/// Scan every string inside a value, descending into lists.
pub fn scan_value(value: &Value) -> Result<Vec<RawReference>, ReferenceSyntaxError> {
    match value {
        Value::String(s) => scan(s),
        Value::List(items) => {
            let mut refs = Vec::new();
            for item in items {
                refs.extend(scan_value(item)?);
            }
            Ok(refs)
        }
        Value::Bool(_) | Value::Int(_) => Ok(Vec::new()),
    }
}

fn parse_inner(inner: &str) -> Result<RawReference, ReferenceSyntaxError> {
    let segments: Vec<&str> = inner.split('.').collect();
    if segments.len() != 3 {
        return Err(ReferenceSyntaxError::Malformed(inner.to_string()));
    }

    let address = Address::parse(&format!("{}.{}", segments[0], segments[1]))
        .map_err(|_| ReferenceSyntaxError::Malformed(inner.to_string()))?;

    if segments[2].is_empty() {
        return Err(ReferenceSyntaxError::Malformed(inner.to_string()));
    }

    Ok(RawReference {
        to: address,
        output: segments[2].to_string(),
    })
}

/// Substitute all references in a string using recorded outputs.
///
/// A string that is exactly one reference yields the referenced value
/// with its type preserved; embedded references are spliced as text.
/// The lookup returns `None` when the target has no such output.
pub fn interpolate<F>(value: &str, lookup: &F) -> Result<Value, ResolveError>
where
    F: Fn(&Address, &str) -> Result<Option<Value>, ResolveError>,
{
    let refs = scan(value).unwrap_or_default();
    if refs.is_empty() {
        return Ok(Value::String(value.to_string()));
    }

    // Whole-string reference: pass the value through with its type intact.
    if refs.len() == 1 {
        let only = &refs[0];
        let exact = format!("${{{}.{}}}", only.to, only.output);
        if value == exact {
            return lookup(&only.to, &only.output)?.ok_or_else(|| ResolveError::MissingOutput {
                address: only.to.clone(),
                output: only.output.clone(),
            });
        }
    }

    let mut result = String::new();
    let mut rest = value;
    for raw in &refs {
        let token = format!("${{{}.{}}}", raw.to, raw.output);
        let pos = rest.find(&token).unwrap_or(rest.len());
        result.push_str(&rest[..pos.min(rest.len())]);

        let resolved =
            lookup(&raw.to, &raw.output)?.ok_or_else(|| ResolveError::MissingOutput {
                address: raw.to.clone(),
                output: raw.output.clone(),
            })?;
        let fragment =
            resolved
                .interpolation_fragment()
                .ok_or_else(|| ResolveError::ListFragment {
                    address: raw.to.clone(),
                    output: raw.output.clone(),
                })?;
        result.push_str(&fragment);
        rest = &rest[(pos + token.len()).min(rest.len())..];
    }
    result.push_str(rest);

    Ok(Value::String(result))
}

/// Substitute references inside a value, descending into lists.
pub fn interpolate_value<F>(value: &Value, lookup: &F) -> Result<Value, ResolveError>
where
    F: Fn(&Address, &str) -> Result<Option<Value>, ResolveError>,
{
    match value {
        Value::String(s) => interpolate(s, lookup),
        Value::List(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(interpolate_value(item, lookup)?);
            }
            Ok(Value::List(resolved))
        }
        other => Ok(other.clone()),
    }
}
