//! Single-pass parser for type descriptor strings.
//!
//! ```text
//! value      := "double" | "float" | "sint32" | "sint64" | "uint32" | "uint64"
//!             | "bool" | "string" | "bytes"
//! class      := "Class(" service "." name ")"
//! enum       := "Enum("  service "." name ")"
//! list       := "List("  type ")"
//! set        := "Set("   type ")"
//! dictionary := "Dictionary(" type "," type ")"
//! tuple      := "Tuple(" type {"," type} ")"
//! message    := package "." name
//! ```
use super::{MessageKind, Type, TypeRegistry, ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Empty type descriptor")]
    Empty,
    #[error("'{descriptor}' is not a valid type descriptor: {reason}")]
    Malformed {
        descriptor: String,
        reason: &'static str,
    },
    #[error("'{0}' uses an unknown collection keyword")]
    UnknownKeyword(String),
    #[error("'{0}' is not a known message type")]
    UnknownMessage(String),
}

const CLASS: &str = "Class(";
const ENUM: &str = "Enum(";
const LIST: &str = "List(";
const SET: &str = "Set(";
const DICTIONARY: &str = "Dictionary(";
const TUPLE: &str = "Tuple(";

pub(super) fn parse(registry: &TypeRegistry, descriptor: &str) -> Result<Type, DescriptorError> {
    if descriptor.is_empty() {
        return Err(DescriptorError::Empty);
    }

    if let Some(kind) = ValueKind::from_keyword(descriptor) {
        return Ok(Type::Value(kind));
    }

    if let Some(inner) = arguments_of(CLASS, descriptor)? {
        let (service, name) = qualified_name(descriptor, inner)?;
        return Ok(Type::Class { service, name });
    }

    if let Some(inner) = arguments_of(ENUM, descriptor)? {
        let (service, name) = qualified_name(descriptor, inner)?;
        return Ok(Type::Enum { service, name });
    }

    if let Some(inner) = arguments_of(LIST, descriptor)? {
        let [elem] = fixed_arguments(registry, descriptor, inner)?;
        return Ok(Type::List(elem));
    }

    if let Some(inner) = arguments_of(SET, descriptor)? {
        let [elem] = fixed_arguments(registry, descriptor, inner)?;
        return Ok(Type::Set(elem));
    }

    if let Some(inner) = arguments_of(DICTIONARY, descriptor)? {
        let [key, value] = fixed_arguments(registry, descriptor, inner)?;
        return Ok(Type::Dictionary(key, value));
    }

    if let Some(inner) = arguments_of(TUPLE, descriptor)? {
        let elems = split_arguments(descriptor, inner)?
            .into_iter()
            .map(|arg| registry.resolve(arg))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Type::Tuple(elems));
    }

    if descriptor.contains('(') {
        return Err(DescriptorError::UnknownKeyword(descriptor.to_string()));
    }

    if !is_dotted_identifier(descriptor) {
        return Err(DescriptorError::Malformed {
            descriptor: descriptor.to_string(),
            reason: "expected a value type keyword, a collection or a message name",
        });
    }

    MessageKind::from_full_name(descriptor)
        .map(Type::Message)
        .ok_or_else(|| DescriptorError::UnknownMessage(descriptor.to_string()))
}

/// Strips `keyword` and the closing parenthesis, returning the argument list.
fn arguments_of<'a>(
    keyword: &str,
    descriptor: &'a str,
) -> Result<Option<&'a str>, DescriptorError> {
    let Some(rest) = descriptor.strip_prefix(keyword) else {
        return Ok(None);
    };
    rest.strip_suffix(')')
        .filter(|inner| !inner.is_empty())
        .map(Some)
        .ok_or_else(|| DescriptorError::Malformed {
            descriptor: descriptor.to_string(),
            reason: "missing type arguments or closing parenthesis",
        })
}

fn fixed_arguments<const N: usize>(
    registry: &TypeRegistry,
    descriptor: &str,
    inner: &str,
) -> Result<[std::sync::Arc<Type>; N], DescriptorError> {
    let args = split_arguments(descriptor, inner)?;
    let args: [&str; N] = args.try_into().map_err(|_| DescriptorError::Malformed {
        descriptor: descriptor.to_string(),
        reason: "wrong number of type arguments",
    })?;

    let mut resolved = Vec::with_capacity(N);
    for arg in args {
        resolved.push(registry.resolve(arg)?);
    }

    resolved.try_into().map_err(|_| DescriptorError::Malformed {
        descriptor: descriptor.to_string(),
        reason: "wrong number of type arguments",
    })
}

/// Splits an argument list on the commas found at nesting depth zero.
fn split_arguments<'a>(descriptor: &str, inner: &'a str) -> Result<Vec<&'a str>, DescriptorError> {
    let malformed = |reason| DescriptorError::Malformed {
        descriptor: descriptor.to_string(),
        reason,
    };

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unbalanced parentheses"))?;
            }
            ',' if depth == 0 => {
                args.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(malformed("unbalanced parentheses"));
    }
    args.push(&inner[start..]);

    if args.iter().any(|arg| arg.is_empty()) {
        return Err(malformed("empty type argument"));
    }
    Ok(args)
}

fn qualified_name(descriptor: &str, inner: &str) -> Result<(String, String), DescriptorError> {
    match inner.split_once('.') {
        Some((service, name))
            if is_identifier(service) && is_identifier(name) =>
        {
            Ok((service.to_string(), name.to_string()))
        }
        _ => Err(DescriptorError::Malformed {
            descriptor: descriptor.to_string(),
            reason: "expected 'Service.Name'",
        }),
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_dotted_identifier(s: &str) -> bool {
    s.contains('.') && s.split('.').all(is_identifier)
}
