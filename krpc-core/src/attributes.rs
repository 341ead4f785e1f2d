//! # Procedure Attributes
//!
//! The server annotates every procedure with a list of tag strings. The tags decide
//! what kind of member a procedure becomes on the client side and may refine the
//! declared parameter and return types:
//!
//! ```text
//! Property.Get(Name)                         Property.Set(Name)
//! Class.Method(Service.Class,Method)         Class.StaticMethod(Service.Class,Method)
//! Class.Property.Get(Service.Class,Prop)     Class.Property.Set(Service.Class,Prop)
//! ReturnType.<descriptor>                    ParameterType(<index>).<descriptor>
//! ```
//!
//! Tags that match none of these forms are kept as [`Attribute::Other`] and ignored.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed attribute '{tag}': {reason}")]
pub struct AttributeError {
    pub tag: String,
    pub reason: &'static str,
}

/// A single parsed attribute tag, borrowing from the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute<'a> {
    PropertyGet(&'a str),
    PropertySet(&'a str),
    ClassMethod { class: &'a str, method: &'a str },
    ClassStaticMethod { class: &'a str, method: &'a str },
    ClassPropertyGet { class: &'a str, property: &'a str },
    ClassPropertySet { class: &'a str, property: &'a str },
    ReturnType(&'a str),
    ParameterType { position: usize, descriptor: &'a str },
    Other(&'a str),
}

impl<'a> Attribute<'a> {
    pub fn parse(tag: &'a str) -> Result<Self, AttributeError> {
        let malformed = |reason| AttributeError {
            tag: tag.to_string(),
            reason,
        };

        if let Some(args) = call_arguments("Property.Get(", tag) {
            return single_name(args)
                .map(Attribute::PropertyGet)
                .ok_or_else(|| malformed("expected a property name"));
        }
        if let Some(args) = call_arguments("Property.Set(", tag) {
            return single_name(args)
                .map(Attribute::PropertySet)
                .ok_or_else(|| malformed("expected a property name"));
        }
        if let Some(args) = call_arguments("Class.Method(", tag) {
            let (class, method) =
                class_member(args).ok_or_else(|| malformed("expected 'Class,Method'"))?;
            return Ok(Attribute::ClassMethod { class, method });
        }
        if let Some(args) = call_arguments("Class.StaticMethod(", tag) {
            let (class, method) =
                class_member(args).ok_or_else(|| malformed("expected 'Class,Method'"))?;
            return Ok(Attribute::ClassStaticMethod { class, method });
        }
        if let Some(args) = call_arguments("Class.Property.Get(", tag) {
            let (class, property) =
                class_member(args).ok_or_else(|| malformed("expected 'Class,Property'"))?;
            return Ok(Attribute::ClassPropertyGet { class, property });
        }
        if let Some(args) = call_arguments("Class.Property.Set(", tag) {
            let (class, property) =
                class_member(args).ok_or_else(|| malformed("expected 'Class,Property'"))?;
            return Ok(Attribute::ClassPropertySet { class, property });
        }

        if let Some(descriptor) = tag.strip_prefix("ReturnType.") {
            if descriptor.is_empty() {
                return Err(malformed("missing return type descriptor"));
            }
            return Ok(Attribute::ReturnType(descriptor));
        }

        if let Some(rest) = tag.strip_prefix("ParameterType(") {
            let (index, descriptor) = rest
                .split_once(").")
                .ok_or_else(|| malformed("expected 'ParameterType(<index>).<descriptor>'"))?;
            let position = index
                .parse::<usize>()
                .map_err(|_| malformed("parameter index is not a number"))?;
            if descriptor.is_empty() {
                return Err(malformed("missing parameter type descriptor"));
            }
            return Ok(Attribute::ParameterType {
                position,
                descriptor,
            });
        }

        Ok(Attribute::Other(tag))
    }
}

/// What a procedure becomes once its attributes are taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind<'a> {
    Procedure,
    PropertyGetter(&'a str),
    PropertySetter(&'a str),
    ClassMethod { class: &'a str, method: &'a str },
    ClassStaticMethod { class: &'a str, method: &'a str },
    ClassPropertyGetter { class: &'a str, property: &'a str },
    ClassPropertySetter { class: &'a str, property: &'a str },
}

/// Classifies a procedure from its attribute tags.
///
/// Precedence: service properties, then class methods, then class properties. A
/// procedure with none of those tags is a plain procedure.
pub fn classify(attributes: &[String]) -> Result<MemberKind<'_>, AttributeError> {
    let parsed = attributes
        .iter()
        .map(|tag| Attribute::parse(tag))
        .collect::<Result<Vec<_>, _>>()?;

    let property = parsed.iter().find_map(|attr| match *attr {
        Attribute::PropertyGet(name) => Some(MemberKind::PropertyGetter(name)),
        Attribute::PropertySet(name) => Some(MemberKind::PropertySetter(name)),
        _ => None,
    });

    let method = || {
        parsed.iter().find_map(|attr| match *attr {
            Attribute::ClassMethod { class, method } => {
                Some(MemberKind::ClassMethod { class, method })
            }
            Attribute::ClassStaticMethod { class, method } => {
                Some(MemberKind::ClassStaticMethod { class, method })
            }
            _ => None,
        })
    };

    let class_property = || {
        parsed.iter().find_map(|attr| match *attr {
            Attribute::ClassPropertyGet { class, property } => {
                Some(MemberKind::ClassPropertyGetter { class, property })
            }
            Attribute::ClassPropertySet { class, property } => {
                Some(MemberKind::ClassPropertySetter { class, property })
            }
            _ => None,
        })
    };

    Ok(property
        .or_else(method)
        .or_else(class_property)
        .unwrap_or(MemberKind::Procedure))
}

/// Descriptors from `ParameterType(<position>).<descriptor>` tags, in declaration order.
///
/// Malformed tags are skipped here; [`classify`] is where they are reported.
pub fn parameter_type_overrides(
    position: usize,
    attributes: &[String],
) -> impl Iterator<Item = &str> {
    attributes
        .iter()
        .filter_map(move |tag| match Attribute::parse(tag) {
            Ok(Attribute::ParameterType {
                position: p,
                descriptor,
            }) if p == position => Some(descriptor),
            _ => None,
        })
}

/// Descriptors from `ReturnType.<descriptor>` tags, in declaration order.
pub fn return_type_overrides(attributes: &[String]) -> impl Iterator<Item = &str> {
    attributes
        .iter()
        .filter_map(|tag| match Attribute::parse(tag) {
            Ok(Attribute::ReturnType(descriptor)) => Some(descriptor),
            _ => None,
        })
}

fn call_arguments<'a>(prefix: &str, tag: &'a str) -> Option<&'a str> {
    // A missing closing parenthesis yields an empty argument list, which never validates.
    tag.strip_prefix(prefix)
        .map(|rest| rest.strip_suffix(')').unwrap_or_default())
}

fn single_name(args: &str) -> Option<&str> {
    is_name(args).then_some(args)
}

/// Splits `Service.Class,Member` and keeps the class segment after the last dot.
fn class_member(args: &str) -> Option<(&str, &str)> {
    let (qualified, member) = args.split_once(',')?;
    let class = qualified.rsplit('.').next()?;
    let valid = qualified.split('.').all(is_name) && is_name(member);
    valid.then_some((class, member))
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
