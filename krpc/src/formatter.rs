use colored::*;
use krpc_core::binder::{Binding, Class, Method, Parameter, Procedure, Service};
use krpc_core::types::{Enumeration, Type};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList<'a>(pub Vec<&'a Service>);

pub struct HexString(pub Vec<u8>);

pub struct Guid(pub String);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<HexString> for FormattedString {
    fn from(HexString(data): HexString) -> Self {
        if data.is_empty() {
            return FormattedString("(empty)".yellow().to_string());
        }
        FormattedString(hex::encode(data))
    }
}

impl From<Guid> for FormattedString {
    fn from(Guid(guid): Guid) -> Self {
        FormattedString(guid.green().to_string())
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        let mut out = format!("{} {}", "Error:".red().bold(), err);
        for cause in err.chain().skip(1) {
            out.push_str(&format!("\n  {} {}", "caused by:".yellow(), cause));
        }
        FormattedString(out)
    }
}

impl From<ServiceList<'_>> for FormattedString {
    fn from(ServiceList(services): ServiceList<'_>) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!(
                "  - {} ({} members, {} classes)\n",
                svc.name().green(),
                svc.members().count(),
                svc.classes().count()
            ));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<&Service> for FormattedString {
    fn from(service: &Service) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "service".cyan(),
            service.name().green()
        ));

        for (name, binding) in service.members() {
            out.push_str("  ");
            out.push_str(&binding_line(name, binding));
            out.push('\n');
        }

        for class in service.classes() {
            out.push('\n');
            out.push_str(&indent(&FormattedString::from(class).0));
            out.push('\n');
        }

        out.push('}');
        FormattedString(out)
    }
}

impl From<&Class> for FormattedString {
    fn from(class: &Class) -> Self {
        let mut out = String::new();
        out.push_str(&format!("{} {} {{\n", "class".cyan(), class.name().green()));

        for (name, binding) in class.members() {
            out.push_str("  ");
            out.push_str(&binding_line(name, binding));
            out.push('\n');
        }

        out.push('}');
        FormattedString(out)
    }
}

impl From<&Enumeration> for FormattedString {
    fn from(enumeration: &Enumeration) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "enum".cyan(),
            enumeration.name.green()
        ));

        for member in &enumeration.members {
            out.push_str(&format!(
                "  {} = {};\n",
                member.name,
                member.value.to_string().purple()
            ));
        }
        out.push('}');

        FormattedString(out)
    }
}

fn binding_line(name: &str, binding: &Binding) -> String {
    match binding {
        Binding::Procedure(procedure) => format!(
            "{} {}({}){};",
            "rpc".cyan(),
            name.green(),
            parameter_list(procedure.parameters()),
            returns(procedure)
        ),
        Binding::ClassStaticMethod(procedure) => format!(
            "{} {}({}){};",
            "static".cyan(),
            name.green(),
            parameter_list(procedure.parameters()),
            returns(procedure)
        ),
        Binding::ClassMethod(method) => format!(
            "{} {}({}){};",
            "method".cyan(),
            name.green(),
            parameter_list(method.parameters()),
            returns(method.procedure())
        ),
        Binding::Property(accessor) => {
            let ty = accessor
                .getter()
                .and_then(|getter| getter.return_type().cloned())
                .or_else(|| {
                    accessor
                        .setter()
                        .and_then(|setter| last_type(setter.parameters()))
                });
            property_line(
                name,
                ty.as_deref(),
                accessor.getter().is_some(),
                accessor.setter().is_some(),
            )
        }
        Binding::ClassProperty(accessor) => {
            let ty = accessor
                .getter()
                .and_then(|getter| getter.procedure().return_type().cloned())
                .or_else(|| {
                    accessor
                        .setter()
                        .and_then(|setter: &Method| last_type(setter.parameters()))
                });
            property_line(
                name,
                ty.as_deref(),
                accessor.getter().is_some(),
                accessor.setter().is_some(),
            )
        }
        Binding::Enumeration(enumeration) => {
            FormattedString::from(&**enumeration).0.replace('\n', "\n  ")
        }
    }
}

fn property_line(name: &str, ty: Option<&Type>, readable: bool, writable: bool) -> String {
    let ty = ty.map(|ty| ty.to_string()).unwrap_or_default();
    let mut halves = Vec::new();
    if readable {
        halves.push("get;");
    }
    if writable {
        halves.push("set;");
    }

    format!(
        "{} {}: {} {{ {} }}",
        "property".cyan(),
        name.green(),
        ty.yellow(),
        halves.join(" ")
    )
}

fn parameter_list(parameters: &[Parameter]) -> String {
    parameters
        .iter()
        .map(|param| {
            let default = if param.default.is_some() { " = ..." } else { "" };
            format!("{}: {}{}", param.name, param.ty.to_string().yellow(), default)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn returns(procedure: &Procedure) -> String {
    match procedure.return_type() {
        Some(ty) => format!(" -> {}", ty.to_string().yellow()),
        None => String::new(),
    }
}

fn last_type(parameters: &[Parameter]) -> Option<std::sync::Arc<Type>> {
    parameters.last().map(|param| param.ty.clone())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
