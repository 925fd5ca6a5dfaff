//! Descriptor serialization
//!
//! Produces the same XML format [`parse_str`](super::parse_str) reads, so a
//! parsed descriptor written back and parsed again is unchanged.

use super::tags;
use super::{DependencyKind, PluginDescriptor};
use std::fmt::Write;

const INDENT: &str = "    ";

/// Render a descriptor as XML
pub fn write(descriptor: &PluginDescriptor) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let _ = write!(
        out,
        "<{} {}=\"{}\" {}=\"{}\" {}=\"{}\"",
        tags::PLUGIN,
        tags::NAME,
        escape(&descriptor.name),
        tags::VERSION,
        descriptor.version,
        tags::COMPAT_VERSION,
        descriptor.compat_version
    );
    if descriptor.experimental {
        let _ = write!(out, " {}=\"true\"", tags::EXPERIMENTAL);
    }
    out.push_str(">\n");

    for (tag, value) in [
        (tags::VENDOR, &descriptor.vendor),
        (tags::COPYRIGHT, &descriptor.copyright),
        (tags::LICENSE, &descriptor.license),
        (tags::CATEGORY, &descriptor.category),
        (tags::DESCRIPTION, &descriptor.description),
        (tags::URL, &descriptor.url),
    ] {
        if !value.is_empty() {
            let _ = writeln!(out, "{INDENT}<{tag}>{}</{tag}>", escape(value));
        }
    }

    if let Some(library) = &descriptor.library {
        let _ = writeln!(
            out,
            "{INDENT}<{tag}>{}</{tag}>",
            escape(&library.to_string_lossy()),
            tag = tags::LIBRARY
        );
    }

    if !descriptor.dependencies.is_empty() {
        let _ = writeln!(out, "{INDENT}<{}>", tags::DEPENDENCY_LIST);
        for dependency in &descriptor.dependencies {
            let _ = write!(
                out,
                "{INDENT}{INDENT}<{} {}=\"{}\" {}=\"{}\"",
                tags::DEPENDENCY,
                tags::NAME,
                escape(&dependency.name),
                tags::VERSION,
                escape(&dependency.range.to_string())
            );
            if dependency.kind == DependencyKind::Optional {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    tags::DEPENDENCY_TYPE,
                    tags::DEPENDENCY_TYPE_OPTIONAL
                );
            }
            out.push_str("/>\n");
        }
        let _ = writeln!(out, "{INDENT}</{}>", tags::DEPENDENCY_LIST);
    }

    if !descriptor.arguments.is_empty() {
        let _ = writeln!(out, "{INDENT}<{}>", tags::ARGUMENT_LIST);
        for argument in &descriptor.arguments {
            let _ = write!(
                out,
                "{INDENT}{INDENT}<{} {}=\"{}\"",
                tags::ARGUMENT,
                tags::NAME,
                escape(&argument.name)
            );
            if argument.takes_value() {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    tags::ARGUMENT_PARAMETER,
                    escape(&argument.parameter)
                );
            }
            if argument.description.is_empty() {
                out.push_str("/>\n");
            } else {
                let _ = writeln!(
                    out,
                    ">{}</{}>",
                    escape(&argument.description),
                    tags::ARGUMENT
                );
            }
        }
        let _ = writeln!(out, "{INDENT}</{}>", tags::ARGUMENT_LIST);
    }

    let _ = writeln!(out, "</{}>", tags::PLUGIN);
    out
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
