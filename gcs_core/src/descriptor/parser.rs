//! Descriptor parsing using roxmltree

use super::tags;
use super::{
    DependencyKind, PluginArgumentDescription, PluginDependency, PluginDescriptor, VersionRange,
};
use crate::error::{DescriptorFault, PluginError, PluginResult};
use roxmltree::{Document, Node};
use semver::Version;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read and parse the descriptor at `path`
pub fn parse_file(path: &Path) -> PluginResult<PluginDescriptor> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PluginError::FileNotFound(path.to_path_buf()),
        _ => PluginError::FileUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })?;

    parse_str(&content, path)
}

/// Parse descriptor text; `path` is only used for error reporting
pub fn parse_str(content: &str, path: &Path) -> PluginResult<PluginDescriptor> {
    let document = Document::parse(content).map_err(|e| {
        let pos = e.pos();
        PluginError::MalformedDescriptor {
            path: path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            fault: DescriptorFault::Syntax(e.to_string()),
        }
    })?;

    DescriptorReader {
        document: &document,
        path,
    }
    .read()
}

struct DescriptorReader<'a, 'input> {
    document: &'a Document<'input>,
    path: &'a Path,
}

impl<'a, 'input> DescriptorReader<'a, 'input> {
    fn read(&self) -> PluginResult<PluginDescriptor> {
        let root = self.document.root_element();
        if root.tag_name().name() != tags::PLUGIN {
            return Err(self.fault(
                root,
                DescriptorFault::WrongTopLevelElement(root.tag_name().name().to_string()),
            ));
        }

        let name = self.required_attribute(root, tags::NAME)?;
        let version = self.version_attribute(root, tags::VERSION)?;
        let compat_version = self.version_attribute(root, tags::COMPAT_VERSION)?;
        if compat_version > version {
            return Err(self.fault(
                root,
                DescriptorFault::InvalidAttribute {
                    attribute: tags::COMPAT_VERSION.to_string(),
                    value: compat_version.to_string(),
                    reason: format!("must not be greater than version {}", version),
                },
            ));
        }
        let experimental = self.bool_attribute(root, tags::EXPERIMENTAL)?;

        let mut descriptor = PluginDescriptor::new(name, version);
        descriptor.compat_version = compat_version;
        descriptor.experimental = experimental;

        for child in root.children().filter(Node::is_element) {
            match child.tag_name().name() {
                tags::VENDOR => descriptor.vendor = self.text(child)?,
                tags::COPYRIGHT => descriptor.copyright = self.text(child)?,
                tags::LICENSE => descriptor.license = self.text(child)?,
                tags::DESCRIPTION => descriptor.description = self.text(child)?,
                tags::URL => descriptor.url = self.text(child)?,
                tags::CATEGORY => descriptor.category = self.text(child)?,
                tags::LIBRARY => {
                    let library = self.text(child)?;
                    if library.is_empty() {
                        return Err(self.fault(
                            child,
                            DescriptorFault::InvalidAttribute {
                                attribute: tags::LIBRARY.to_string(),
                                value: library,
                                reason: "library path must not be empty".to_string(),
                            },
                        ));
                    }
                    descriptor.library = Some(PathBuf::from(library));
                }
                tags::DEPENDENCY_LIST => {
                    for dependency in child.children().filter(Node::is_element) {
                        descriptor.dependencies.push(self.read_dependency(dependency)?);
                    }
                }
                tags::ARGUMENT_LIST => {
                    for argument in child.children().filter(Node::is_element) {
                        descriptor.arguments.push(self.read_argument(argument)?);
                    }
                }
                other => {
                    return Err(
                        self.fault(child, DescriptorFault::UnexpectedElement(other.to_string()))
                    )
                }
            }
        }

        Ok(descriptor)
    }

    fn read_dependency(&self, node: Node) -> PluginResult<PluginDependency> {
        if node.tag_name().name() != tags::DEPENDENCY {
            return Err(self.fault(
                node,
                DescriptorFault::UnexpectedElement(node.tag_name().name().to_string()),
            ));
        }

        self.reject_children(node)?;

        let name = self.required_attribute(node, tags::NAME)?;
        let range_text = self.required_attribute(node, tags::VERSION)?;
        let range = VersionRange::parse(&range_text).map_err(|e| {
            self.fault(
                node,
                DescriptorFault::InvalidAttribute {
                    attribute: tags::VERSION.to_string(),
                    value: range_text.clone(),
                    reason: e.to_string(),
                },
            )
        })?;

        let kind = match node.attribute(tags::DEPENDENCY_TYPE) {
            None | Some(tags::DEPENDENCY_TYPE_REQUIRED) => DependencyKind::Required,
            Some(tags::DEPENDENCY_TYPE_OPTIONAL) => DependencyKind::Optional,
            Some(other) => {
                return Err(self.fault(
                    node,
                    DescriptorFault::InvalidAttribute {
                        attribute: tags::DEPENDENCY_TYPE.to_string(),
                        value: other.to_string(),
                        reason: format!(
                            "expected '{}' or '{}'",
                            tags::DEPENDENCY_TYPE_REQUIRED,
                            tags::DEPENDENCY_TYPE_OPTIONAL
                        ),
                    },
                ))
            }
        };

        Ok(PluginDependency { name, range, kind })
    }

    fn read_argument(&self, node: Node) -> PluginResult<PluginArgumentDescription> {
        if node.tag_name().name() != tags::ARGUMENT {
            return Err(self.fault(
                node,
                DescriptorFault::UnexpectedElement(node.tag_name().name().to_string()),
            ));
        }

        Ok(PluginArgumentDescription {
            name: self.required_attribute(node, tags::NAME)?,
            parameter: node
                .attribute(tags::ARGUMENT_PARAMETER)
                .unwrap_or_default()
                .to_string(),
            description: self.text(node)?,
        })
    }

    /// Trimmed text of a text-only element
    fn text(&self, node: Node) -> PluginResult<String> {
        self.reject_children(node)?;
        Ok(node.text().map(str::trim).unwrap_or_default().to_string())
    }

    fn reject_children(&self, node: Node) -> PluginResult<()> {
        match node.children().find(Node::is_element) {
            Some(child) => Err(self.fault(
                child,
                DescriptorFault::UnexpectedElement(child.tag_name().name().to_string()),
            )),
            None => Ok(()),
        }
    }

    fn required_attribute(&self, node: Node, attribute: &str) -> PluginResult<String> {
        match node.attribute(attribute) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(self.fault(
                node,
                DescriptorFault::MissingAttribute {
                    element: node.tag_name().name().to_string(),
                    attribute: attribute.to_string(),
                },
            )),
        }
    }

    fn version_attribute(&self, node: Node, attribute: &str) -> PluginResult<Version> {
        let value = self.required_attribute(node, attribute)?;
        Version::parse(&value).map_err(|e| {
            self.fault(
                node,
                DescriptorFault::InvalidAttribute {
                    attribute: attribute.to_string(),
                    value: value.clone(),
                    reason: e.to_string(),
                },
            )
        })
    }

    fn bool_attribute(&self, node: Node, attribute: &str) -> PluginResult<bool> {
        match node.attribute(attribute).map(str::trim) {
            None => Ok(false),
            Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
            Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
            Some(value) => Err(self.fault(
                node,
                DescriptorFault::InvalidAttribute {
                    attribute: attribute.to_string(),
                    value: value.to_string(),
                    reason: "expected 'true' or 'false'".to_string(),
                },
            )),
        }
    }

    fn fault(&self, node: Node, fault: DescriptorFault) -> PluginError {
        let pos = self.document.text_pos_at(node.range().start);
        PluginError::MalformedDescriptor {
            path: self.path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            fault,
        }
    }
}
