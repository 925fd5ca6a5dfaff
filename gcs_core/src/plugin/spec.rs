//! Plugin specs

use super::instance::PluginInstance;
use super::state::PluginState;
use crate::descriptor::PluginDescriptor;
use crate::error::{PluginError, PluginResult};
use semver::Version;
use std::path::{Path, PathBuf};

/// One discovered plugin: descriptor, lifecycle state and live instance
#[derive(Debug)]
pub struct PluginSpec {
    descriptor: PluginDescriptor,
    descriptor_path: PathBuf,
    index: usize,
    state: PluginState,
    enabled: bool,
    error: Option<PluginError>,
    arguments: Vec<(String, String)>,
    instance: Option<PluginInstance>,
}

impl PluginSpec {
    /// Spec for a successfully parsed descriptor, in state `Read`
    ///
    /// Experimental plugins start disabled.
    pub fn new(descriptor: PluginDescriptor, descriptor_path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: !descriptor.experimental,
            descriptor,
            descriptor_path: descriptor_path.into(),
            index: 0,
            state: PluginState::Read,
            error: None,
            arguments: Vec::new(),
            instance: None,
        }
    }

    /// Placeholder for a descriptor that could not be read
    ///
    /// Named after the file stem so it stays listable.
    pub fn invalid(descriptor_path: impl Into<PathBuf>, error: PluginError) -> Self {
        let descriptor_path = descriptor_path.into();
        let name = descriptor_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut spec = Self::new(
            PluginDescriptor::new(name, Version::new(0, 0, 0)),
            descriptor_path,
        );
        spec.fail(error);
        spec
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &Version {
        &self.descriptor.version
    }

    pub fn descriptor_path(&self) -> &Path {
        &self.descriptor_path
    }

    /// Position in discovery order
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_experimental(&self) -> bool {
        self.descriptor.experimental
    }

    pub fn error(&self) -> Option<&PluginError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Options routed to this plugin from the command line
    pub fn arguments(&self) -> &[(String, String)] {
        &self.arguments
    }

    pub fn instance(&self) -> Option<&PluginInstance> {
        self.instance.as_ref()
    }

    /// Library implementing the plugin
    ///
    /// Relative paths resolve against the descriptor's directory; without a
    /// `<library>` element the platform file name is derived from the plugin
    /// name (`libwelcome.so`, `welcome.dll`, ...).
    pub fn library_path(&self) -> PathBuf {
        let directory = self.descriptor_path.parent().unwrap_or(Path::new(""));
        match &self.descriptor.library {
            Some(library) if library.is_absolute() => library.clone(),
            Some(library) => directory.join(library),
            None => directory.join(libloading::library_filename(
                self.descriptor.name.to_lowercase(),
            )),
        }
    }

    /// Step to `to`, which must directly follow the current state
    pub(crate) fn advance(&mut self, to: PluginState) -> PluginResult<()> {
        if !self.state.can_advance_to(to) {
            return Err(self.transition_error(to));
        }
        self.state = to;
        Ok(())
    }

    pub(crate) fn transition_error(&self, to: PluginState) -> PluginError {
        PluginError::InvalidStateTransition {
            plugin: self.descriptor.name.clone(),
            from: self.state,
            to,
        }
    }

    /// Move to `Invalid`; the first recorded error is kept
    pub(crate) fn fail(&mut self, error: PluginError) {
        self.state = PluginState::Invalid;
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn push_argument(&mut self, name: String, value: String) {
        self.arguments.push((name, value));
    }

    pub(crate) fn set_instance(&mut self, instance: PluginInstance) {
        self.instance = Some(instance);
    }

    pub(crate) fn instance_mut(&mut self) -> Option<&mut PluginInstance> {
        self.instance.as_mut()
    }

    pub(crate) fn take_instance(&mut self) -> Option<PluginInstance> {
        self.instance.take()
    }
}
