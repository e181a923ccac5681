//! Secret name templating
//!
//! Token secret names are rendered per instance from a minijinja template
//! against `{instance: {namespace, name}}`, e.g.
//! `influx-{{ instance.namespace }}-{{ instance.name }}`.

use std::fmt;

use minijinja::{context, Environment, UndefinedBehavior};

use crate::crd::InstanceKey;

/// Errors that can occur while rendering a name template
#[derive(Debug)]
pub enum TemplateError {
    /// Template failed to parse or render
    Render(minijinja::Error),
    /// Template rendered to an empty string
    Empty(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Empty(template) => write!(f, "template {:?} rendered an empty name", template),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            Self::Empty(_) => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err)
    }
}

/// Renders per-instance resource names
pub struct NameRenderer {
    env: Environment<'static>,
}

impl Default for NameRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl NameRenderer {
    /// Create a renderer that rejects undefined variables
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Render `template` for the given instance
    ///
    /// Surrounding whitespace is trimmed; an empty result is an error.
    pub fn render(&self, template: &str, instance: &InstanceKey) -> Result<String, TemplateError> {
        let rendered = self.env.render_str(
            template,
            context! {
                instance => context! {
                    namespace => instance.namespace.as_str(),
                    name => instance.name.as_str(),
                },
            },
        )?;

        let rendered = rendered.trim();
        if rendered.is_empty() {
            return Err(TemplateError::Empty(template.to_string()));
        }
        Ok(rendered.to_string())
    }
}
