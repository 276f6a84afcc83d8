use minijinja::Environment;

use crate::error::RenderError;

/// Turns template text plus a data value into output text.
pub trait TemplateEngine: Send + Sync {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, RenderError>;
}

/// Jinja-style templates backed by `minijinja`.
///
/// Templates see the data value's top-level keys as variables, e.g.
/// `{% for id, files in data|items %}`.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Rendered configs are files; keep their final newline.
        env.set_keep_trailing_newline(true);
        Self { env }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        Ok(self.env.render_str(template, data)?)
    }
}
