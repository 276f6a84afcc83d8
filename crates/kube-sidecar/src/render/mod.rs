//! Rendering of the aggregated view into output text.
//!
//! Two modes are supported:
//! - Templated: the whole flattened view is rendered through one template
//!   into a single artifact.
//! - Passthrough: every entry is its own output; only the destination
//!   directory is templated, per resource.

pub mod postprocess;
pub mod template;

use serde_json::json;

use crate::aggregator::FlattenedView;
use crate::config::Config;
use crate::error::RenderError;
use crate::event::ChangeEvent;

pub use postprocess::PostProcessor;
pub use template::{MiniJinjaEngine, TemplateEngine};

pub struct Renderer {
    template: String,
    post: PostProcessor,
    engine: Box<dyn TemplateEngine>,
}

impl Renderer {
    pub fn new(
        template: impl Into<String>,
        post: PostProcessor,
        engine: Box<dyn TemplateEngine>,
    ) -> Self {
        Self {
            template: template.into(),
            post,
            engine,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, RenderError> {
        let post = PostProcessor::new(config.remove_comment, config.remove_empty_lines)?;
        Ok(Self::new(
            config.template.clone(),
            post,
            Box::new(MiniJinjaEngine::new()),
        ))
    }

    pub fn is_templated(&self) -> bool {
        !self.template.is_empty()
    }

    /// Renders the full view as the `data` variable of the template.
    pub fn render_view(&self, view: &FlattenedView) -> Result<String, RenderError> {
        let rendered = self.engine.render(&self.template, &json!({ "data": view }))?;
        Ok(self.post.apply(&rendered))
    }

    /// Computes a passthrough destination directory for one resource.
    ///
    /// The template sees `namespace`, `name` and `id`.
    pub fn render_directory(
        &self,
        directory_template: &str,
        event: &ChangeEvent,
    ) -> Result<String, RenderError> {
        let vars = json!({
            "namespace": event.namespace,
            "name": event.name(),
            "id": event.resource_id,
        });
        let directory = self.engine.render(directory_template, &vars)?;
        if directory.trim().is_empty() {
            return Err(RenderError::EmptyDirectory(directory_template.to_string()));
        }
        Ok(directory)
    }

    /// Applies the configured clean-up to a passthrough entry.
    pub fn post_process(&self, text: &str) -> String {
        self.post.apply(text)
    }
}
