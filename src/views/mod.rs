//! Server-side views
//!
//! Tera templates, embedded into the binary from `templates/` unless
//! `views.path` points at a directory to load instead. Page templates extend
//! `base.html`.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

use crate::config::ViewsConfig;
use crate::models::format_cents;

mod error;

pub use error::ViewError;

#[cfg(test)]
mod tests;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Renders page templates
pub struct ViewEngine {
    tera: Tera,
}

impl ViewEngine {
    /// Build the engine the configuration asks for
    pub fn from_config(config: &ViewsConfig) -> Result<Self> {
        match &config.path {
            Some(path) => {
                tracing::info!("Loading templates from {:?}", path);
                Self::from_dir(path)
            }
            None => Self::embedded(),
        }
    }

    /// Templates compiled into the binary
    pub fn embedded() -> Result<Self> {
        let mut templates = Vec::new();
        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| ViewError::TemplateError(format!("Missing embedded template {}", name)))?;
            let content = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Template {} is not UTF-8", name))?;
            templates.push((name.to_string(), content));
        }
        Self::from_templates(templates)
    }

    /// Templates read from a directory tree, named by their relative path
    pub fn from_dir(path: &Path) -> Result<Self> {
        let mut templates = Vec::new();
        collect_templates_from_dir(path, path, &mut templates)?;
        if templates.is_empty() {
            return Err(ViewError::TemplateError(format!("No templates found in {:?}", path)).into());
        }
        Self::from_templates(templates)
    }

    fn from_templates(templates: Vec<(String, String)>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        tera.register_filter("money", money_filter);
        tera.add_raw_templates(templates)
            .map_err(|e| ViewError::TemplateError(error_chain("Failed to load templates", &e)))?;
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ViewError::TemplateError(error_chain(&format!("Failed to render '{}'", template), &e))
                .into()
        })
    }

    /// Render a template, falling back to a bare error page if rendering fails
    pub fn render_or_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("{:#}", e);
                simple_error_page("Something went wrong", "We're working on fixing this, sorry for the inconvenience!")
            }
        }
    }
}

fn error_chain(prefix: &str, e: &tera::Error) -> String {
    let mut message = format!("{}: {}", prefix, e);
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read template directory: {:?}", current_path))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let name = path
                .strip_prefix(base_path)
                .map_err(|_| ViewError::TemplateError("Failed to get relative path".to_string()))?
                .to_string_lossy()
                .replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }
    Ok(())
}

/// `{{ product.price_cents | money }}` renders `1999` as `19.99`
fn money_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let cents = value
        .as_i64()
        .ok_or_else(|| tera::Error::msg(format!("money filter expects an integer, got {}", value)))?;
    Ok(Value::String(format_cents(cents)))
}

/// Minimal HTML page used when templates themselves fail
pub fn simple_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; }}
        h1 {{ color: #00695c; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>{message}</p>
    <p><a href="/">Back to the shop</a></p>
</body>
</html>"#,
        title = html_escape(title),
        message = html_escape(message)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
