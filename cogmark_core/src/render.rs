use std::collections::HashMap;
use std::fmt;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use minijinja::Environment;
use minijinja::UndefinedBehavior;

/// Values made available to templates while rendering.
pub type Context = HashMap<String, serde_json::Value>;

/// A failure reported by a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
	/// Short category, such as `syntax error` or `undefined value`.
	pub kind: String,
	pub message: String,
	/// Line inside the rendered text, when the renderer knows it.
	pub line: Option<usize>,
}

impl TemplateError {
	pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			message: message.into(),
			line: None,
		}
	}
}

impl fmt::Display for TemplateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.kind, self.message)?;
		if let Some(line) = self.line {
			write!(f, " (line {line})")?;
		}
		Ok(())
	}
}

impl std::error::Error for TemplateError {}

impl From<minijinja::Error> for TemplateError {
	fn from(error: minijinja::Error) -> Self {
		let kind = error.kind().to_string();
		let message = error.detail().map_or_else(|| kind.clone(), ToOwned::to_owned);
		Self {
			kind,
			message,
			line: error.line(),
		}
	}
}

/// Renders a template text against a context.
///
/// Any `Fn(&str, &Context) -> Result<String, TemplateError>` closure is a
/// renderer, which keeps the generator independent of a template engine.
pub trait Renderer {
	fn render(&self, source: &str, context: &Context) -> Result<String, TemplateError>;
}

impl<F> Renderer for F
where
	F: Fn(&str, &Context) -> Result<String, TemplateError>,
{
	fn render(&self, source: &str, context: &Context) -> Result<String, TemplateError> {
		self(source, context)
	}
}

/// The default [`Renderer`], backed by minijinja.
///
/// Block tags swallow their trailing newline and leading line whitespace, a
/// trailing newline in the template is preserved, and undefined variables are
/// errors.
#[derive(Debug)]
pub struct JinjaRenderer {
	env: Environment<'static>,
}

impl Default for JinjaRenderer {
	fn default() -> Self {
		Self::new()
	}
}

impl JinjaRenderer {
	pub fn new() -> Self {
		let mut env = Environment::new();
		env.set_keep_trailing_newline(true);
		env.set_trim_blocks(true);
		env.set_lstrip_blocks(true);
		env.set_undefined_behavior(UndefinedBehavior::Strict);
		Self { env }
	}

	/// A renderer that resolves `{% include %}`, `{% import %}` and
	/// `{% extends %}` names against `dirs`, first match wins.
	pub fn with_template_dirs(dirs: Vec<PathBuf>) -> Self {
		let mut renderer = Self::new();
		if !dirs.is_empty() {
			renderer
				.env
				.set_loader(move |name| load_template(&dirs, name));
		}
		renderer
	}

	/// Access the environment to register filters, functions or globals.
	pub fn environment_mut(&mut self) -> &mut Environment<'static> {
		&mut self.env
	}
}

impl Renderer for JinjaRenderer {
	fn render(&self, source: &str, context: &Context) -> Result<String, TemplateError> {
		tracing::trace!(len = source.len(), "rendering template");
		let ctx = minijinja::Value::from_serialize(context);
		Ok(self.env.render_str(source, ctx)?)
	}
}

fn load_template(dirs: &[PathBuf], name: &str) -> Result<Option<String>, minijinja::Error> {
	let relative = Path::new(name);
	if !relative
		.components()
		.all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
	{
		return Ok(None);
	}

	for dir in dirs {
		let path = dir.join(relative);
		match std::fs::read_to_string(&path) {
			Ok(content) => {
				tracing::debug!(path = %path.display(), "loaded template");
				return Ok(Some(content));
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => {
				return Err(minijinja::Error::new(
					minijinja::ErrorKind::InvalidOperation,
					format!("could not read template `{name}`"),
				)
				.with_source(e));
			}
		}
	}

	Ok(None)
}
