use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::CogError;
use crate::CogResult;
use crate::render::Context;

/// Nesting limit applied when a configuration does not set `max_depth`.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Environment variable consulted when `remove_markers` is left unset.
/// Marker removal is enabled only when it holds exactly `"1"`.
pub const REMOVE_MARKERS_ENV: &str = "COGMARK_REMOVE_MARKERS";

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["cogmark.toml", ".cogmark.toml", ".config/cogmark.toml"];

/// The two marker families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
	/// Markers whose header is rendered to produce the body.
	Generation,
	/// Markers whose body is user content preserved across regeneration.
	Edit,
}

impl fmt::Display for Family {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Generation => f.write_str("generation"),
			Self::Edit => f.write_str("edit"),
		}
	}
}

/// Constraint on how many lines a marker header may span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderRule {
	#[default]
	Any,
	Inline,
	Multiline,
}

/// The tokens delimiting one marker family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSyntax {
	pub open: String,
	pub close: String,
	/// Header text identifying an end marker.
	pub end: String,
	/// When true, text before the open token on its line counts as
	/// indentation. Otherwise the body column stops at the start of that text.
	pub as_comment: bool,
	pub header: HeaderRule,
}

impl MarkerSyntax {
	/// `[[[ … ]]]` generation markers.
	pub fn generation() -> Self {
		Self {
			open: "[[[".into(),
			close: "]]]".into(),
			end: "end".into(),
			as_comment: false,
			header: HeaderRule::Any,
		}
	}

	/// `<<[ … ]>>` edit markers. Their headers name the edit and must fit on
	/// one line.
	pub fn edit() -> Self {
		Self {
			open: "<<[".into(),
			close: "]>>".into(),
			end: "end".into(),
			as_comment: false,
			header: HeaderRule::Inline,
		}
	}

	/// `"{open} {text} {close}"`, as quoted in diagnostics.
	pub fn quote(&self, text: &str) -> String {
		format!("{} {text} {}", self.open, self.close)
	}

	fn validate(&self, family: Family) -> CogResult<()> {
		for (name, token) in [("open", &self.open), ("close", &self.close), ("end", &self.end)] {
			if token.is_empty() {
				return Err(CogError::InvalidSettings(format!(
					"{family} marker `{name}` token is empty"
				)));
			}
		}
		Ok(())
	}
}

/// How a template is turned into output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	/// Only generation marker headers are rendered.
	#[default]
	Directive,
	/// The whole document is rendered first, then generated.
	Document,
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Directive => f.write_str("directive"),
			Self::Document => f.write_str("document"),
		}
	}
}

/// Everything the parser and generator need besides the text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub generation: MarkerSyntax,
	pub edit: MarkerSyntax,
	/// `None` defers to [`REMOVE_MARKERS_ENV`].
	pub remove_markers: Option<bool>,
	/// How many times generated text may be evaluated again in one chain.
	/// The text at the top level is depth 0, and each rendered header whose
	/// output is evaluated adds one, so `max_depth` nested evaluations
	/// succeed and the next one fails with [`CogError::TooDeeplyNested`].
	pub max_depth: usize,
	/// Newline written to output files. `None` keeps the line ending of the
	/// template file, `\n` when it has none.
	pub newline: Option<String>,
	/// Directories searched by `{% include %}` and friends.
	pub template_dirs: Vec<PathBuf>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			generation: MarkerSyntax::generation(),
			edit: MarkerSyntax::edit(),
			remove_markers: None,
			max_depth: DEFAULT_MAX_DEPTH,
			newline: None,
			template_dirs: Vec::new(),
		}
	}
}

impl Settings {
	pub fn syntax(&self, family: Family) -> &MarkerSyntax {
		match family {
			Family::Generation => &self.generation,
			Family::Edit => &self.edit,
		}
	}

	/// Whether markers are stripped from the output, resolving an unset
	/// value from the environment.
	pub fn remove_markers(&self) -> bool {
		self.remove_markers.unwrap_or_else(|| {
			std::env::var(REMOVE_MARKERS_ENV).is_ok_and(|value| value == "1")
		})
	}

	pub fn validate(&self) -> CogResult<()> {
		self.generation.validate(Family::Generation)?;
		self.edit.validate(Family::Edit)
	}
}

/// Partial `[generation]` or `[edit]` table. Unset keys keep the family
/// defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SyntaxConfig {
	pub open: Option<String>,
	pub close: Option<String>,
	pub end: Option<String>,
	pub as_comment: Option<bool>,
	pub header: Option<HeaderRule>,
}

impl SyntaxConfig {
	fn apply(&self, base: MarkerSyntax) -> MarkerSyntax {
		MarkerSyntax {
			open: self.open.clone().unwrap_or(base.open),
			close: self.close.clone().unwrap_or(base.close),
			end: self.end.clone().unwrap_or(base.end),
			as_comment: self.as_comment.unwrap_or(base.as_comment),
			header: self.header.unwrap_or(base.header),
		}
	}
}

/// Configuration for template search paths.
#[derive(Debug, Default, Deserialize)]
pub struct TemplatesConfig {
	/// Directories searched by template includes, relative to the project
	/// root.
	#[serde(default)]
	pub paths: Vec<PathBuf>,
}

/// Contents of a `cogmark.toml` file.
///
/// ```toml
/// remove_markers = false
/// max_depth = 50
/// newline = "\r\n"
/// mode = "document"
///
/// [generation]
/// open = "[[["
/// close = "]]]"
///
/// [edit]
/// open = "<<["
///
/// [templates]
/// paths = ["templates"]
///
/// [context]
/// project = "cogmark"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct CogConfig {
	#[serde(default)]
	pub generation: SyntaxConfig,
	#[serde(default)]
	pub edit: SyntaxConfig,
	#[serde(default)]
	pub remove_markers: Option<bool>,
	#[serde(default)]
	pub max_depth: Option<usize>,
	#[serde(default)]
	pub newline: Option<String>,
	#[serde(default)]
	pub mode: Option<Mode>,
	#[serde(default)]
	pub templates: TemplatesConfig,
	/// Values exposed to every template render.
	#[serde(default)]
	pub context: toml::Table,
}

impl CogConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> CogResult<Option<CogConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		tracing::debug!(path = %config_path.display(), "loading config");
		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::from_toml(&content)?;

		Ok(Some(config))
	}

	pub fn from_toml(content: &str) -> CogResult<CogConfig> {
		toml::from_str(content).map_err(|e| CogError::ConfigParse(e.to_string()))
	}

	/// Resolve into [`Settings`], anchoring template paths at `root`.
	pub fn settings(&self, root: &Path) -> Settings {
		Settings {
			generation: self.generation.apply(MarkerSyntax::generation()),
			edit: self.edit.apply(MarkerSyntax::edit()),
			remove_markers: self.remove_markers,
			max_depth: self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
			newline: self.newline.clone(),
			template_dirs: self.templates.paths.iter().map(|path| root.join(path)).collect(),
		}
	}

	/// The `[context]` table as template context.
	pub fn context(&self) -> CogResult<Context> {
		self.context
			.iter()
			.map(|(key, value)| Ok((key.clone(), toml_to_json(value)?)))
			.collect()
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`.
fn toml_to_json(value: &toml::Value) -> CogResult<serde_json::Value> {
	let json = match value {
		toml::Value::String(s) => serde_json::Value::String(s.clone()),
		toml::Value::Integer(i) => serde_json::Value::Number((*i).into()),
		toml::Value::Float(f) => {
			serde_json::Value::Number(serde_json::Number::from_f64(*f).ok_or_else(|| {
				CogError::ConfigParse(format!("context value `{f}` is not a finite number"))
			})?)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(*b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(items) => {
			serde_json::Value::Array(items.iter().map(toml_to_json).collect::<CogResult<_>>()?)
		}
		toml::Value::Table(table) => {
			serde_json::Value::Object(
				table
					.iter()
					.map(|(key, value)| Ok((key.clone(), toml_to_json(value)?)))
					.collect::<CogResult<_>>()?,
			)
		}
	};

	Ok(json)
}
