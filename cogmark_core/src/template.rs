use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use crate::CogResult;
use crate::Edits;
use crate::Generator;
use crate::Mode;
use crate::ParseResult;
use crate::Settings;
use crate::edit_blocks_from_str;
use crate::parse;
use crate::render::Context;
use crate::render::Renderer;

/// What [`write_if_changed`] did to the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
	Created,
	Changed,
	Unchanged,
}

impl WriteStatus {
	/// Fixed-width label used in render summaries.
	pub fn label(self) -> &'static str {
		match self {
			Self::Created => "  new  ",
			Self::Changed => "changed",
			Self::Unchanged => "-------",
		}
	}
}

impl fmt::Display for WriteStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// `text` with every `\r\n` turned into `\n`.
pub fn normalize_newlines(text: &str) -> String {
	text.replace("\r\n", "\n")
}

/// `content` with every `\n` written as `newline`, when one is given.
fn with_newline<'a>(content: &'a str, newline: Option<&str>) -> Cow<'a, str> {
	match newline {
		Some(newline) if newline != "\n" => Cow::Owned(content.replace('\n', newline)),
		_ => Cow::Borrowed(content),
	}
}

/// What writing `content` to `path` would do, without touching the file.
/// The file is unchanged only when it holds exactly these bytes.
pub fn file_status(path: &Path, content: &str) -> CogResult<WriteStatus> {
	match std::fs::read(path) {
		Ok(existing) if existing == content.as_bytes() => Ok(WriteStatus::Unchanged),
		Ok(_) => Ok(WriteStatus::Changed),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(WriteStatus::Created),
		Err(e) => Err(e.into()),
	}
}

/// Write `content` to `path` unless the file already holds it.
///
/// Every `\n` in `content` is written as `newline` when one is given.
pub fn write_if_changed(path: &Path, content: &str, newline: Option<&str>) -> CogResult<WriteStatus> {
	let content = with_newline(content, newline);
	let status = file_status(path, &content)?;

	if status != WriteStatus::Unchanged {
		std::fs::write(path, content.as_bytes())?;
	}

	tracing::debug!(path = %path.display(), status = ?status, "wrote output");
	Ok(status)
}

/// Result of [`Template::render_file`] and [`Template::preview_file`].
#[derive(Debug, Clone)]
pub struct RenderedFile {
	pub path: PathBuf,
	pub content: String,
	pub status: WriteStatus,
}

/// A parsed template together with the settings and mode it is generated
/// with.
///
/// Sources are parsed with `\r\n` normalized to `\n`. A template read with
/// `\r\n` line endings writes them back unless [`Settings::newline`] says
/// otherwise.
#[derive(Debug, Clone)]
pub struct Template {
	parsed: ParseResult,
	settings: Settings,
	mode: Mode,
	input: Option<PathBuf>,
	line_ending: Option<&'static str>,
}

impl Template {
	pub fn from_str(source: &str, settings: Settings, mode: Mode) -> CogResult<Self> {
		let line_ending = source.contains("\r\n").then_some("\r\n");
		let parsed = parse(&normalize_newlines(source), &settings)?;
		Ok(Self {
			parsed,
			settings,
			mode,
			input: None,
			line_ending,
		})
	}

	pub fn from_file(path: impl AsRef<Path>, settings: Settings, mode: Mode) -> CogResult<Self> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path)?;
		let mut template = Self::from_str(&source, settings, mode)?;
		template.input = Some(path.to_path_buf());
		Ok(template)
	}

	pub fn parsed(&self) -> &ParseResult {
		&self.parsed
	}

	/// Mutable access to the template's own edit blocks, for setting bodies
	/// or allowing code loss before rendering.
	pub fn parsed_mut(&mut self) -> &mut ParseResult {
		&mut self.parsed
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn mode(&self) -> Mode {
		self.mode
	}

	pub fn input(&self) -> Option<&Path> {
		self.input.as_deref()
	}

	/// Line ending written to output files: [`Settings::newline`], else the
	/// one the source was read with.
	pub fn newline(&self) -> Option<&str> {
		self.settings.newline.as_deref().or(self.line_ending)
	}

	/// Render to a string. Edit bodies found in `previous_output` are
	/// reinserted in place of the template's own.
	pub fn render(
		&self,
		renderer: &dyn Renderer,
		context: &Context,
		previous_output: Option<&str>,
	) -> CogResult<String> {
		let edits = match previous_output {
			Some(previous) => {
				Edits::recovered(edit_blocks_from_str(&normalize_newlines(previous), &self.settings)?)
			}
			None => Edits::default(),
		};
		self.render_with(renderer, context, &edits, None)
	}

	/// Render with explicit edits and marker removal.
	pub fn render_with(
		&self,
		renderer: &dyn Renderer,
		context: &Context,
		edits: &Edits,
		remove_markers: Option<bool>,
	) -> CogResult<String> {
		Generator::new(renderer, &self.settings)
			.mode(self.mode)
			.remove_markers(remove_markers)
			.generate(&self.parsed, edits, context)
	}

	/// Render into `output`, defaulting to the input file, recovering edits
	/// from the current content of `output` first.
	pub fn render_file(
		&self,
		renderer: &dyn Renderer,
		context: &Context,
		output: Option<&Path>,
		remove_markers: Option<bool>,
	) -> CogResult<RenderedFile> {
		let mut rendered = self.preview_file(renderer, context, output, remove_markers)?;
		rendered.status = write_if_changed(&rendered.path, &rendered.content, self.newline())?;
		Ok(rendered)
	}

	/// Like [`Template::render_file`] but leaves the output untouched. The
	/// status tells what writing would do. The content always uses `\n`.
	pub fn preview_file(
		&self,
		renderer: &dyn Renderer,
		context: &Context,
		output: Option<&Path>,
		remove_markers: Option<bool>,
	) -> CogResult<RenderedFile> {
		let Some(path) = output.or(self.input.as_deref()) else {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidInput,
				"no output path given for a template without an input file",
			)
			.into());
		};

		let edits = if !path.is_file() || self.is_input(path) {
			Edits::default()
		} else {
			let previous = normalize_newlines(&std::fs::read_to_string(path)?);
			Edits::recovered(edit_blocks_from_str(&previous, &self.settings)?)
		};

		let content = self.render_with(renderer, context, &edits, remove_markers)?;
		let status = file_status(path, &with_newline(&content, self.newline()))?;

		Ok(RenderedFile {
			path: path.to_path_buf(),
			content,
			status,
		})
	}

	fn is_input(&self, path: &Path) -> bool {
		let Some(input) = &self.input else {
			return false;
		};
		match (input.canonicalize(), path.canonicalize()) {
			(Ok(input), Ok(path)) => input == path,
			_ => false,
		}
	}
}
