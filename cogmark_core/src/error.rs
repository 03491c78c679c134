use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::position::LineIndex;
use crate::position::format_text;
use crate::render::TemplateError;

/// A point inside the text an error was raised against, together with the
/// excerpt used to draw the caret line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
	/// 1-indexed line number.
	pub line: usize,
	/// 1-indexed column, counted in characters.
	pub column: usize,
	/// The offending line followed by a visible `\n` or `\0` terminator.
	pub excerpt: String,
	/// Number of carets drawn under the excerpt.
	pub width: usize,
}

impl Location {
	pub fn new(text: &str, offset: usize, width: usize) -> Self {
		let index = LineIndex::new(text);
		let offset = offset as isize;
		let (line, column) = index.coordinates(offset);
		let (content, terminated) = index.line_at(offset);
		let excerpt = format!("{content}{}", if terminated { "\\n" } else { "\\0" });

		Self {
			line,
			column,
			excerpt,
			width,
		}
	}
}

impl fmt::Display for Location {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}\n{}{} line {}, column {}",
			self.excerpt,
			" ".repeat(self.column.saturating_sub(1)),
			"^".repeat(self.width),
			self.line,
			self.column
		)
	}
}

/// What the generator was doing with a marker when a nested error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
	/// Rendering and evaluating a generation marker header.
	Generation,
	/// Re-inserting the body of an edit marker.
	Reinsertion,
}

impl fmt::Display for FrameAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Generation => f.write_str("generation"),
			Self::Reinsertion => f.write_str("reinsertion"),
		}
	}
}

/// One level of the generation trace attached to a nested error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFrame {
	pub action: FrameAction,
	/// Marker text, already shortened with [`format_text`].
	pub marker: String,
	pub line: usize,
	pub column: usize,
}

impl ContextFrame {
	pub fn new(action: FrameAction, open: &str, header: &str, close: &str, at: &Location) -> Self {
		Self {
			action,
			marker: format!("{open} {} {close}", format_text(header, 50)),
			line: at.line,
			column: at.column,
		}
	}
}

impl fmt::Display for ContextFrame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"During {} of \"{}\" at line {}, column {}",
			self.action, self.marker, self.line, self.column
		)
	}
}

/// Coarse classification of a [`CogError`], stable across nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	OpenMarkerNotFound,
	CloseMarkerNotFound,
	EndMarkerNotFound,
	HeaderMustBeInline,
	HeaderMustBeMultiline,
	WrongHeaderIndentation,
	RequireNewline,
	RequireInline,
	WrongInclusion,
	DuplicateEdit,
	DirectlyEnclosedEdit,
	BodyMustBeInline,
	NonGeneratedEdit,
	AlreadyGeneratedEdit,
	TooDeeplyNested,
	Template,
	InvalidSettings,
	ConfigParse,
	Io,
}

impl ErrorKind {
	/// Errors raised while parsing marker structure.
	pub fn is_parsing(self) -> bool {
		matches!(
			self,
			Self::OpenMarkerNotFound
				| Self::CloseMarkerNotFound
				| Self::EndMarkerNotFound
				| Self::HeaderMustBeInline
				| Self::HeaderMustBeMultiline
				| Self::WrongHeaderIndentation
				| Self::RequireNewline
				| Self::RequireInline
				| Self::WrongInclusion
				| Self::DuplicateEdit
				| Self::DirectlyEnclosedEdit
		)
	}

	/// Errors raised while generating output.
	pub fn is_generation(self) -> bool {
		matches!(
			self,
			Self::BodyMustBeInline
				| Self::NonGeneratedEdit
				| Self::AlreadyGeneratedEdit
				| Self::TooDeeplyNested
		)
	}
}

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum CogError {
	#[error(transparent)]
	#[diagnostic(code(cogmark::io_error))]
	Io(#[from] std::io::Error),

	#[error("couldn't find corresponding open marker \"{marker}\":\n{at}")]
	#[diagnostic(
		code(cogmark::open_marker_not_found),
		help("remove the stray end marker or add the open marker it belongs to")
	)]
	OpenMarkerNotFound { marker: String, at: Location },

	#[error("couldn't find corresponding close marker \"{close}\":\n{at}")]
	#[diagnostic(code(cogmark::close_marker_not_found))]
	CloseMarkerNotFound { close: String, at: Location },

	#[error("couldn't find corresponding end marker \"{marker}\":\n{at}")]
	#[diagnostic(
		code(cogmark::end_marker_not_found),
		help("add `{marker}` after the marker body")
	)]
	EndMarkerNotFound { marker: String, at: Location },

	#[error("marker can't have a multiline header:\n{at}")]
	#[diagnostic(code(cogmark::header_must_be_inline))]
	HeaderMustBeInline { at: Location },

	#[error("marker can't have a one line header:\n{at}")]
	#[diagnostic(code(cogmark::header_must_be_multiline))]
	HeaderMustBeMultiline { at: Location },

	#[error("wrong marker header indentation:\n{at}")]
	#[diagnostic(
		code(cogmark::wrong_header_indentation),
		help("continuation lines must repeat the indentation and comment prefix of the first header line")
	)]
	WrongHeaderIndentation { at: Location },

	#[error("marker can't start on same line as previous end marker:\n{at}")]
	#[diagnostic(code(cogmark::require_newline))]
	RequireNewline { at: Location },

	#[error("marker must start on same line as previous marker:\n{at}")]
	#[diagnostic(code(cogmark::require_inline))]
	RequireInline { at: Location },

	#[error("marker has wrong inclusion regarding enclosing markers:\n{at}")]
	#[diagnostic(code(cogmark::wrong_inclusion))]
	WrongInclusion { at: Location },

	#[error("duplicate edit marker \"{marker}\", consider reusing/removing duplicates:\n{at}")]
	#[diagnostic(code(cogmark::duplicate_edit))]
	DuplicateEdit { marker: String, at: Location },

	#[error("directly enclosed edit marker \"{marker}\", probably missing \"{end_marker}\":\n{at}")]
	#[diagnostic(code(cogmark::directly_enclosed_edit))]
	DirectlyEnclosedEdit {
		marker: String,
		end_marker: String,
		at: Location,
	},

	#[error("generated body must contain only one line to be inlined:\n{at}")]
	#[diagnostic(code(cogmark::body_must_be_inline))]
	BodyMustBeInline { at: Location },

	#[error("non-generated edit marker \"{marker}\", consider reusing/removing it:\n{at}")]
	#[diagnostic(
		code(cogmark::non_generated_edit),
		help("the edited code would be lost; regenerate this edit marker or delete it")
	)]
	NonGeneratedEdit { marker: String, at: Location },

	#[error("already generated edit marker \"{marker}\", consider fixing generation:\n{at}")]
	#[diagnostic(code(cogmark::already_generated_edit))]
	AlreadyGeneratedEdit { marker: String, at: Location },

	#[error("markers are nested more than {limit} levels deep:\n{at}")]
	#[diagnostic(
		code(cogmark::too_deeply_nested),
		help("a generation header probably reproduces itself; raise `max_depth` if the nesting is intended")
	)]
	TooDeeplyNested { limit: usize, at: Location },

	#[error("template rendering failed: {0}")]
	#[diagnostic(code(cogmark::template))]
	Template(#[from] TemplateError),

	#[error("{}{source}", render_frames(frames))]
	#[diagnostic(code(cogmark::nested))]
	Nested {
		/// Outermost frame first.
		frames: Vec<ContextFrame>,
		source: Box<CogError>,
	},

	#[error("invalid settings: {0}")]
	#[diagnostic(
		code(cogmark::invalid_settings),
		help("marker open, close and end tokens must be non-empty")
	)]
	InvalidSettings(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(cogmark::config_parse),
		help("check that cogmark.toml is valid TOML with [generation], [edit], [templates] and/or [context] sections")
	)]
	ConfigParse(String),
}

fn render_frames(frames: &[ContextFrame]) -> String {
	frames.iter().fold(String::new(), |mut output, frame| {
		output.push_str("  ");
		output.push_str(&frame.to_string());
		output.push('\n');
		output
	})
}

impl CogError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Io(_) => ErrorKind::Io,
			Self::OpenMarkerNotFound { .. } => ErrorKind::OpenMarkerNotFound,
			Self::CloseMarkerNotFound { .. } => ErrorKind::CloseMarkerNotFound,
			Self::EndMarkerNotFound { .. } => ErrorKind::EndMarkerNotFound,
			Self::HeaderMustBeInline { .. } => ErrorKind::HeaderMustBeInline,
			Self::HeaderMustBeMultiline { .. } => ErrorKind::HeaderMustBeMultiline,
			Self::WrongHeaderIndentation { .. } => ErrorKind::WrongHeaderIndentation,
			Self::RequireNewline { .. } => ErrorKind::RequireNewline,
			Self::RequireInline { .. } => ErrorKind::RequireInline,
			Self::WrongInclusion { .. } => ErrorKind::WrongInclusion,
			Self::DuplicateEdit { .. } => ErrorKind::DuplicateEdit,
			Self::DirectlyEnclosedEdit { .. } => ErrorKind::DirectlyEnclosedEdit,
			Self::BodyMustBeInline { .. } => ErrorKind::BodyMustBeInline,
			Self::NonGeneratedEdit { .. } => ErrorKind::NonGeneratedEdit,
			Self::AlreadyGeneratedEdit { .. } => ErrorKind::AlreadyGeneratedEdit,
			Self::TooDeeplyNested { .. } => ErrorKind::TooDeeplyNested,
			Self::Template(_) => ErrorKind::Template,
			Self::Nested { source, .. } => source.kind(),
			Self::InvalidSettings(_) => ErrorKind::InvalidSettings,
			Self::ConfigParse(_) => ErrorKind::ConfigParse,
		}
	}

	/// The location of the innermost error, if it points into a text.
	pub fn location(&self) -> Option<&Location> {
		match self {
			Self::OpenMarkerNotFound { at, .. }
			| Self::CloseMarkerNotFound { at, .. }
			| Self::EndMarkerNotFound { at, .. }
			| Self::HeaderMustBeInline { at }
			| Self::HeaderMustBeMultiline { at }
			| Self::WrongHeaderIndentation { at }
			| Self::RequireNewline { at }
			| Self::RequireInline { at }
			| Self::WrongInclusion { at }
			| Self::DuplicateEdit { at, .. }
			| Self::DirectlyEnclosedEdit { at, .. }
			| Self::BodyMustBeInline { at }
			| Self::NonGeneratedEdit { at, .. }
			| Self::AlreadyGeneratedEdit { at, .. }
			| Self::TooDeeplyNested { at, .. } => Some(at),
			Self::Nested { source, .. } => source.location(),
			Self::Io(_) | Self::Template(_) | Self::InvalidSettings(_) | Self::ConfigParse(_) => None,
		}
	}

	/// The generation trace, outermost frame first. Empty for errors raised at
	/// the top level.
	pub fn frames(&self) -> &[ContextFrame] {
		match self {
			Self::Nested { frames, .. } => frames,
			_ => &[],
		}
	}

	/// The error underneath every context frame.
	pub fn root(&self) -> &CogError {
		match self {
			Self::Nested { source, .. } => source.root(),
			other => other,
		}
	}

	/// Wrap this error in an enclosing generation frame. Frames accumulate on
	/// a single `Nested` value rather than nesting `Nested` inside itself.
	#[must_use]
	pub fn within(self, frame: ContextFrame) -> Self {
		match self {
			Self::Nested { mut frames, source } => {
				frames.insert(0, frame);
				Self::Nested { frames, source }
			}
			other => {
				Self::Nested {
					frames: vec![frame],
					source: Box::new(other),
				}
			}
		}
	}
}

pub type CogResult<T> = Result<T, CogError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
