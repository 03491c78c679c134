use std::collections::HashMap;

use crate::CogError;
use crate::CogResult;
use crate::ContextFrame;
use crate::EditBlock;
use crate::Family;
use crate::FrameAction;
use crate::Location;
use crate::Marker;
use crate::Mode;
use crate::ParseResult;
use crate::Settings;
use crate::edits::EditPool;
use crate::edits::Reconciler;
use crate::parse;
use crate::render::Context;
use crate::render::Renderer;
use crate::scanner::span;

/// Edit bodies supplied from outside the parsed text.
#[derive(Debug, Clone, Default)]
pub struct Edits {
	/// Bodies that win over every other source, keyed by edit name.
	pub overrides: HashMap<String, String>,
	/// Edit blocks recovered from a previously generated output. They win
	/// over the template's own edit blocks.
	pub recovered: HashMap<String, EditBlock>,
}

impl Edits {
	pub fn recovered(recovered: HashMap<String, EditBlock>) -> Self {
		Self {
			overrides: HashMap::new(),
			recovered,
		}
	}
}

/// Produces output text from a [`ParseResult`].
///
/// In [`Mode::Directive`] only generation marker headers are rendered. Each
/// rendered header is parsed and generated again, so headers may emit
/// further markers. In [`Mode::Document`] the whole text is rendered first
/// with generation markers held aside, and the result is then generated in
/// directive mode.
pub struct Generator<'a> {
	renderer: &'a dyn Renderer,
	settings: &'a Settings,
	mode: Mode,
	remove_markers: Option<bool>,
}

impl<'a> Generator<'a> {
	pub fn new(renderer: &'a dyn Renderer, settings: &'a Settings) -> Self {
		Self {
			renderer,
			settings,
			mode: Mode::Directive,
			remove_markers: None,
		}
	}

	#[must_use]
	pub fn mode(mut self, mode: Mode) -> Self {
		self.mode = mode;
		self
	}

	/// Override the removal setting for this generator. `None` defers to
	/// [`Settings::remove_markers`].
	#[must_use]
	pub fn remove_markers(mut self, remove_markers: Option<bool>) -> Self {
		self.remove_markers = remove_markers;
		self
	}

	/// Generate the output for `parsed`.
	///
	/// Fails with [`CogError::NonGeneratedEdit`] when an edit available to
	/// this generation was never reinserted, since its content would be lost.
	#[tracing::instrument(level = "debug", skip_all, fields(mode = %self.mode))]
	pub fn generate(&self, parsed: &ParseResult, edits: &Edits, context: &Context) -> CogResult<String> {
		let remove_markers = self
			.remove_markers
			.unwrap_or_else(|| self.settings.remove_markers());
		let mut run = Run {
			renderer: self.renderer,
			settings: self.settings,
			context,
			remove_markers,
			reconciler: Reconciler::new(&edits.overrides),
		};

		let mut pool = EditPool::new(&parsed.edit_blocks);
		let output = match self.mode {
			Mode::Directive => {
				pool.extend(&edits.recovered);
				run.directive(parsed, &pool, 0)?
			}
			Mode::Document => run.document(parsed, &mut pool, &edits.recovered)?,
		};

		run.reconciler.ensure_consumed(&pool)?;
		tracing::debug!(len = output.len(), "generated output");
		Ok(output)
	}
}

/// State shared by one top-level generation and its nested evaluations.
struct Run<'a> {
	renderer: &'a dyn Renderer,
	settings: &'a Settings,
	context: &'a Context,
	remove_markers: bool,
	reconciler: Reconciler<'a>,
}

impl Run<'_> {
	fn directive(&mut self, parsed: &ParseResult, pool: &EditPool<'_>, depth: usize) -> CogResult<String> {
		let text = parsed.source();
		let mut output = String::with_capacity(text.len());
		let mut idx = 0;
		let mut nesting = 0usize;

		for marker in &parsed.markers {
			if marker.is_end {
				nesting = nesting.saturating_sub(1);
				if nesting == 0 {
					if !self.remove_markers {
						output.push_str(span(text, marker.header_start, marker.header_end));
					}
					idx = marker.header_end;
				}
				continue;
			}

			nesting += 1;
			if nesting != 1 {
				continue;
			}

			output.push_str(span(text, idx, marker.header_start));
			if !self.remove_markers {
				output.push_str(span(text, marker.header_start, marker.header_end));
			}

			let generated = self.resolve(marker, pool, depth)?;
			if marker.body_inline {
				let generated = generated.unwrap_or_default();
				if generated.contains('\n') {
					return Err(CogError::BodyMustBeInline {
						at: marker.open_location(),
					});
				}
				if self.remove_markers {
					output.push_str(&generated);
				} else {
					output.push(' ');
					output.push_str(&generated);
					output.push(' ');
				}
			} else if let Some(generated) = generated {
				let indent = marker.body_indent();
				output.push_str(indent);
				output.push_str(&generated.replace('\n', &format!("\n{indent}")));
				output.push('\n');
			}
		}

		output.push_str(span(text, idx, text.len()));
		Ok(output)
	}

	fn document<'p>(
		&mut self,
		parsed: &ParseResult,
		pool: &mut EditPool<'p>,
		recovered: &'p HashMap<String, EditBlock>,
	) -> CogResult<String> {
		let text = parsed.source();
		let mut buffer = String::with_capacity(text.len());
		let mut held: Vec<(String, usize, usize)> = Vec::new();
		let mut idx = 0;
		let mut nesting = 0usize;

		for marker in &parsed.markers {
			match (marker.family, marker.is_end) {
				(Family::Generation, false) => {
					nesting += 1;
					if nesting == 1 {
						let placeholder = format!("°#@[COGMARK_{}]+&*", held.len());
						buffer.push_str(span(text, idx, marker.header_start));
						buffer.push_str(&placeholder);
						held.push((placeholder, marker.header_start, marker.header_start));
					}
				}
				(Family::Generation, true) => {
					nesting = nesting.saturating_sub(1);
					if nesting == 0 {
						if let Some(last) = held.last_mut() {
							last.2 = marker.header_end;
						}
						idx = marker.header_end;
					}
				}
				(Family::Edit, true) => {
					if nesting == 0 {
						buffer.push_str(span(text, idx, marker.header_end));
						idx = marker.header_end;
					}
				}
				(Family::Edit, false) => {
					if nesting == 0 {
						pool.remove(marker.name());
					}
				}
			}
		}
		buffer.push_str(span(text, idx, text.len()));

		let mut rendered = self
			.renderer
			.render(&buffer, self.context)
			.map_err(CogError::from)?;
		for (placeholder, start, end) in &held {
			rendered = rendered.replacen(placeholder.as_str(), span(text, *start, *end), 1);
		}

		pool.extend(recovered);
		if rendered.is_empty() {
			return Ok(rendered);
		}
		self.evaluate(&rendered, None, pool, 0)
	}

	/// The text to place in the body of `marker`, or `None` to leave it out.
	fn resolve(&mut self, marker: &Marker, pool: &EditPool<'_>, depth: usize) -> CogResult<Option<String>> {
		let action = match marker.family {
			Family::Generation => FrameAction::Generation,
			Family::Edit => FrameAction::Reinsertion,
		};

		tracing::trace!(family = %marker.family, line = marker.open_location().line, depth, "resolving marker");
		let body = match marker.family {
			Family::Generation => {
				if marker.header_empty {
					return Ok(None);
				}
				match self.renderer.render(&marker.header, self.context) {
					Ok(rendered) => rendered,
					Err(error) => return Err(CogError::from(error).within(frame(marker, action))),
				}
			}
			Family::Edit => {
				match self.reconciler.claim(marker, pool)? {
					Some(body) => body,
					None => return Ok(None),
				}
			}
		};

		if body.is_empty() {
			return Ok(Some(body));
		}

		let mut result = self
			.evaluate(&body, Some(marker), pool, depth + 1)
			.map_err(|error| error.within(frame(marker, action)))?;
		if result.ends_with('\n') {
			result.pop();
		}

		if self.remove_markers && result.is_empty() {
			return Ok(None);
		}
		Ok(Some(result))
	}

	/// Parse `text` and generate it in directive mode. Edits of the enclosing
	/// pool win over edits found in `text`.
	fn evaluate(
		&mut self,
		text: &str,
		origin: Option<&Marker>,
		pool: &EditPool<'_>,
		depth: usize,
	) -> CogResult<String> {
		let limit = self.settings.max_depth;
		// Depth 0 is the top-level text, so `limit` nested evaluations pass.
		if depth > limit {
			let at = origin.map_or_else(|| Location::new(text, 0, 1), Marker::open_location);
			return Err(CogError::TooDeeplyNested { limit, at });
		}

		tracing::trace!(depth, len = text.len(), "evaluating generated text");
		let parsed = parse(text, self.settings)?;
		let pool = pool.beneath(&parsed.edit_blocks);
		self.directive(&parsed, &pool, depth)
	}
}

fn frame(marker: &Marker, action: FrameAction) -> ContextFrame {
	let syntax = marker.syntax();
	ContextFrame::new(
		action,
		&syntax.open,
		&marker.header,
		&syntax.close,
		&marker.open_location(),
	)
}
