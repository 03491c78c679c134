use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::CogError;
use crate::CogResult;
use crate::Family;
use crate::Marker;
use crate::Settings;
use crate::scanner::find_byte;
use crate::scanner::find_marker;
use crate::scanner::rfind_byte;
use crate::validator::check_markers;

/// The outcome of parsing one text: every marker in source order plus the
/// blocks formed by each open/end pair.
#[derive(Debug, Clone)]
pub struct ParseResult {
	source: Arc<str>,
	/// Open and end markers of both families, sorted by position.
	pub markers: Vec<Arc<Marker>>,
	pub generation_blocks: Vec<GenerationBlock>,
	/// Edit blocks keyed by their trimmed header.
	pub edit_blocks: HashMap<String, EditBlock>,
}

impl ParseResult {
	pub fn source(&self) -> &str {
		&self.source
	}

	/// All blocks in source order of their open markers.
	pub fn blocks(&self) -> Vec<BlockRef<'_>> {
		let mut generation = self.generation_blocks.iter();
		self
			.markers
			.iter()
			.filter(|marker| !marker.is_end)
			.filter_map(|marker| {
				match marker.family {
					Family::Generation => generation.next().map(BlockRef::Generation),
					Family::Edit => self.edit_blocks.get(marker.name()).map(BlockRef::Edit),
				}
			})
			.collect()
	}

	/// Edit names mapped to their current bodies. Edits without a body are
	/// left out.
	pub fn edits(&self) -> HashMap<String, String> {
		self
			.edit_blocks
			.iter()
			.filter_map(|(name, block)| block.body().map(|body| (name.clone(), body.to_owned())))
			.collect()
	}
}

/// Borrowed view of either kind of block.
#[derive(Debug, Clone, Copy)]
pub enum BlockRef<'a> {
	Generation(&'a GenerationBlock),
	Edit(&'a EditBlock),
}

impl BlockRef<'_> {
	pub fn open(&self) -> &Marker {
		match self {
			Self::Generation(block) => block.open(),
			Self::Edit(block) => block.open(),
		}
	}

	pub fn header(&self) -> &str {
		self.open().name()
	}
}

/// A generation marker pair.
#[derive(Debug, Clone)]
pub struct GenerationBlock {
	open: Arc<Marker>,
	end: Arc<Marker>,
}

impl GenerationBlock {
	pub fn open(&self) -> &Marker {
		&self.open
	}

	pub fn end(&self) -> &Marker {
		&self.end
	}

	pub fn header(&self) -> &str {
		self.open.name()
	}

	pub fn raw_header(&self) -> &str {
		&self.open.header
	}

	pub fn raw_body(&self) -> &str {
		&self.open.body
	}

	/// The previously generated content, dedented.
	pub fn body(&self) -> Option<&str> {
		self.open.body_dedented()
	}

	/// Source text of the whole block; see [`block_code`].
	pub fn code(&self, additional_lines: (usize, usize)) -> &str {
		block_code(&self.open, &self.end, additional_lines)
	}
}

/// An edit marker pair whose body is user content.
#[derive(Debug, Clone)]
pub struct EditBlock {
	open: Arc<Marker>,
	end: Arc<Marker>,
	body: Option<String>,
	/// Skip the lost-code check for this edit when it is never regenerated.
	pub allow_code_loss: bool,
}

impl EditBlock {
	pub fn open(&self) -> &Marker {
		&self.open
	}

	pub fn end(&self) -> &Marker {
		&self.end
	}

	pub fn name(&self) -> &str {
		self.open.name()
	}

	pub fn raw_body(&self) -> &str {
		&self.open.body
	}

	/// The replacement body if one was set, otherwise the dedented body found
	/// in the source.
	pub fn body(&self) -> Option<&str> {
		self.body.as_deref().or_else(|| self.open.body_dedented())
	}

	/// Replace the body reinserted at generation time.
	pub fn set_body(&mut self, body: impl Into<String>) {
		self.body = Some(body.into());
	}

	/// Source text of the whole block; see [`block_code`].
	pub fn code(&self, additional_lines: (usize, usize)) -> &str {
		block_code(&self.open, &self.end, additional_lines)
	}
}

/// Source text from an open marker to the end of its end marker, widened to
/// whole lines for inline pairs and by `additional_lines` (before, after)
/// lines of context. A single trailing newline is dropped.
fn block_code<'a>(open: &'a Marker, end: &Marker, additional_lines: (usize, usize)) -> &'a str {
	let text = open.source();
	let mut start = open.header_start;
	let mut stop = end.header_end;

	if open.body_inline {
		start = rfind_byte(text, b'\n', 0, start).map_or(0, |i| i + 1);
		stop = find_byte(text, b'\n', stop, text.len()).map_or(text.len(), |i| i + 1);
	}

	for _ in 0..additional_lines.0 {
		if start == 0 {
			break;
		}
		start = rfind_byte(text, b'\n', 0, start - 1).map_or(0, |i| i + 1);
	}
	for _ in 0..additional_lines.1 {
		if stop >= text.len() {
			break;
		}
		stop = find_byte(text, b'\n', stop + 1, text.len()).unwrap_or(text.len());
	}

	if stop > 0 && text.as_bytes()[stop - 1] == b'\n' {
		stop -= 1;
	}
	crate::scanner::span(text, start, stop)
}

/// Parse `source` into markers and blocks.
///
/// Generation markers are found first over the whole text. Edit markers are
/// then searched only outside generation marker headers, so edit markers
/// written inside a header belong to the generated text rather than to this
/// document.
#[tracing::instrument(level = "trace", skip_all, fields(len = source.len()))]
pub fn parse(source: &str, settings: &Settings) -> CogResult<ParseResult> {
	settings.validate()?;
	let source: Arc<str> = Arc::from(source);
	let len = source.len();

	let mut markers = Vec::new();
	let mut idx = 0;
	while let Some((marker, next)) =
		find_marker(&source, Family::Generation, &settings.generation, idx, len)?
	{
		markers.push(marker);
		idx = next;
	}

	let mut sections = Vec::with_capacity(markers.len() + 1);
	let mut section_start = 0;
	for marker in &markers {
		sections.push((section_start, marker.header_open));
		section_start = marker.header_close;
	}
	sections.push((section_start, len));

	for (start, stop) in sections {
		let mut idx = start;
		while let Some((marker, next)) = find_marker(&source, Family::Edit, &settings.edit, idx, stop)? {
			markers.push(marker);
			idx = next;
		}
	}

	markers.sort_by_key(|marker| marker.header_open);
	check_markers(&mut markers)?;
	let markers: Vec<Arc<Marker>> = markers.into_iter().map(Arc::new).collect();

	let mut generation_blocks = Vec::new();
	let mut edit_blocks: HashMap<String, EditBlock> = HashMap::new();
	for marker in markers.iter().filter(|marker| !marker.is_end) {
		let Some(end) = marker.dual.map(|dual| Arc::clone(&markers[dual])) else {
			continue;
		};
		let open = Arc::clone(marker);

		match marker.family {
			Family::Generation => generation_blocks.push(GenerationBlock { open, end }),
			Family::Edit => {
				let name = marker.name().to_owned();
				if edit_blocks.contains_key(&name) {
					return Err(CogError::DuplicateEdit {
						marker: marker.quoted(),
						at: marker.open_location(),
					});
				}
				edit_blocks.insert(
					name,
					EditBlock {
						open,
						end,
						body: None,
						allow_code_loss: false,
					},
				);
			}
		}
	}

	tracing::debug!(
		markers = markers.len(),
		generation_blocks = generation_blocks.len(),
		edit_blocks = edit_blocks.len(),
		"parsed markers"
	);

	Ok(ParseResult {
		source,
		markers,
		generation_blocks,
		edit_blocks,
	})
}

/// Parse `source` and return only its edit blocks.
pub fn edit_blocks_from_str(source: &str, settings: &Settings) -> CogResult<HashMap<String, EditBlock>> {
	Ok(parse(source, settings)?.edit_blocks)
}

/// Parse `source` and return its edit names mapped to their bodies.
pub fn edits_from_str(source: &str, settings: &Settings) -> CogResult<HashMap<String, String>> {
	Ok(parse(source, settings)?.edits())
}

/// Read `path` and return its edit names mapped to their bodies. A missing
/// file has no edits.
pub fn edits_from_file(path: impl AsRef<Path>, settings: &Settings) -> CogResult<HashMap<String, String>> {
	match std::fs::read_to_string(path) {
		Ok(content) => edits_from_str(&content, settings),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
		Err(e) => Err(e.into()),
	}
}
