use std::sync::Arc;
use std::sync::OnceLock;

use crate::CogError;
use crate::CogResult;
use crate::Family;
use crate::HeaderRule;
use crate::Location;
use crate::MarkerSyntax;
use crate::body::dedent;

/// One occurrence of a marker (open or end) inside a text.
///
/// Offsets are byte offsets into [`Marker::source`]. The scanner fills in the
/// header fields; the validator adjusts the header span and fills in the body
/// fields once the marker has been paired with its dual.
#[derive(Debug, Clone)]
pub struct Marker {
	source: Arc<str>,
	syntax: MarkerSyntax,
	pub family: Family,
	/// True when the trimmed header equals the family's end token.
	pub is_end: bool,
	/// Whether a marker of the same family may appear directly inside this
	/// one.
	pub(crate) direct_enclosure: bool,

	/// Header text with indentation and one space of padding on each side
	/// removed.
	pub header: String,
	pub header_empty: bool,
	/// Column of the open token within its line.
	pub header_column: usize,
	/// Start of the span this marker occupies when the output is written.
	pub header_start: usize,
	/// End of the span this marker occupies when the output is written.
	pub header_end: usize,
	/// Offset of the open token.
	pub header_open: usize,
	/// Offset just past the close token, moved past the body padding once
	/// the body has been extracted.
	pub header_close: usize,
	/// Width of the leading whitespace and comment prefix.
	pub header_indent_column: usize,
	/// The header line prefix with every non-tab byte replaced by a space.
	header_indent: String,

	pub body_inline: bool,
	pub body_empty: bool,
	/// Column generated lines are indented to.
	pub body_column: usize,
	/// Raw body text. Only meaningful on open markers.
	pub body: String,
	body_dedented: OnceLock<Option<String>>,
	pub body_start: usize,
	pub body_end: usize,
	/// Index of the matching open/end marker in the parse result.
	pub dual: Option<usize>,
}

impl Marker {
	fn new(source: Arc<str>, family: Family, syntax: &MarkerSyntax, header_open: usize) -> Self {
		Self {
			source,
			syntax: syntax.clone(),
			family,
			is_end: false,
			direct_enclosure: family == Family::Generation,
			header: String::new(),
			header_empty: true,
			header_column: 0,
			header_start: 0,
			header_end: 0,
			header_open,
			header_close: 0,
			header_indent_column: 0,
			header_indent: String::new(),
			body_inline: false,
			body_empty: true,
			body_column: 0,
			body: String::new(),
			body_dedented: OnceLock::new(),
			body_start: 0,
			body_end: 0,
			dual: None,
		}
	}

	/// The whole text this marker was found in.
	pub fn source(&self) -> &str {
		&self.source
	}

	pub(crate) fn source_arc(&self) -> Arc<str> {
		Arc::clone(&self.source)
	}

	pub fn syntax(&self) -> &MarkerSyntax {
		&self.syntax
	}

	/// The header with surrounding whitespace removed. For edit markers this
	/// is the edit name.
	pub fn name(&self) -> &str {
		self.header.trim()
	}

	/// Leading whitespace of generated body lines.
	pub fn body_indent(&self) -> &str {
		&self.header_indent[..self.body_column.min(self.header_indent.len())]
	}

	/// The body with the marker's indentation removed from every line, or
	/// `None` when the body is empty. Inline bodies are returned verbatim.
	pub fn body_dedented(&self) -> Option<&str> {
		self
			.body_dedented
			.get_or_init(|| {
				if self.body_empty {
					None
				} else if self.body_inline {
					Some(self.body.clone())
				} else {
					Some(dedent(&self.body, self.body_column))
				}
			})
			.as_deref()
	}

	/// `"{open} {header} {close}"` using the raw header.
	pub fn quoted(&self) -> String {
		self.syntax.quote(&self.header)
	}

	/// `"{open} {end} {close}"` for this family.
	pub fn quoted_end(&self) -> String {
		self.syntax.quote(&self.syntax.end)
	}

	/// A location inside this marker's source.
	pub fn location(&self, offset: usize, width: usize) -> Location {
		Location::new(&self.source, offset, width)
	}

	/// Location of the open token, the default anchor for diagnostics.
	pub fn open_location(&self) -> Location {
		self.location(self.header_open, self.syntax.open.len())
	}

	/// True when no newline lies in `[from, to)`.
	pub(crate) fn same_line(&self, from: usize, to: usize) -> bool {
		find_byte(&self.source, b'\n', from, to).is_none()
	}

	fn extract_indent(&mut self) {
		let bytes = self.source.as_bytes();
		let start = rfind_byte(&self.source, b'\n', 0, self.header_open).map_or(0, |i| i + 1);
		let mut end = start;
		let mut body = self.header_open;

		let mut i = self.header_open;
		while i > start {
			i -= 1;
			if !is_blank(bytes[i]) {
				end = i + 1;
				if !self.syntax.as_comment {
					body = start;
					while i > start {
						i -= 1;
						if is_blank(bytes[i]) {
							body = i + 1;
							break;
						}
					}
				}
				break;
			}
		}

		self.header_column = self.header_open - start;
		self.header_start = start;
		self.header_indent_column = end - start;
		self.body_column = body - start;
		self.header_indent = bytes[start..self.header_open]
			.iter()
			.map(|&byte| if byte == b'\t' { '\t' } else { ' ' })
			.collect();
	}

	fn extract_header(&mut self) -> CogResult<()> {
		let source = Arc::clone(&self.source);
		let text: &str = &source;
		let bytes = text.as_bytes();
		let mut idx = self.header_close - self.syntax.close.len();
		let mut start = self.header_open + self.syntax.open.len();
		let mut header = String::new();
		self.header_empty = true;

		if self.same_line(self.header_open, idx) {
			if self.syntax.header == HeaderRule::Multiline {
				return Err(CogError::HeaderMustBeMultiline {
					at: self.open_location(),
				});
			}
			if bytes.get(start) == Some(&b' ') {
				start += 1;
			}
			if bytes.get(idx.wrapping_sub(1)) == Some(&b' ') {
				idx -= 1;
			}
			header.push_str(span(text, start, idx));
			self.header_empty = idx <= start;
		} else {
			if self.syntax.header == HeaderRule::Inline {
				return Err(CogError::HeaderMustBeInline {
					at: self.open_location(),
				});
			}

			let mut line_end = find_byte(text, b'\n', start, idx).unwrap_or(idx);
			if line_end > start {
				if bytes[start] == b' ' {
					start += 1;
				}
				header.push_str(span(text, start, line_end));
				self.header_empty = false;
			}

			loop {
				let line_start = line_end + 1;
				if let Some(next) = find_byte(text, b'\n', line_start, idx) {
					self.check_indent(line_start, next)?;
					if !self.header_empty {
						header.push('\n');
					}
					header.push_str(span(text, line_start + self.header_column, next));
					self.header_empty = false;
					line_end = next;
					continue;
				}

				self.check_indent(line_start, idx)?;
				if idx.saturating_sub(line_start) > self.header_column {
					let mut last = idx;
					if bytes[last - 1] == b' ' {
						last -= 1;
					}
					if !self.header_empty {
						header.push('\n');
					}
					header.push_str(span(text, line_start + self.header_column, last));
					self.header_empty = false;
				}
				break;
			}
		}

		self.is_end = header == self.syntax.end;
		self.header = header;
		Ok(())
	}

	/// Every header continuation line must repeat the first line's prefix:
	/// the same tabs, spaces elsewhere, and any comment text.
	fn check_indent(&self, start: usize, end: usize) -> CogResult<()> {
		let bytes = self.source.as_bytes();
		let indent = self.header_indent.as_bytes();
		let comment_end = start + self.header_indent_column;

		for i in start..start + self.header_column {
			let expected = indent[i - start];
			if i < end {
				let valid = match bytes.get(i) {
					Some(b' ') => expected != b'\t',
					Some(b'\t') => expected == b'\t',
					_ => i < comment_end,
				};
				if valid {
					continue;
				}
			} else if i >= comment_end && bytes.get(i) == Some(&b'\n') {
				break;
			}

			return Err(CogError::WrongHeaderIndentation {
				at: self.location(i, self.syntax.open.len()),
			});
		}

		Ok(())
	}
}

/// Find the next marker of `family` whose open token lies in `[from, to)`.
/// Returns the marker and the offset scanning should resume from.
pub(crate) fn find_marker(
	source: &Arc<str>,
	family: Family,
	syntax: &MarkerSyntax,
	from: usize,
	to: usize,
) -> CogResult<Option<(Marker, usize)>> {
	let Some(open) = find_token(source, &syntax.open, from, to) else {
		return Ok(None);
	};

	let mut marker = Marker::new(Arc::clone(source), family, syntax, open);
	let Some(close) = find_token(source, &syntax.close, open + syntax.open.len(), to) else {
		return Err(CogError::CloseMarkerNotFound {
			close: syntax.close.clone(),
			at: marker.open_location(),
		});
	};

	marker.header_close = close + syntax.close.len();
	marker.extract_indent();
	marker.extract_header()?;

	let resume = marker.header_close;
	Ok(Some((marker, resume)))
}

fn find_token(text: &str, token: &str, from: usize, to: usize) -> Option<usize> {
	text.get(from..to)?.find(token).map(|i| i + from)
}

pub(crate) fn find_byte(text: &str, byte: u8, from: usize, to: usize) -> Option<usize> {
	let bytes = text.as_bytes();
	let to = to.min(bytes.len());
	if from >= to {
		return None;
	}
	bytes[from..to].iter().position(|&b| b == byte).map(|i| i + from)
}

pub(crate) fn rfind_byte(text: &str, byte: u8, from: usize, to: usize) -> Option<usize> {
	let bytes = text.as_bytes();
	let to = to.min(bytes.len());
	if from >= to {
		return None;
	}
	bytes[from..to].iter().rposition(|&b| b == byte).map(|i| i + from)
}

fn is_blank(byte: u8) -> bool {
	matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

/// `text[start..end]`, empty when the range is inverted. Bounds that fall
/// inside a multi-byte character are moved forward to the next boundary.
pub(crate) fn span(text: &str, start: usize, end: usize) -> &str {
	let mut end = end.min(text.len());
	let mut start = start.min(end);
	while !text.is_char_boundary(end) {
		end += 1;
	}
	while !text.is_char_boundary(start) {
		start += 1;
	}
	if start >= end { "" } else { &text[start..end] }
}
