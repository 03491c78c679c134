/// Pre-computed table of line-start byte offsets for offset-to-point
/// conversion. Lookups are a binary search over the table.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
	text: &'a str,
	/// Byte offsets of the start of each line. `line_starts[0]` is always 0.
	line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
	pub fn new(text: &'a str) -> Self {
		let mut line_starts = vec![0];
		for (i, byte) in text.bytes().enumerate() {
			if byte == b'\n' {
				line_starts.push(i + 1);
			}
		}
		Self { text, line_starts }
	}

	/// Resolve a possibly negative offset. Negative offsets count from the end
	/// of the text, so `-1` is the last byte.
	pub fn resolve(&self, offset: isize) -> usize {
		let len = self.text.len();
		if len == 0 {
			return 0;
		}
		if offset < 0 {
			offset.rem_euclid(len as isize) as usize
		} else {
			(offset as usize).min(len)
		}
	}

	/// Convert a byte offset into a 1-indexed `(line, column)` pair. Columns
	/// count characters, not bytes.
	pub fn coordinates(&self, offset: isize) -> (usize, usize) {
		let offset = self.resolve(offset);
		let line_idx = match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact,
			Err(insert) => insert.saturating_sub(1),
		};
		let line_start = self.line_starts[line_idx];
		let column = self
			.text
			.get(line_start..offset)
			.map_or(offset - line_start, |prefix| prefix.chars().count());

		(line_idx + 1, column + 1)
	}

	/// The full line containing `offset`, without its line terminator, and
	/// whether that line is terminated by a newline (as opposed to the end of
	/// the text).
	pub fn line_at(&self, offset: isize) -> (&'a str, bool) {
		let offset = self.resolve(offset);
		let line_idx = match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact,
			Err(insert) => insert.saturating_sub(1),
		};
		let start = self.line_starts[line_idx];
		let text = self.text;
		match text[start..].find('\n') {
			Some(end) => (&text[start..start + end], true),
			None => (&text[start..], false),
		}
	}
}

/// Shorthand for [`LineIndex::coordinates`] when only one lookup is needed.
pub fn coordinates(text: &str, offset: isize) -> (usize, usize) {
	LineIndex::new(text).coordinates(offset)
}

/// The line at `offset` followed by a visible terminator: `\n` when the line
/// ends with a newline and `\0` when it runs to the end of the text.
pub fn line_at(text: &str, offset: isize) -> String {
	let (line, terminated) = LineIndex::new(text).line_at(offset);
	let suffix = if terminated { "\\n" } else { "\\0" };
	format!("{line}{suffix}")
}

/// Truncate `text` to `max_chars` characters (appending `...`) and escape
/// tabs and newlines so it fits on a single diagnostic line.
pub fn format_text(text: &str, max_chars: usize) -> String {
	let mut result: String = text.chars().take(max_chars).collect();
	if text.chars().nth(max_chars).is_some() {
		result.push_str("...");
	}
	result.replace('\t', "\\t").replace('\n', "\\n")
}
