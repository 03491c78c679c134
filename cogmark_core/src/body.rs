use crate::Marker;
use crate::scanner::find_byte;
use crate::scanner::rfind_byte;
use crate::scanner::span;

/// Fill in the body of a freshly paired `open`/`end` marker pair.
///
/// Inline bodies lose one space of padding on each side, and the padding is
/// absorbed into the adjacent headers. Multi-line bodies span the whole lines
/// between the header line of `open` and the header line of `end`, without
/// the final newline.
pub(crate) fn extract_body(open: &mut Marker, end: &mut Marker, inline: bool) {
	let source = open.source_arc();
	let text: &str = &source;

	if inline {
		open.body_start = match find_byte(text, b' ', open.header_close, end.header_open) {
			Some(i) => {
				open.header_close = i;
				i + 1
			}
			None => open.header_close,
		};
		open.body_end = match rfind_byte(text, b' ', open.header_close, end.header_open) {
			Some(j) => {
				end.header_open = j + 1;
				j
			}
			_ => end.header_open,
		};
		open.body = span(text, open.body_start, open.body_end).to_owned();
	} else {
		open.body_start =
			find_byte(text, b'\n', open.header_close, text.len()).map_or(text.len(), |i| i + 1);
		open.body_end =
			rfind_byte(text, b'\n', open.header_close, end.header_open).map_or(0, |i| i + 1);
		open.header_close = open.body_start;
		open.body = if open.body_end > open.body_start {
			span(text, open.body_start, open.body_end - 1).to_owned()
		} else {
			String::new()
		};
	}

	open.body_inline = inline;
	open.body_empty = open.body.is_empty();
	end.body_inline = inline;
}

/// Strip up to `column` leading spaces or tabs from every line of `text`.
/// Stripping stops at the first other character of a line.
pub fn dedent(text: &str, column: usize) -> String {
	let mut result = String::with_capacity(text.len());
	for line in text.split_inclusive('\n') {
		let content = line.strip_suffix('\n').unwrap_or(line);
		let strip = content
			.bytes()
			.take(column)
			.take_while(|byte| matches!(byte, b' ' | b'\t'))
			.count();
		result.push_str(&line[strip..]);
	}
	result
}
