use crate::CogError;
use crate::CogResult;
use crate::Family;
use crate::Marker;
use crate::body::extract_body;

/// Layout constraint the next marker must satisfy after an end marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
	Free,
	/// An inline pair just closed; the marker after next decides.
	Pending,
	NewLine,
	SameLine,
}

/// Validate the structure of `markers` (sorted by position), pair every open
/// marker with its end marker, and extract bodies.
pub(crate) fn check_markers(markers: &mut [Marker]) -> CogResult<()> {
	let mut stack: Vec<usize> = Vec::new();
	// Per open marker: `None` until its subtree's layout is known, then
	// whether the subtree is inline.
	let mut subtree_inline: Vec<Option<bool>> = Vec::new();
	let mut previous_kind: Option<(Family, bool)> = None;
	let mut layout = Layout::Free;
	let mut previous: Option<usize> = None;

	for idx in 0..markers.len() {
		let marker = &markers[idx];
		let kind = (marker.family, marker.is_end);

		if matches!(
			(previous_kind, kind),
			(Some((Family::Generation, false)), (Family::Edit, true))
				| (Some((Family::Edit, false)), (Family::Generation, true))
		) {
			return Err(CogError::WrongInclusion {
				at: marker.open_location(),
			});
		}
		previous_kind = Some(kind);

		if !marker.is_end
			&& !marker.direct_enclosure
			&& stack.last().is_some_and(|&top| markers[top].family == marker.family)
		{
			return Err(CogError::DirectlyEnclosedEdit {
				marker: marker.quoted(),
				end_marker: marker.quoted_end(),
				at: marker.open_location(),
			});
		}

		let same_line = previous.map(|prev| marker.same_line(markers[prev].header_close, marker.header_open));
		if let Some(same_line) = same_line {
			layout = match (layout, same_line) {
				(Layout::Free, _) | (Layout::Pending, false) => Layout::Free,
				(Layout::Pending, true) => Layout::SameLine,
				(Layout::NewLine, true) => {
					return Err(CogError::RequireNewline {
						at: marker.open_location(),
					});
				}
				(Layout::SameLine, false) => {
					return Err(CogError::RequireInline {
						at: marker.open_location(),
					});
				}
				(Layout::NewLine | Layout::SameLine, _) => Layout::Free,
			};

			if let Some(top) = subtree_inline.last_mut() {
				match *top {
					None => *top = Some(same_line),
					Some(false) if same_line => {
						return Err(CogError::RequireNewline {
							at: marker.open_location(),
						});
					}
					Some(true) if !same_line => {
						return Err(CogError::RequireInline {
							at: marker.open_location(),
						});
					}
					Some(_) => {}
				}
			}
		}

		previous = Some(idx);
		if !marker.is_end {
			let inherited = subtree_inline.last().copied().flatten() == Some(true);
			stack.push(idx);
			subtree_inline.push(inherited.then_some(true));
			continue;
		}

		let Some(open_idx) = stack.pop() else {
			let syntax = marker.syntax();
			return Err(CogError::OpenMarkerNotFound {
				marker: format!("{} {}", syntax.open, syntax.close),
				at: marker.open_location(),
			});
		};
		let inline = subtree_inline.pop().flatten() == Some(true);

		let (before, after) = markers.split_at_mut(idx);
		let open = &mut before[open_idx];
		let end = &mut after[0];
		open.dual = Some(idx);
		end.dual = Some(open_idx);
		extract_body(open, end, inline);

		if inline {
			layout = Layout::Pending;
			open.header_start = open.header_open;
			open.header_end = open.header_close;
			end.header_start = end.header_open;
			end.header_end = end.header_close;
		} else {
			layout = Layout::NewLine;
			open.header_end = open.header_close;
			let source = end.source();
			let header_end = source[end.header_close..]
				.find('\n')
				.map_or(source.len(), |i| end.header_close + i + 1);
			end.header_end = header_end;
		}
	}

	if let Some(&top) = stack.last() {
		let marker = &markers[top];
		let close_len = marker.syntax().close.len();
		return Err(CogError::EndMarkerNotFound {
			marker: marker.quoted_end(),
			at: marker.location(marker.header_close - close_len, close_len),
		});
	}

	Ok(())
}
