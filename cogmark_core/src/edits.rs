use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::CogError;
use crate::CogResult;
use crate::EditBlock;
use crate::Marker;

/// Edit blocks whose bodies may be reinserted during one generation, keyed
/// by edit name.
///
/// Nested evaluations stack a pool of their own blocks beneath the enclosing
/// pool, which borrows rather than copies the blocks. Entries are ordered so
/// the lost-code check reports the same edit on every run.
#[derive(Debug, Clone, Default)]
pub(crate) struct EditPool<'a> {
	blocks: BTreeMap<&'a str, &'a EditBlock>,
	enclosing: Option<&'a EditPool<'a>>,
}

impl<'a> EditPool<'a> {
	pub(crate) fn new(blocks: &'a HashMap<String, EditBlock>) -> Self {
		let mut pool = Self::default();
		pool.extend(blocks);
		pool
	}

	/// Add `blocks`, replacing entries with the same name.
	pub(crate) fn extend(&mut self, blocks: &'a HashMap<String, EditBlock>) {
		self
			.blocks
			.extend(blocks.iter().map(|(name, block)| (name.as_str(), block)));
	}

	/// A pool of `own` blocks layered under `self`: entries reachable from
	/// this pool win.
	pub(crate) fn beneath<'b>(&'b self, own: &'b HashMap<String, EditBlock>) -> EditPool<'b> {
		let mut pool = EditPool::new(own);
		pool.enclosing = Some(self);
		pool
	}

	pub(crate) fn remove(&mut self, name: &str) {
		self.blocks.remove(name);
	}

	fn get(&self, name: &str) -> Option<&EditBlock> {
		self
			.enclosing
			.and_then(|enclosing| enclosing.get(name))
			.or_else(|| self.blocks.get(name).copied())
	}

	fn body(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(EditBlock::body)
	}
}

/// Tracks which edits have been reinserted across one top-level generation
/// and every nested evaluation it triggers.
#[derive(Debug)]
pub(crate) struct Reconciler<'a> {
	overrides: &'a HashMap<String, String>,
	consumed: HashSet<String>,
}

impl<'a> Reconciler<'a> {
	pub(crate) fn new(overrides: &'a HashMap<String, String>) -> Self {
		Self {
			overrides,
			consumed: HashSet::new(),
		}
	}

	/// Claim the edit named by `marker` and return the body to reinsert. An
	/// override wins over the pool. Each edit may be claimed once.
	pub(crate) fn claim(&mut self, marker: &Marker, pool: &EditPool<'_>) -> CogResult<Option<String>> {
		let name = marker.name();
		if !self.consumed.insert(name.to_owned()) {
			return Err(CogError::AlreadyGeneratedEdit {
				marker: marker.quoted(),
				at: marker.open_location(),
			});
		}

		let body = self
			.overrides
			.get(name)
			.map(String::as_str)
			.or_else(|| pool.body(name))
			.map(ToOwned::to_owned);
		tracing::trace!(edit = name, found = body.is_some(), "claimed edit");
		Ok(body)
	}

	/// Fail on the first edit in the top layer of `pool` that was never
	/// reinserted, unless it allows code loss.
	pub(crate) fn ensure_consumed(&self, pool: &EditPool<'_>) -> CogResult<()> {
		let lost = pool
			.blocks
			.iter()
			.find(|(name, block)| !block.allow_code_loss && !self.consumed.contains(**name));

		match lost {
			Some((name, block)) => {
				tracing::warn!(edit = %name, "edit marker was not regenerated");
				Err(CogError::NonGeneratedEdit {
					marker: block.open().quoted(),
					at: block.open().open_location(),
				})
			}
			None => Ok(()),
		}
	}
}
