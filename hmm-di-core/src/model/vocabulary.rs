use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Interned state label. The begin sentinel is always `Label::BEGIN`,
/// the end sentinel `Label::END`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
	pub const BEGIN: Label = Label(0);
	pub const END: Label = Label(1);

	pub fn is_sentinel(self) -> bool {
		self == Self::BEGIN || self == Self::END
	}

	pub(crate) fn index(self) -> usize {
		self.0 as usize
	}
}

/// Interned observation symbol.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub(crate) u32);

/// Insertion-ordered string interner.
///
/// Ids are dense and assigned in first-seen order, so iterating the
/// vocabulary is deterministic and follows the order of discovery.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
	names: Vec<String>,
	ids: HashMap<String, u32>,
}

impl Vocabulary {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the id of `name`, adding it if unseen.
	pub fn intern(&mut self, name: &str) -> u32 {
		if let Some(&id) = self.ids.get(name) {
			return id;
		}
		let id = self.names.len() as u32;
		self.names.push(name.to_owned());
		self.ids.insert(name.to_owned(), id);
		id
	}

	pub fn id(&self, name: &str) -> Option<u32> {
		self.ids.get(name).copied()
	}

	/// Name behind an id handed out by this vocabulary.
	pub fn name(&self, id: u32) -> &str {
		&self.names[id as usize]
	}

	pub fn len(&self) -> usize {
		self.names.len()
	}

	pub fn is_empty(&self) -> bool {
		self.names.is_empty()
	}

	/// Names in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.names.iter().map(String::as_str)
	}
}

impl From<Vec<String>> for Vocabulary {
	fn from(names: Vec<String>) -> Self {
		let mut vocabulary = Self::new();
		for name in &names {
			vocabulary.intern(name);
		}
		vocabulary
	}
}

impl From<Vocabulary> for Vec<String> {
	fn from(vocabulary: Vocabulary) -> Self {
		vocabulary.names
	}
}
