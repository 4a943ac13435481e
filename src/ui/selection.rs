use crate::backup::Snapshot;
use crate::domain::Task;

/// Anything a list view can show and search by.
pub trait Labeled {
	fn label(&self) -> String;
}

impl Labeled for Task {
	fn label(&self) -> String {
		Task::label(self)
	}
}

impl Labeled for Snapshot {
	fn label(&self) -> String {
		Snapshot::label(self)
	}
}

/// Keeps a selection and a scroll offset over an item sequence so that the
/// selected row always lies inside the visible window.
#[derive(Debug, Clone)]
pub struct SelectionWindow<T> {
	items: Vec<T>,
	selected: Option<usize>,
	offset: usize,
	window_size: usize,
}

impl<T> Default for SelectionWindow<T> {
	fn default() -> Self {
		Self {
			items: Vec::new(),
			selected: None,
			offset: 0,
			window_size: 0,
		}
	}
}

impl<T: Labeled> SelectionWindow<T> {
	pub fn new() -> Self {
		Self::default()
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn selected_index(&self) -> Option<usize> {
		self.selected
	}

	pub fn selected(&self) -> Option<&T> {
		self.selected.and_then(|index| self.items.get(index))
	}

	#[cfg(test)]
	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn window_size(&self) -> usize {
		self.window_size
	}

	/// Replaces the items. The selection is kept by position, or dropped when
	/// it no longer fits.
	pub fn update_items(&mut self, items: Vec<T>) {
		if self.selected.is_some_and(|index| index >= items.len()) {
			self.selected = None;
		}
		self.items = items;
		self.recalculate_offset();
	}

	pub fn next(&mut self) {
		if self.items.is_empty() {
			return;
		}
		self.selected = Some(match self.selected {
			Some(index) if index + 1 < self.items.len() => index + 1,
			_ => 0,
		});
		self.recalculate_offset();
	}

	pub fn previous(&mut self) {
		if self.items.is_empty() {
			return;
		}
		self.selected = Some(match self.selected {
			Some(index) if index > 0 && index < self.items.len() => index - 1,
			_ => self.items.len() - 1,
		});
		self.recalculate_offset();
	}

	pub fn select_index(&mut self, index: usize) -> Option<&T> {
		if index >= self.items.len() {
			return None;
		}
		self.selected = Some(index);
		self.recalculate_offset();
		self.items.get(index)
	}

	pub fn select_label(&mut self, label: &str) -> Option<usize> {
		self.select_matching(|item| item.label() == label)
	}

	pub fn select_matching(&mut self, matcher: impl Fn(&T) -> bool) -> Option<usize> {
		let index = self.items.iter().position(matcher)?;
		self.select_index(index)?;
		Some(index)
	}

	/// `height` includes the row reserved for the page indicator.
	pub fn update_area(&mut self, height: usize) {
		self.window_size = height.saturating_sub(1);
		self.recalculate_offset();
	}

	/// Rows currently in view, with their absolute index.
	pub fn visible(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
		let start = self.offset.min(self.items.len());
		let end = (self.offset + self.window_size).min(self.items.len());
		self.items[start..end]
			.iter()
			.enumerate()
			.map(move |(row, item)| (start + row, item))
	}

	pub fn pager(&self) -> String {
		let current = self.selected.map(|index| index + 1).unwrap_or(0);
		format!("[{current}/{}]", self.items.len())
	}

	fn recalculate_offset(&mut self) {
		let Some(selected) = self.selected else {
			self.offset = self
				.offset
				.min(self.items.len().saturating_sub(self.window_size));
			return;
		};

		if self.window_size == 0 || selected < self.offset {
			self.offset = selected;
		} else if selected >= self.offset + self.window_size {
			self.offset = selected + 1 - self.window_size;
		}
		// a grown window must not leave empty rows below the last item
		self.offset = self
			.offset
			.min(self.items.len().saturating_sub(self.window_size));
	}
}
