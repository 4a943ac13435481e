use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use tracing::info;

use crate::app::{AppContext, AppError};
use crate::backup::Snapshot;
use crate::ui::controller::{KeyMap, Transition, View};
use crate::ui::render_window;
use crate::ui::selection::SelectionWindow;

#[derive(Debug, Default)]
pub struct SnapshotView {
	window: SelectionWindow<Snapshot>,
}

impl SnapshotView {
	pub fn new() -> Self {
		Self::default()
	}

	fn restore_selected(&mut self, context: &mut AppContext) -> Result<Transition, AppError> {
		let Some(id) = self.window.selected().map(|snapshot| snapshot.id.clone()) else {
			return Ok(Transition::Stay);
		};
		context.snapshot_store()?.restore(&id)?;
		context.ledger.reload()?;
		info!(id = %id, "ledger reloaded from snapshot");
		Ok(Transition::Close)
	}
}

impl View for SnapshotView {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		if key.modifiers.contains(KeyModifiers::CONTROL) {
			return Ok(Transition::Stay);
		}
		match key.code {
			KeyCode::Esc | KeyCode::Char('q') => Ok(Transition::Close),
			KeyCode::Down | KeyCode::Char('j') => {
				self.window.next();
				Ok(Transition::Stay)
			}
			KeyCode::Up | KeyCode::Char('k') => {
				self.window.previous();
				Ok(Transition::Stay)
			}
			KeyCode::Enter => self.restore_selected(context),
			_ => Ok(Transition::Stay),
		}
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, _context: &AppContext) {
		render_window(frame, area, "Snapshots", &mut self.window, |_| Style::default());
	}

	fn before_focus(&mut self, context: &mut AppContext) -> Result<(), AppError> {
		self.window.update_items(Vec::new());
		let snapshots = context.snapshot_store()?.snapshots()?;
		self.window.update_items(snapshots);
		self.window.select_index(0);
		Ok(())
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		let mut mapping = vec![KeyMap::new("q/ESC", "Back")];
		if self.window.selected().is_some() {
			mapping.push(KeyMap::new("ENTER", "Restore"));
		}
		mapping.extend([KeyMap::new("j", "Next"), KeyMap::new("k", "Previous")]);
		mapping
	}
}
