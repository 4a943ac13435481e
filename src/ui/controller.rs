use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::{debug, warn};

use crate::app::{AppContext, AppError};
use crate::ui::day_summary::SummaryView;
use crate::ui::snapshots::SnapshotView;
use crate::ui::sync::SyncView;
use crate::ui::task_form::{CreateTaskView, EditTaskView};
use crate::ui::task_list::{FilterInput, TaskListView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Selection,
	NewTask,
	EditTask,
	Summary,
	Filter,
	Sync,
	Snapshots,
}

/// What a view asks the controller to do after handling a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
	Stay,
	Switch(Mode),
	/// Return to Selection.
	Close,
	Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
	pub key: &'static str,
	pub label: &'static str,
}

impl KeyMap {
	pub fn new(key: &'static str, label: &'static str) -> Self {
		Self { key, label }
	}
}

pub trait View {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError>;

	fn render(&mut self, frame: &mut Frame, area: Rect, context: &AppContext);

	/// Runs every time the view becomes the active one.
	fn before_focus(&mut self, _context: &mut AppContext) -> Result<(), AppError> {
		Ok(())
	}

	/// Drops transient input when the view is left.
	fn clear_input(&mut self) {}

	fn key_mapping(&self) -> Vec<KeyMap> {
		Vec::new()
	}
}

/// Owns one view per mode and routes keys and draws to the active one.
pub struct ModeController {
	mode: Mode,
	error: Option<String>,
	task_list: TaskListView,
	new_task: CreateTaskView,
	edit_task: EditTaskView,
	summary: SummaryView,
	sync: SyncView,
	snapshots: SnapshotView,
}

impl ModeController {
	/// Starts in Selection mode with the task list focused.
	pub fn new(context: &mut AppContext) -> Self {
		let mut controller = Self {
			mode: Mode::Selection,
			error: None,
			task_list: TaskListView::new(),
			new_task: CreateTaskView::new(),
			edit_task: EditTaskView::new(),
			summary: SummaryView::new(),
			sync: SyncView::new(),
			snapshots: SnapshotView::new(),
		};
		controller.focus(context);
		controller
	}

	#[cfg(test)]
	pub fn mode(&self) -> Mode {
		self.mode
	}

	#[cfg(test)]
	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	#[cfg(test)]
	pub fn task_list(&self) -> &TaskListView {
		&self.task_list
	}

	/// Handles one key press. Returns false once the program should exit.
	pub fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> bool {
		if key.modifiers.contains(KeyModifiers::CONTROL) {
			match key.code {
				KeyCode::Char('c') => return false,
				KeyCode::Char('s') => {
					self.switch_mode(Mode::Summary, context);
					return true;
				}
				_ => {}
			}
		}

		let mode = self.mode;
		let result = self.with_view(mode, |view| view.handle_key(key, context));
		match result {
			Ok(Transition::Stay) => self.error = None,
			Ok(Transition::Switch(next)) => self.switch_mode(next, context),
			Ok(Transition::Close) => self.close_view(context),
			Ok(Transition::Quit) => return false,
			Err(err) => {
				warn!(mode = ?mode, error = %err, "key handling failed");
				self.error = Some(err.to_string());
			}
		}

		if let Some(message) = context.take_backup_error() {
			self.error = Some(message);
		}
		true
	}

	pub fn switch_mode(&mut self, next: Mode, context: &mut AppContext) {
		debug!(from = ?self.mode, to = ?next, "switching mode");
		let previous = self.mode;
		self.with_view(previous, |view| view.clear_input());
		self.mode = next;
		self.error = None;

		match next {
			Mode::EditTask => self.edit_task.set_task(self.task_list.selected_code()),
			Mode::Sync => self.sync.set_day(self.summary.day()),
			_ => {}
		}
		self.focus(context);
	}

	fn close_view(&mut self, context: &mut AppContext) {
		let created = if self.mode == Mode::NewTask {
			self.new_task.take_saved_code()
		} else {
			None
		};
		self.switch_mode(Mode::Selection, context);
		if let Some(code) = created {
			self.task_list.select_code(&code);
		}
	}

	fn focus(&mut self, context: &mut AppContext) {
		let mode = self.mode;
		if let Err(err) = self.with_view(mode, |view| view.before_focus(context)) {
			warn!(mode = ?mode, error = %err, "view could not be prepared");
			self.error = Some(err.to_string());
		}
	}

	fn with_view<R>(&mut self, mode: Mode, action: impl FnOnce(&mut dyn View) -> R) -> R {
		match mode {
			Mode::Selection => action(&mut self.task_list),
			Mode::Filter => action(&mut FilterInput(&mut self.task_list)),
			Mode::NewTask => action(&mut self.new_task),
			Mode::EditTask => action(&mut self.edit_task),
			Mode::Summary => action(&mut self.summary),
			Mode::Sync => action(&mut self.sync),
			Mode::Snapshots => action(&mut self.snapshots),
		}
	}

	pub fn render(&mut self, frame: &mut Frame, context: &AppContext) {
		let mode = self.mode;
		let mapping = self.with_view(mode, |view| view.key_mapping());
		let rows = Layout::default()
			.direction(Direction::Vertical)
			.constraints([
				Constraint::Length(if self.error.is_some() { 1 } else { 0 }),
				Constraint::Min(3),
				Constraint::Length(if mapping.is_empty() { 0 } else { 3 }),
			])
			.split(frame.area());

		if let Some(error) = &self.error {
			let line = Line::from(Span::styled(
				format!("error: {error}"),
				Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
			));
			frame.render_widget(Paragraph::new(line), rows[0]);
		}

		self.with_view(mode, |view| view.render(frame, rows[1], context));

		if !mapping.is_empty() {
			frame.render_widget(key_mapping_footer(&mapping), rows[2]);
		}
	}
}

fn key_mapping_footer(mapping: &[KeyMap]) -> Paragraph<'static> {
	let mut spans = Vec::new();
	for (index, entry) in mapping.iter().enumerate() {
		if index > 0 {
			spans.push(Span::raw("   "));
		}
		spans.push(Span::styled(
			format!("[{}] ", entry.key),
			Style::default().add_modifier(Modifier::BOLD),
		));
		spans.push(Span::raw(entry.label));
	}
	Paragraph::new(Line::from(spans))
		.wrap(Wrap { trim: true })
		.block(Block::default().borders(Borders::TOP).title("Keys"))
}

#[cfg(test)]
mod tests {
	use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
	use ratatui::Terminal;
	use ratatui::backend::TestBackend;

	use super::{Mode, ModeController};
	use crate::app::{AppContext, FakeBackup, FakeTracker, context_with};

	fn press(controller: &mut ModeController, code: KeyCode, context: &mut AppContext) -> bool {
		controller.handle_key(KeyEvent::new(code, KeyModifiers::NONE), context)
	}

	fn control(controller: &mut ModeController, value: char, context: &mut AppContext) -> bool {
		controller.handle_key(KeyEvent::new(KeyCode::Char(value), KeyModifiers::CONTROL), context)
	}

	fn type_text(controller: &mut ModeController, text: &str, context: &mut AppContext) {
		for value in text.chars() {
			assert!(press(controller, KeyCode::Char(value), context));
		}
	}

	#[test]
	fn starts_in_selection_with_tasks_loaded() {
		let (mut context, _) = context_with(&["a", "b"]);
		let controller = ModeController::new(&mut context);
		assert_eq!(controller.mode(), Mode::Selection);
		assert_eq!(controller.task_list().window().len(), 2);
		assert!(controller.error().is_none());
	}

	#[test]
	fn global_keys_work_from_any_mode() {
		let (mut context, _) = context_with(&["a"]);
		let mut controller = ModeController::new(&mut context);

		assert!(press(&mut controller, KeyCode::Char('n'), &mut context));
		assert_eq!(controller.mode(), Mode::NewTask);
		assert!(control(&mut controller, 's', &mut context));
		assert_eq!(controller.mode(), Mode::Summary);
		assert!(!control(&mut controller, 'c', &mut context));
	}

	#[test]
	fn quit_key_ends_the_loop_from_selection() {
		let (mut context, _) = context_with(&[]);
		let mut controller = ModeController::new(&mut context);
		assert!(!press(&mut controller, KeyCode::Char('q'), &mut context));
	}

	#[test]
	fn creating_a_task_returns_to_selection_with_it_selected() {
		let (mut context, _) = context_with(&["a", "b"]);
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('n'), &mut context);
		type_text(&mut controller, "c", &mut context);
		press(&mut controller, KeyCode::Tab, &mut context);
		type_text(&mut controller, "third", &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);

		assert_eq!(controller.mode(), Mode::Selection);
		assert!(controller.error().is_none());
		assert_eq!(controller.task_list().selected_code().as_deref(), Some("c"));
		assert_eq!(controller.task_list().window().len(), 3);
	}

	#[test]
	fn failed_validation_stays_in_the_form() {
		let (mut context, _) = context_with(&[]);
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('n'), &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);
		assert_eq!(controller.mode(), Mode::NewTask);
		assert!(controller.error().is_some_and(|error| error.contains("required")));

		press(&mut controller, KeyCode::Esc, &mut context);
		assert_eq!(controller.mode(), Mode::Selection);
		assert!(controller.error().is_none());

		press(&mut controller, KeyCode::Char('n'), &mut context);
		type_text(&mut controller, "x", &mut context);
		press(&mut controller, KeyCode::Esc, &mut context);
		press(&mut controller, KeyCode::Char('n'), &mut context);
		press(&mut controller, KeyCode::Tab, &mut context);
		type_text(&mut controller, "title", &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);
		assert_eq!(controller.mode(), Mode::NewTask, "code input must not survive leaving the form");
	}

	#[test]
	fn hook_errors_do_not_abort_the_transition() {
		let (mut context, _) = context_with(&["a"]);
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('r'), &mut context);
		assert_eq!(controller.mode(), Mode::Snapshots);
		assert!(controller.error().is_some_and(|error| error.contains("not available")));

		press(&mut controller, KeyCode::Esc, &mut context);
		assert_eq!(controller.mode(), Mode::Selection);
		assert!(controller.error().is_none());
	}

	#[test]
	fn filter_mode_narrows_the_list() {
		let (mut context, _) = context_with(&["ABC-1", "XYZ-2"]);
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('f'), &mut context);
		assert_eq!(controller.mode(), Mode::Filter);
		type_text(&mut controller, "xyz", &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);

		assert_eq!(controller.mode(), Mode::Selection);
		assert_eq!(controller.task_list().filter(), "xyz");
		assert_eq!(controller.task_list().window().len(), 1);

		press(&mut controller, KeyCode::Char('g'), &mut context);
		assert_eq!(controller.task_list().window().len(), 2);
	}

	#[test]
	fn clocking_in_shows_snapshot_failures() {
		let (mut context, _) = context_with(&["a"]);
		let backup = FakeBackup::default();
		backup.state.borrow_mut().fail = true;
		context.backup = Some(Box::new(backup));
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('j'), &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);
		assert_eq!(context.ledger.active_code(), Some("a"));
		assert!(controller.error().is_some_and(|error| error.contains("snapshot")));

		press(&mut controller, KeyCode::Char('j'), &mut context);
		assert!(controller.error().is_none());
	}

	#[test]
	fn edit_flow_updates_the_selected_task() {
		let (mut context, _) = context_with(&["a"]);
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('j'), &mut context);
		press(&mut controller, KeyCode::Char('e'), &mut context);
		assert_eq!(controller.mode(), Mode::EditTask);
		type_text(&mut controller, "renamed", &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);

		assert_eq!(controller.mode(), Mode::Selection);
		assert_eq!(context.ledger.task("a").map(|task| task.title.as_str()), Some("renamed"));
	}

	#[test]
	fn summary_sync_round_trip() {
		let (mut context, _) = context_with(&["a"]);
		let tracker = FakeTracker::default();
		let mut controller = ModeController::new(&mut context);

		press(&mut controller, KeyCode::Char('s'), &mut context);
		assert_eq!(controller.mode(), Mode::Summary);
		press(&mut controller, KeyCode::Char('s'), &mut context);
		assert_eq!(controller.mode(), Mode::Summary);
		assert!(controller.error().is_some_and(|error| error.contains("not configured")));

		context.tracker = Some(Box::new(tracker.clone()));
		press(&mut controller, KeyCode::Char('k'), &mut context);
		press(&mut controller, KeyCode::Char('s'), &mut context);
		assert_eq!(controller.mode(), Mode::Sync);
		press(&mut controller, KeyCode::Char('s'), &mut context);
		assert_eq!(tracker.state.borrow().removed.len(), 1);

		press(&mut controller, KeyCode::Char('q'), &mut context);
		assert_eq!(controller.mode(), Mode::Summary);
		press(&mut controller, KeyCode::Esc, &mut context);
		assert_eq!(controller.mode(), Mode::Selection);
	}

	#[test]
	fn renders_error_list_and_footer() {
		let (mut context, _) = context_with(&["ABC-1", "XYZ-2"]);
		let mut controller = ModeController::new(&mut context);
		press(&mut controller, KeyCode::Char('r'), &mut context);
		press(&mut controller, KeyCode::Esc, &mut context);
		press(&mut controller, KeyCode::Char('n'), &mut context);
		press(&mut controller, KeyCode::Enter, &mut context);

		let mut terminal = Terminal::new(TestBackend::new(100, 16)).expect("test terminal");
		terminal
			.draw(|frame| controller.render(frame, &context))
			.expect("draw");
		let screen = terminal
			.backend()
			.buffer()
			.content
			.iter()
			.map(|cell| cell.symbol())
			.collect::<String>();

		assert!(screen.contains("error: Code:"));
		assert!(screen.contains("New task"));
		assert!(screen.contains("[ESC] Cancel"));

		press(&mut controller, KeyCode::Esc, &mut context);
		terminal
			.draw(|frame| controller.render(frame, &context))
			.expect("draw");
		let screen = terminal
			.backend()
			.buffer()
			.content
			.iter()
			.map(|cell| cell.symbol())
			.collect::<String>();
		assert!(screen.contains("ABC-1"));
		assert!(screen.contains("Search:"));
		assert!(screen.contains("[0/2]"));
	}
}
