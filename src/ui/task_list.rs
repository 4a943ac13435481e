use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::{AppContext, AppError};
use crate::domain::{Task, clock_now, format_duration};
use crate::ledger::TaskLedger;
use crate::ui::controller::{KeyMap, Mode, Transition, View};
use crate::ui::render_window;
use crate::ui::selection::SelectionWindow;

/// The task list shown in Selection mode, bound to the ledger through the
/// current filter query.
#[derive(Debug, Default)]
pub struct TaskListView {
	window: SelectionWindow<Task>,
	filter: String,
}

impl TaskListView {
	pub fn new() -> Self {
		Self::default()
	}

	#[cfg(test)]
	pub fn filter(&self) -> &str {
		&self.filter
	}

	#[cfg(test)]
	pub fn window(&self) -> &SelectionWindow<Task> {
		&self.window
	}

	/// Re-runs the filter against the ledger. The selection is kept by
	/// position.
	pub fn refresh(&mut self, ledger: &TaskLedger) {
		let tasks = ledger
			.filtered_tasks(&self.filter)
			.into_iter()
			.cloned()
			.collect();
		self.window.update_items(tasks);
	}

	pub fn selected_code(&self) -> Option<String> {
		self.window.selected().map(|task| task.code.clone())
	}

	pub fn select_code(&mut self, code: &str) -> bool {
		self.window.select_matching(|task| task.code == code).is_some()
	}

	pub fn push_filter(&mut self, value: char, ledger: &TaskLedger) {
		self.filter.push(value);
		self.reselect_first(ledger);
	}

	pub fn pop_filter(&mut self, ledger: &TaskLedger) {
		if self.filter.pop().is_some() {
			self.reselect_first(ledger);
		}
	}

	pub fn clear_filter(&mut self, ledger: &TaskLedger) {
		self.filter.clear();
		self.reselect_first(ledger);
	}

	pub fn jump_to_active(&mut self, ledger: &TaskLedger) -> bool {
		match ledger.active_task() {
			Some(task) => self.window.select_label(&task.label()).is_some(),
			None => false,
		}
	}

	/// Clocks out of the selected task when it is the active one, otherwise
	/// clocks into it.
	pub fn toggle_clock(&mut self, context: &mut AppContext) -> Result<(), AppError> {
		let Some(code) = self.selected_code() else {
			return Ok(());
		};

		if context.ledger.active_code() == Some(code.as_str()) {
			context.ledger.clock_out_of(&code, clock_now())?;
			self.refresh(&context.ledger);
			return Ok(());
		}

		context.ledger.clock_into(&code, clock_now())?;
		context.snapshot_after_change();
		self.clear_filter(&context.ledger);
		self.select_code(&code);
		Ok(())
	}

	fn reselect_first(&mut self, ledger: &TaskLedger) {
		self.refresh(ledger);
		self.window.select_index(0);
	}

	fn render_list(&mut self, frame: &mut Frame, area: Rect, context: &AppContext, filter_focused: bool) {
		let active = context.ledger.active_task();
		let rows = Layout::default()
			.direction(Direction::Vertical)
			.constraints([
				Constraint::Min(3),
				Constraint::Length(if active.is_some() { 1 } else { 0 }),
				Constraint::Length(1),
			])
			.split(area);

		let active_code = context.ledger.active_code();
		render_window(frame, rows[0], "Tasks", &mut self.window, |task| {
			if Some(task.code.as_str()) == active_code {
				Style::default().fg(Color::Green)
			} else {
				Style::default()
			}
		});

		if let Some(task) = active {
			let elapsed = task
				.bookings
				.last()
				.and_then(|booking| booking.start)
				.map(|start| format_duration(clock_now() - start))
				.unwrap_or_default();
			let line = Line::from(vec![
				Span::styled("Active task: ", Style::default().add_modifier(Modifier::BOLD)),
				Span::styled(
					task.code.clone(),
					Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
				),
				Span::raw(format!(" ({}) {elapsed}", task.title)),
			]);
			frame.render_widget(Paragraph::new(line), rows[1]);
		}

		let label_style = if filter_focused {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default().add_modifier(Modifier::BOLD)
		};
		let cursor = if filter_focused { "_" } else { "" };
		let search = Line::from(vec![
			Span::styled("Search: ", label_style),
			Span::raw(format!("{}{cursor}", self.filter)),
		]);
		frame.render_widget(Paragraph::new(search), rows[2]);
	}
}

impl View for TaskListView {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		let control = key.modifiers.contains(KeyModifiers::CONTROL);
		let transition = match key.code {
			KeyCode::Char('n') => Transition::Switch(Mode::NewTask),
			KeyCode::Char('f') => Transition::Switch(Mode::Filter),
			KeyCode::Char('a') => {
				self.clear_filter(&context.ledger);
				self.jump_to_active(&context.ledger);
				Transition::Stay
			}
			KeyCode::Char('e') if !control && self.window.selected().is_some() => {
				Transition::Switch(Mode::EditTask)
			}
			KeyCode::Char('g') if !control => {
				self.clear_filter(&context.ledger);
				Transition::Stay
			}
			KeyCode::Char('s') if !control => Transition::Switch(Mode::Summary),
			KeyCode::Char('r') if !control => Transition::Switch(Mode::Snapshots),
			KeyCode::Char('q') if !control => Transition::Quit,
			KeyCode::Down | KeyCode::Char('j') => {
				self.window.next();
				Transition::Stay
			}
			KeyCode::Up | KeyCode::Char('k') => {
				self.window.previous();
				Transition::Stay
			}
			KeyCode::Enter => {
				self.toggle_clock(context)?;
				Transition::Stay
			}
			_ => Transition::Stay,
		};
		Ok(transition)
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, context: &AppContext) {
		self.render_list(frame, area, context, false);
	}

	fn before_focus(&mut self, context: &mut AppContext) -> Result<(), AppError> {
		self.refresh(&context.ledger);
		Ok(())
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		let mut mapping = vec![
			KeyMap::new("^c", "Quit"),
			KeyMap::new("j/k", "Navigate"),
		];
		if self.window.selected().is_some() {
			mapping.push(KeyMap::new("ENTER", "Clock in/out"));
			mapping.push(KeyMap::new("e", "Edit"));
		}
		mapping.extend([
			KeyMap::new("n", "New task"),
			KeyMap::new("f", "Filter"),
			KeyMap::new("a", "Active task"),
			KeyMap::new("g", "Clear filter"),
			KeyMap::new("s", "Summary"),
			KeyMap::new("r", "Snapshots"),
		]);
		mapping
	}
}

/// Filter mode: typing edits the task list query in place.
pub struct FilterInput<'a>(pub &'a mut TaskListView);

impl View for FilterInput<'_> {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		let list = &mut *self.0;
		let transition = match key.code {
			KeyCode::Esc => {
				list.clear_filter(&context.ledger);
				Transition::Close
			}
			KeyCode::Enter => Transition::Close,
			KeyCode::Backspace => {
				list.pop_filter(&context.ledger);
				Transition::Stay
			}
			KeyCode::Char(value) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
				list.push_filter(value, &context.ledger);
				Transition::Stay
			}
			_ => Transition::Stay,
		};
		Ok(transition)
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, context: &AppContext) {
		self.0.render_list(frame, area, context, true);
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		vec![
			KeyMap::new("^c", "Quit"),
			KeyMap::new("ENTER", "Keep filter"),
			KeyMap::new("ESC", "Clear filter"),
		]
	}
}
