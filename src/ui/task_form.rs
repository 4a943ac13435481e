use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::app::{AppContext, AppError};
use crate::domain::{Task, parse_tags};
use crate::storage::is_valid_code;
use crate::ui::controller::{KeyMap, Transition, View};
use crate::ui::form::{Field, Form, render_form};

const CODE: usize = 0;
const TITLE: usize = 1;
const TAGS: usize = 2;

pub struct CreateTaskView {
	form: Form,
	saved_code: Option<String>,
}

impl CreateTaskView {
	pub fn new() -> Self {
		Self {
			form: Form::new(vec![
				Field::required("Code"),
				Field::required("Title"),
				Field::optional("Tags"),
			]),
			saved_code: None,
		}
	}

	/// Code of the task created by the last successful save, consumed once.
	pub fn take_saved_code(&mut self) -> Option<String> {
		self.saved_code.take()
	}

	fn save(&mut self, context: &mut AppContext) -> Result<Transition, AppError> {
		self.form.validate()?;
		let code = self.form.value(CODE).trim().to_string();
		if !is_valid_code(&code) {
			self.form.set_error(CODE, "Codes must not contain spaces or slashes.");
			return Err(AppError::Validation(format!("invalid task code {code:?}")));
		}

		let task = Task::new(
			code.clone(),
			self.form.value(TITLE).trim(),
			parse_tags(self.form.value(TAGS)),
		);
		context.ledger.add_task(task)?;
		context.snapshot_after_change();
		self.saved_code = Some(code);
		Ok(Transition::Close)
	}
}

impl View for CreateTaskView {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		match key.code {
			KeyCode::Esc => return Ok(Transition::Close),
			KeyCode::Tab => self.form.next_field(),
			KeyCode::BackTab => self.form.previous_field(),
			KeyCode::Enter => return self.save(context),
			_ => {
				self.form.handle_input(key);
			}
		}
		Ok(Transition::Stay)
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, _context: &AppContext) {
		render_form(frame, area, "New task", &self.form);
	}

	fn before_focus(&mut self, _context: &mut AppContext) -> Result<(), AppError> {
		self.form.reset();
		self.saved_code = None;
		Ok(())
	}

	fn clear_input(&mut self) {
		self.form.reset();
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		vec![
			KeyMap::new("^c", "Quit"),
			KeyMap::new("TAB", "Switch field"),
			KeyMap::new("ENTER", "Create task"),
			KeyMap::new("ESC", "Cancel"),
		]
	}
}

/// Edits title and tags of one task. The code is shown but fixed.
pub struct EditTaskView {
	code: Option<String>,
	form: Form,
}

impl EditTaskView {
	pub fn new() -> Self {
		Self {
			code: None,
			form: Form::new(vec![Field::optional("Title"), Field::optional("Tags")]),
		}
	}

	pub fn set_task(&mut self, code: Option<String>) {
		self.code = code;
	}

	fn save(&mut self, context: &mut AppContext) -> Result<Transition, AppError> {
		let code = self
			.code
			.clone()
			.ok_or_else(|| AppError::Validation("no task selected".to_string()))?;
		context.ledger.update_task(
			&code,
			self.form.value(0).trim().to_string(),
			parse_tags(self.form.value(1)),
		)?;
		context.snapshot_after_change();
		Ok(Transition::Close)
	}
}

impl View for EditTaskView {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		match key.code {
			KeyCode::Esc => return Ok(Transition::Close),
			KeyCode::Tab => self.form.next_field(),
			KeyCode::BackTab => self.form.previous_field(),
			KeyCode::Enter => return self.save(context),
			_ => {
				self.form.handle_input(key);
			}
		}
		Ok(Transition::Stay)
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, _context: &AppContext) {
		let title = match &self.code {
			Some(code) => format!("Edit {code}"),
			None => "Edit task".to_string(),
		};
		render_form(frame, area, &title, &self.form);
	}

	fn before_focus(&mut self, context: &mut AppContext) -> Result<(), AppError> {
		self.form.reset();
		let code = self
			.code
			.as_deref()
			.ok_or_else(|| AppError::Validation("no task selected".to_string()))?;
		let task = context
			.ledger
			.task(code)
			.ok_or_else(|| AppError::Validation(format!("task {code} not found")))?;
		self.form.set_value(0, task.title.clone());
		self.form.set_value(1, task.tags.join(" "));
		Ok(())
	}

	fn clear_input(&mut self) {
		self.form.reset();
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		vec![
			KeyMap::new("^c", "Quit"),
			KeyMap::new("TAB", "Focus next field"),
			KeyMap::new("ENTER", "Save changes"),
			KeyMap::new("ESC", "Cancel"),
		]
	}
}

#[cfg(test)]
mod tests {
	use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

	use super::{CreateTaskView, EditTaskView};
	use crate::app::{AppContext, AppError, FakeBackup, context_with};
	use crate::ui::controller::{Transition, View};

	fn press(view: &mut dyn View, code: KeyCode, context: &mut AppContext) -> Result<Transition, AppError> {
		view.handle_key(KeyEvent::new(code, KeyModifiers::NONE), context)
	}

	fn type_text(view: &mut dyn View, text: &str, context: &mut AppContext) {
		for value in text.chars() {
			press(view, KeyCode::Char(value), context).expect("type");
		}
	}

	#[test]
	fn creates_a_task_from_the_form() {
		let (mut context, store) = context_with(&[]);
		let backup = FakeBackup::default();
		context.backup = Some(Box::new(backup.clone()));
		let mut view = CreateTaskView::new();
		view.before_focus(&mut context).expect("focus");

		type_text(&mut view, "ABC-1", &mut context);
		press(&mut view, KeyCode::Tab, &mut context).expect("tab");
		type_text(&mut view, "Write docs", &mut context);
		press(&mut view, KeyCode::Tab, &mut context).expect("tab");
		type_text(&mut view, "offline review offline", &mut context);

		let transition = press(&mut view, KeyCode::Enter, &mut context).expect("save");
		assert_eq!(transition, Transition::Close);
		assert_eq!(view.take_saved_code().as_deref(), Some("ABC-1"));

		let task = context.ledger.task("ABC-1").expect("task exists");
		assert_eq!(task.title, "Write docs");
		assert_eq!(task.tags, vec!["offline", "review"]);
		assert!(store.stored_task("ABC-1").is_some());
		assert_eq!(backup.state.borrow().created, 1);
	}

	#[test]
	fn missing_fields_keep_the_form_open() {
		let (mut context, _) = context_with(&[]);
		let mut view = CreateTaskView::new();
		type_text(&mut view, "ABC-1", &mut context);

		let err = press(&mut view, KeyCode::Enter, &mut context).expect_err("title missing");
		assert!(matches!(err, AppError::Validation(_)));
		assert!(context.ledger.is_empty());
		assert_eq!(view.form.fields()[1].error.as_deref(), Some("This field is required."));
	}

	#[test]
	fn rejects_codes_that_cannot_name_a_file() {
		let (mut context, _) = context_with(&[]);
		let mut view = CreateTaskView::new();
		view.form.set_value(0, "a/b");
		view.form.set_value(1, "title");

		assert!(press(&mut view, KeyCode::Enter, &mut context).is_err());
		assert!(context.ledger.is_empty());
	}

	#[test]
	fn duplicate_codes_are_reported() {
		let (mut context, _) = context_with(&["ABC-1"]);
		let mut view = CreateTaskView::new();
		view.form.set_value(0, "ABC-1");
		view.form.set_value(1, "again");

		let err = press(&mut view, KeyCode::Enter, &mut context).expect_err("duplicate");
		assert!(err.to_string().contains("ABC-1"));
		assert_eq!(context.ledger.tasks().len(), 1);
		assert!(view.take_saved_code().is_none());
	}

	#[test]
	fn edits_title_and_tags() {
		let (mut context, _) = context_with(&["a"]);
		context
			.ledger
			.update_task("a", "old".to_string(), vec!["x".to_string()])
			.expect("seed");
		let mut view = EditTaskView::new();
		view.set_task(Some("a".to_string()));
		view.before_focus(&mut context).expect("focus");
		assert_eq!(view.form.value(0), "old");
		assert_eq!(view.form.value(1), "x");

		type_text(&mut view, "er", &mut context);
		press(&mut view, KeyCode::BackTab, &mut context).expect("backtab");
		type_text(&mut view, " y", &mut context);
		let transition = press(&mut view, KeyCode::Enter, &mut context).expect("save");

		assert_eq!(transition, Transition::Close);
		let task = context.ledger.task("a").expect("task");
		assert_eq!(task.code, "a");
		assert_eq!(task.title, "older");
		assert_eq!(task.tags, vec!["x", "y"]);
	}

	#[test]
	fn editing_without_a_task_fails_to_focus() {
		let (mut context, _) = context_with(&[]);
		let mut view = EditTaskView::new();
		assert!(view.before_focus(&mut context).is_err());
		assert!(press(&mut view, KeyCode::Enter, &mut context).is_err());
	}
}
