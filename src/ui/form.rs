use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::AppError;

const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone)]
pub struct Field {
	pub label: &'static str,
	pub value: String,
	pub required: bool,
	pub error: Option<String>,
}

impl Field {
	pub fn required(label: &'static str) -> Self {
		Self {
			label,
			value: String::new(),
			required: true,
			error: None,
		}
	}

	pub fn optional(label: &'static str) -> Self {
		Self {
			required: false,
			..Self::required(label)
		}
	}
}

/// A fixed set of single-line text fields with one focused field.
#[derive(Debug, Clone)]
pub struct Form {
	fields: Vec<Field>,
	focused: usize,
}

impl Form {
	pub fn new(fields: Vec<Field>) -> Self {
		Self { fields, focused: 0 }
	}

	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	pub fn focused(&self) -> usize {
		self.focused
	}

	pub fn next_field(&mut self) {
		if !self.fields.is_empty() {
			self.focused = (self.focused + 1) % self.fields.len();
		}
	}

	pub fn previous_field(&mut self) {
		if !self.fields.is_empty() {
			self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
		}
	}

	pub fn value(&self, index: usize) -> &str {
		self.fields
			.get(index)
			.map(|field| field.value.as_str())
			.unwrap_or_default()
	}

	pub fn set_value(&mut self, index: usize, value: impl Into<String>) {
		if let Some(field) = self.fields.get_mut(index) {
			field.value = value.into();
		}
	}

	/// Empties every field and moves focus back to the first one.
	pub fn reset(&mut self) {
		for field in &mut self.fields {
			field.value.clear();
			field.error = None;
		}
		self.focused = 0;
	}

	/// Feeds typing keys into the focused field. Returns false for keys a
	/// form does not consume.
	pub fn handle_input(&mut self, key: KeyEvent) -> bool {
		let Some(field) = self.fields.get_mut(self.focused) else {
			return false;
		};
		match key.code {
			KeyCode::Char(value) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
				field.value.push(value);
				true
			}
			KeyCode::Backspace => {
				field.value.pop();
				true
			}
			_ => false,
		}
	}

	/// Marks every empty required field. The returned error names the first
	/// failing field.
	pub fn validate(&mut self) -> Result<(), AppError> {
		let mut first_failure = None;
		for field in &mut self.fields {
			if field.required && field.value.trim().is_empty() {
				field.error = Some(REQUIRED_MESSAGE.to_string());
				if first_failure.is_none() {
					first_failure = Some(field.label);
				}
			} else {
				field.error = None;
			}
		}

		match first_failure {
			Some(label) => Err(AppError::Validation(format!("{label}: {REQUIRED_MESSAGE}"))),
			None => Ok(()),
		}
	}

	pub fn set_error(&mut self, index: usize, message: impl Into<String>) {
		if let Some(field) = self.fields.get_mut(index) {
			field.error = Some(message.into());
		}
	}
}

pub fn render_form(frame: &mut Frame, area: Rect, title: &str, form: &Form) {
	let mut lines = Vec::new();
	for (index, field) in form.fields().iter().enumerate() {
		let focused = index == form.focused();
		let label_style = if focused {
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
		} else {
			Style::default().add_modifier(Modifier::BOLD)
		};
		let marker = if field.required { "*" } else { " " };
		let cursor = if focused { "_" } else { "" };

		lines.push(Line::from(vec![
			Span::styled(format!("{}{marker}: ", field.label), label_style),
			Span::raw(format!("{}{cursor}", field.value)),
		]));
		if let Some(error) = &field.error {
			lines.push(Line::from(Span::styled(
				format!("  {error}"),
				Style::default().fg(Color::LightRed),
			)));
		}
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title.to_string()));
	frame.render_widget(panel, area);
}

#[cfg(test)]
mod tests {
	use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

	use super::{Field, Form};
	use crate::app::AppError;

	fn form() -> Form {
		Form::new(vec![
			Field::required("Code"),
			Field::required("Title"),
			Field::optional("Tags"),
		])
	}

	fn type_text(form: &mut Form, text: &str) {
		for value in text.chars() {
			form.handle_input(KeyEvent::new(KeyCode::Char(value), KeyModifiers::NONE));
		}
	}

	#[test]
	fn focus_wraps_in_both_directions() {
		let mut form = form();
		form.previous_field();
		assert_eq!(form.focused(), 2);
		form.next_field();
		assert_eq!(form.focused(), 0);
		form.next_field();
		assert_eq!(form.focused(), 1);
	}

	#[test]
	fn typing_goes_to_the_focused_field() {
		let mut form = form();
		type_text(&mut form, "AB");
		form.handle_input(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
		form.next_field();
		type_text(&mut form, "title");
		assert!(!form.handle_input(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL)));

		assert_eq!(form.value(0), "A");
		assert_eq!(form.value(1), "title");
		assert_eq!(form.value(2), "");
	}

	#[test]
	fn validation_marks_missing_required_fields() {
		let mut form = form();
		form.set_value(1, "title");

		let err = form.validate().expect_err("code is missing");
		assert!(matches!(err, AppError::Validation(message) if message.starts_with("Code")));
		assert_eq!(form.fields()[0].error.as_deref(), Some("This field is required."));
		assert!(form.fields()[1].error.is_none());
		assert!(form.fields()[2].error.is_none());

		form.set_value(0, "ABC-1");
		form.validate().expect("form is complete");
		assert!(form.fields().iter().all(|field| field.error.is_none()));
	}

	#[test]
	fn reset_clears_values_errors_and_focus() {
		let mut form = form();
		form.next_field();
		type_text(&mut form, "x");
		let _ = form.validate();
		form.reset();

		assert_eq!(form.focused(), 0);
		assert!(form.fields().iter().all(|field| field.value.is_empty() && field.error.is_none()));
	}
}
