use chrono::{Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use tracing::{info, warn};

use crate::app::{AppContext, AppError};
use crate::domain::{OFFLINE_TAG, format_clock};
use crate::summary::{TaskBooking, generate_daily_summary};
use crate::ui::controller::{KeyMap, Mode, Transition, View};
use crate::ui::day_summary::DAY_HEADER_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
	Pending,
	Done,
	Skipped,
	Failed,
}

impl SyncStatus {
	fn label(self) -> &'static str {
		match self {
			SyncStatus::Pending => "",
			SyncStatus::Done => "done",
			SyncStatus::Skipped => "skipped",
			SyncStatus::Failed => "error",
		}
	}

	fn style(self) -> Style {
		match self {
			SyncStatus::Done => Style::default().fg(Color::Green),
			SyncStatus::Skipped => Style::default().fg(Color::Yellow),
			SyncStatus::Failed => Style::default().fg(Color::LightRed),
			SyncStatus::Pending => Style::default(),
		}
	}
}

/// Replaces the tracker's worklogs for one day with the day's closed
/// bookings. Bookings of offline tasks are listed but never sent.
#[derive(Debug)]
pub struct SyncView {
	day: NaiveDate,
	online: Vec<(TaskBooking, SyncStatus)>,
	offline: Vec<TaskBooking>,
}

impl Default for SyncView {
	fn default() -> Self {
		Self {
			day: Local::now().date_naive(),
			online: Vec::new(),
			offline: Vec::new(),
		}
	}
}

impl SyncView {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_day(&mut self, day: NaiveDate) {
		self.day = day;
	}

	#[cfg(test)]
	pub fn statuses(&self) -> Vec<(&str, SyncStatus)> {
		self.online
			.iter()
			.map(|(booking, status)| (booking.code.as_str(), *status))
			.collect()
	}

	fn synchronize(&mut self, context: &AppContext) -> Result<(), AppError> {
		let tracker = context.worklog_tracker()?;
		info!(day = %self.day, bookings = self.online.len(), "synchronizing worklogs");
		tracker.remove_logs_for_date(self.day)?;

		for (booking, status) in &mut self.online {
			let (Some(start), Some(duration)) = (booking.start, booking.duration()) else {
				*status = SyncStatus::Skipped;
				continue;
			};
			if let Err(err) = tracker.add_worklog(&booking.code, start, duration) {
				warn!(code = %booking.code, error = %err, "worklog was not added");
				*status = SyncStatus::Failed;
				return Err(err.into());
			}
			*status = SyncStatus::Done;
		}
		Ok(())
	}
}

impl View for SyncView {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		if key.modifiers.contains(KeyModifiers::CONTROL) {
			return Ok(Transition::Stay);
		}
		match key.code {
			KeyCode::Esc | KeyCode::Char('q') => Ok(Transition::Switch(Mode::Summary)),
			KeyCode::Char('s') => {
				self.synchronize(context)?;
				Ok(Transition::Stay)
			}
			_ => Ok(Transition::Stay),
		}
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, _context: &AppContext) {
		let width = self
			.online
			.iter()
			.map(|(_, status)| status.label().len())
			.max()
			.unwrap_or(0);

		let mut lines = self
			.online
			.iter()
			.map(|(booking, status)| {
				Line::from(vec![
					Span::raw("["),
					Span::styled(format!("{:>width$}", status.label()), status.style()),
					Span::raw(format!(
						"] {} - {}: {}",
						format_clock(booking.start),
						format_clock(booking.stop),
						booking.code
					)),
				])
			})
			.collect::<Vec<_>>();

		if !self.offline.is_empty() {
			lines.push(Line::default());
			lines.push(Line::from(Span::styled(
				"Offline bookings:",
				Style::default().add_modifier(Modifier::BOLD),
			)));
			lines.extend(self.offline.iter().map(|booking| {
				Line::from(format!(
					"{} - {}: {}",
					format_clock(booking.start),
					format_clock(booking.stop),
					booking.code
				))
			}));
		}

		let title = format!("Synchronizing tasks for {} with JIRA", self.day.format(DAY_HEADER_FORMAT));
		let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
		frame.render_widget(panel, area);
	}

	fn before_focus(&mut self, context: &mut AppContext) -> Result<(), AppError> {
		let summary = generate_daily_summary(&context.ledger, self.day);
		self.online.clear();
		self.offline.clear();
		for booking in summary.bookings {
			let offline = context
				.ledger
				.task(&booking.code)
				.is_some_and(|task| task.has_tag(OFFLINE_TAG));
			if offline {
				self.offline.push(booking);
			} else {
				self.online.push((booking, SyncStatus::Pending));
			}
		}
		Ok(())
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		vec![
			KeyMap::new("^c", "Quit"),
			KeyMap::new("s", "Start"),
			KeyMap::new("q/ESC", "Cancel"),
		]
	}
}
