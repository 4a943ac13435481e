use chrono::{Days, Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::{AppContext, AppError};
use crate::domain::{format_clock, format_duration};
use crate::summary::generate_daily_summary;
use crate::ui::controller::{KeyMap, Mode, Transition, View};

pub const DAY_HEADER_FORMAT: &str = "%a, %-d %b %Y";

/// Daily totals for one local calendar day, today unless the user paged
/// away from it.
#[derive(Debug, Default)]
pub struct SummaryView {
	day: Option<NaiveDate>,
}

impl SummaryView {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn day(&self) -> NaiveDate {
		self.day.unwrap_or_else(|| Local::now().date_naive())
	}

	fn shift_day(&mut self, forward: bool) {
		let current = self.day();
		let shifted = if forward {
			current.checked_add_days(Days::new(1))
		} else {
			current.checked_sub_days(Days::new(1))
		};
		self.day = Some(shifted.unwrap_or(current));
	}
}

impl View for SummaryView {
	fn handle_key(&mut self, key: KeyEvent, context: &mut AppContext) -> Result<Transition, AppError> {
		if key.modifiers.contains(KeyModifiers::CONTROL) {
			return Ok(Transition::Stay);
		}
		match key.code {
			KeyCode::Esc | KeyCode::Char('q') => {
				self.day = None;
				Ok(Transition::Close)
			}
			KeyCode::Char('j') => {
				self.shift_day(true);
				Ok(Transition::Stay)
			}
			KeyCode::Char('k') => {
				self.shift_day(false);
				Ok(Transition::Stay)
			}
			KeyCode::Char('s') => {
				context.worklog_tracker()?;
				Ok(Transition::Switch(Mode::Sync))
			}
			_ => Ok(Transition::Stay),
		}
	}

	fn render(&mut self, frame: &mut Frame, area: Rect, context: &AppContext) {
		let day = self.day();
		let summary = generate_daily_summary(&context.ledger, day);

		let columns = Layout::default()
			.direction(Direction::Horizontal)
			.constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
			.split(area);

		let mut bookings = summary
			.bookings
			.iter()
			.map(|booking| {
				Line::from(format!(
					"{} - {} ({})",
					format_clock(booking.start),
					format_clock(booking.stop),
					booking.code
				))
			})
			.collect::<Vec<_>>();
		if bookings.is_empty() {
			bookings.push(Line::from(Span::styled(
				"no bookings on this day",
				Style::default().fg(Color::DarkGray),
			)));
		}
		let title = format!("Summary for {}", day.format(DAY_HEADER_FORMAT));
		let left = Paragraph::new(bookings).block(
			Block::default()
				.borders(Borders::ALL)
				.title(Span::styled(title, Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD))),
		);
		frame.render_widget(left, columns[0]);

		let mut totals = summary
			.totals
			.iter()
			.map(|(code, duration)| Line::from(format!("{code}: {}", format_duration(*duration))))
			.collect::<Vec<_>>();
		totals.push(Line::default());
		totals.push(Line::from(vec![
			Span::styled("Total: ", Style::default().add_modifier(Modifier::BOLD)),
			Span::raw(format_duration(summary.total)),
		]));
		let right = Paragraph::new(totals).block(Block::default().borders(Borders::ALL).title("Totals"));
		frame.render_widget(right, columns[1]);
	}

	fn key_mapping(&self) -> Vec<KeyMap> {
		vec![
			KeyMap::new("^c", "Quit"),
			KeyMap::new("j", "Next day"),
			KeyMap::new("k", "Previous day"),
			KeyMap::new("s", "Sync"),
			KeyMap::new("q/ESC", "Back"),
		]
	}
}
