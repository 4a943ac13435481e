mod controller;
mod day_summary;
mod form;
mod selection;
mod snapshots;
mod sync;
mod task_form;
mod task_list;

use std::error::Error;
use std::io;

use crossterm::event::{self, Event as CEvent, KeyEventKind};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::info;

use crate::app::AppContext;
use controller::ModeController;
use selection::{Labeled, SelectionWindow};

const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn run_dashboard(context: &mut AppContext) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, context);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	context: &mut AppContext,
) -> Result<(), Box<dyn Error>> {
	let mut controller = ModeController::new(context);
	info!("dashboard started");

	loop {
		terminal.draw(|frame| controller.render(frame, context))?;

		if let CEvent::Key(key) = event::read()? {
			if key.kind != KeyEventKind::Press {
				continue;
			}
			if !controller.handle_key(key, context) {
				break;
			}
		}
	}

	info!("dashboard closed");
	Ok(())
}

/// Draws the visible slice of `window` inside a bordered panel, with the
/// page indicator on the last inner row.
fn render_window<T: Labeled>(
	frame: &mut Frame,
	area: Rect,
	title: &str,
	window: &mut SelectionWindow<T>,
	row_style: impl Fn(&T) -> Style,
) {
	let block = Block::default().borders(Borders::ALL).title(title.to_string());
	let inner = block.inner(area);
	window.update_area(usize::from(inner.height));

	let selected = window.selected_index();
	let mut lines = window
		.visible()
		.map(|(index, item)| {
			let mut style = row_style(item);
			if Some(index) == selected {
				style = style.bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD);
			}
			Line::from(Span::styled(item.label(), style))
		})
		.collect::<Vec<_>>();
	if window.is_empty() {
		lines.push(Line::from(Span::styled("(empty)", Style::default().fg(Color::DarkGray))));
	}
	while lines.len() < window.window_size() {
		lines.push(Line::default());
	}
	lines.push(Line::from(Span::styled(
		window.pager(),
		Style::default().fg(Color::DarkGray),
	)));

	frame.render_widget(Paragraph::new(lines).block(block), area);
}
