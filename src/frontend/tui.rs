//! Terminal front-end: a command entry with history, one gauge per input
//! slider, the output labels and a scrolling log.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::debug;

use super::FrontEnd;

const FINE_STEP: i32 = 1;
const COARSE_STEP: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Command,
    Slider(usize),
}

/// Key handling and drawing state around a [`FrontEnd`].
#[derive(Debug)]
pub struct TuiApp {
    buffer: String,
    history: Vec<String>,
    history_pos: Option<usize>,
    focus: Focus,
    should_quit: bool,
}

impl Default for TuiApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiApp {
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            history: Vec::new(),
            history_pos: None,
            focus: Focus::Command,
            should_quit: false,
        }
    }

    pub const fn focus(&self) -> Focus {
        self.focus
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub const fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn handle_key(&mut self, front_end: &mut FrontEnd, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::F(2) => {
                if front_end.add_input_node().is_ok() {
                    self.focus = Focus::Slider(front_end.inputs().len() - 1);
                }
            }
            KeyCode::F(3) => {
                let _ = front_end.add_output_node();
            }
            KeyCode::Tab => self.cycle_focus(front_end.inputs().len()),
            _ => match self.focus {
                Focus::Command => self.handle_command_key(front_end, key.code),
                Focus::Slider(index) => Self::handle_slider_key(front_end, index, key.code),
            },
        }
    }

    fn cycle_focus(&mut self, sliders: usize) {
        self.focus = match self.focus {
            Focus::Command if sliders > 0 => Focus::Slider(0),
            Focus::Slider(index) if index + 1 < sliders => Focus::Slider(index + 1),
            _ => Focus::Command,
        };
    }

    fn handle_command_key(&mut self, front_end: &mut FrontEnd, code: KeyCode) {
        match code {
            KeyCode::Enter => {
                let command = self.buffer.trim().to_string();
                self.buffer.clear();
                self.history_pos = None;
                if command.is_empty() {
                    return;
                }
                front_end.submit_command(&command);
                if self.history.last() != Some(&command) {
                    self.history.push(command);
                }
            }
            KeyCode::Char(c) => self.buffer.push(c),
            KeyCode::Backspace => {
                self.buffer.pop();
            }
            KeyCode::Up => self.history_back(),
            KeyCode::Down => self.history_forward(),
            _ => {}
        }
    }

    fn handle_slider_key(front_end: &mut FrontEnd, index: usize, code: KeyCode) {
        let delta = match code {
            KeyCode::Left => -FINE_STEP,
            KeyCode::Right => FINE_STEP,
            KeyCode::PageDown => -COARSE_STEP,
            KeyCode::PageUp => COARSE_STEP,
            KeyCode::Home => {
                front_end.set_input(index, 0);
                return;
            }
            KeyCode::End => {
                front_end.set_input(index, front_end.slider_max());
                return;
            }
            _ => return,
        };
        front_end.nudge_input(index, delta);
    }

    fn history_back(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let pos = self.history_pos.map_or(self.history.len() - 1, |pos| pos.saturating_sub(1));
        self.history_pos = Some(pos);
        self.buffer.clone_from(&self.history[pos]);
    }

    fn history_forward(&mut self) {
        match self.history_pos {
            Some(pos) if pos + 1 < self.history.len() => {
                self.history_pos = Some(pos + 1);
                self.buffer.clone_from(&self.history[pos + 1]);
            }
            Some(_) => {
                self.history_pos = None;
                self.buffer.clear();
            }
            None => {}
        }
    }

    pub fn draw(&self, frame: &mut Frame<'_>, front_end: &FrontEnd) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.draw_command(frame, rows[0]);
        self.draw_sliders(frame, rows[1], front_end);
        draw_outputs(frame, rows[2], front_end);
        draw_log(frame, rows[3], front_end);

        let help = Paragraph::new(Line::from(vec![
            Span::styled("F2", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" add input  "),
            Span::styled("F3", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" add output  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" focus  "),
            Span::styled("←/→ PgUp/PgDn", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" adjust  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(" quit  [{} mode]", front_end.mode())),
        ]));
        frame.render_widget(help, rows[4]);
    }

    fn draw_command(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Command;
        let block = Block::default()
            .title("Command")
            .borders(Borders::ALL)
            .border_style(focus_style(focused));
        let input = Paragraph::new(format!("> {}", self.buffer)).block(block);
        frame.render_widget(input, area);
        if focused {
            let width = u16::try_from(self.buffer.len() + 2).unwrap_or(u16::MAX);
            frame.set_cursor_position((area.x.saturating_add(1).saturating_add(width), area.y + 1));
        }
    }

    fn draw_sliders(&self, frame: &mut Frame<'_>, area: Rect, front_end: &FrontEnd) {
        let inputs = front_end.inputs();
        if inputs.is_empty() {
            let empty = Paragraph::new("no input nodes (F2 adds one)")
                .block(Block::default().title("Inputs").borders(Borders::ALL));
            frame.render_widget(empty, area);
            return;
        }
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(inputs.iter().map(|_| Constraint::Fill(1)))
            .split(area);
        let max = f64::from(front_end.slider_max().max(1));
        for (index, (control, column)) in inputs.iter().zip(columns.iter()).enumerate() {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(self.focus == Focus::Slider(index)));
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(Color::Green))
                .ratio((f64::from(control.value()) / max).clamp(0.0, 1.0))
                .label(control.label());
            frame.render_widget(gauge, *column);
        }
    }
}

fn draw_outputs(frame: &mut Frame<'_>, area: Rect, front_end: &FrontEnd) {
    let labels: Vec<Span<'_>> = front_end
        .outputs()
        .iter()
        .map(|control| Span::styled(format!("{}   ", control.label()), Style::default().fg(Color::Yellow)))
        .collect();
    let text = if labels.is_empty() {
        Line::from("no output nodes (F3 adds one)")
    } else {
        Line::from(labels)
    };
    let outputs = Paragraph::new(text).block(Block::default().title("Outputs").borders(Borders::ALL));
    frame.render_widget(outputs, area);
}

fn draw_log(frame: &mut Frame<'_>, area: Rect, front_end: &FrontEnd) {
    let visible = usize::from(area.height.saturating_sub(2));
    let lines = front_end.log().lines();
    let start = lines.len().saturating_sub(visible);
    let items: Vec<ListItem<'_>> = lines[start..]
        .iter()
        .map(|line| {
            let style = if line.starts_with("Error: ")
                || (line.starts_with("Return Code:") && line != "Return Code:0")
            {
                Style::default().fg(Color::Red)
            } else if line.starts_with("Return ") {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            ListItem::new(Line::styled(line.as_str(), style))
        })
        .collect();
    let log = List::new(items).block(Block::default().title("Log").borders(Borders::ALL));
    frame.render_widget(log, area);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

/// Takes over the terminal until the user quits.
pub fn run(front_end: &mut FrontEnd) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter the alternate screen")?;
    let mut terminal: Terminal<CrosstermBackend<Stdout>> = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = TuiApp::new();
    let result = event_loop(&mut app, &mut terminal, front_end);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

fn event_loop<B: Backend>(app: &mut TuiApp, terminal: &mut Terminal<B>, front_end: &mut FrontEnd) -> Result<()> {
    while !app.should_quit() {
        terminal.draw(|frame| app.draw(frame, front_end))?;
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(front_end, key);
            }
        }
    }
    debug!("leaving terminal front-end");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::{Focus, TuiApp};
    use crate::bridge::{BridgeSession, InputMode};
    use crate::frontend::FrontEnd;

    fn front_end() -> FrontEnd {
        let session = BridgeSession::new(Rc::new(emfrp_engine::library()), InputMode::Pull)
            .expect("engine starts");
        FrontEnd::new(session, 100_000)
    }

    fn press(app: &mut TuiApp, front_end: &mut FrontEnd, code: KeyCode) {
        app.handle_key(front_end, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_line(app: &mut TuiApp, front_end: &mut FrontEnd, text: &str) {
        for c in text.chars() {
            press(app, front_end, KeyCode::Char(c));
        }
        press(app, front_end, KeyCode::Enter);
    }

    #[test]
    fn keys_drive_sliders_and_commands() {
        let mut ui = front_end();
        let mut app = TuiApp::new();
        press(&mut app, &mut ui, KeyCode::F(2));
        press(&mut app, &mut ui, KeyCode::F(3));
        assert_eq!(app.focus(), Focus::Slider(0));

        press(&mut app, &mut ui, KeyCode::Tab);
        assert_eq!(app.focus(), Focus::Command);
        type_line(&mut app, &mut ui, "node out0 = in0 - 1");
        assert!(app.buffer().is_empty());

        press(&mut app, &mut ui, KeyCode::Tab);
        press(&mut app, &mut ui, KeyCode::PageUp);
        press(&mut app, &mut ui, KeyCode::Right);
        assert_eq!(ui.inputs()[0].value(), 1001);
        assert_eq!(ui.outputs()[0].value(), 1000);

        press(&mut app, &mut ui, KeyCode::Esc);
        assert!(app.should_quit());
    }

    #[test]
    fn history_recalls_previous_commands() {
        let mut ui = front_end();
        let mut app = TuiApp::new();
        type_line(&mut app, &mut ui, "1 + 1");
        type_line(&mut app, &mut ui, "2 * 3");
        press(&mut app, &mut ui, KeyCode::Up);
        assert_eq!(app.buffer(), "2 * 3");
        press(&mut app, &mut ui, KeyCode::Up);
        assert_eq!(app.buffer(), "1 + 1");
        press(&mut app, &mut ui, KeyCode::Down);
        press(&mut app, &mut ui, KeyCode::Down);
        assert_eq!(app.buffer(), "");
    }

    #[test]
    fn draws_labels_and_log() {
        let mut ui = front_end();
        let mut app = TuiApp::new();
        press(&mut app, &mut ui, KeyCode::F(2));
        press(&mut app, &mut ui, KeyCode::F(3));
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).expect("test backend");
        terminal.draw(|frame| app.draw(frame, &ui)).expect("draw");

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("in0 : 0"));
        assert!(screen.contains("out0 : 0"));
        assert!(screen.contains("Return Code:0"));
    }
}
