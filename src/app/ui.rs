use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{prelude::*, widgets::*};
use std::{
    io,
    time::{Duration, Instant},
};

use crate::app::error::Result;
use crate::app::models::Task;
use crate::app::tasks::Tasks;
use crate::app::{task_edit::*, task_list::*};

pub struct App<'a> {
    pub items: TaskList<'a>,
    pub task_edit_dialog_state: TaskEditDialogState,
}

impl<'a> App<'a> {
    // Loads every stored task into the lists
    pub fn new(tasks: Tasks<'a>) -> Result<App<'a>> {
        Ok(App {
            items: TaskList::with_items_from_storage(tasks)?,
            task_edit_dialog_state: TaskEditDialogState::default(),
        })
    }

    // Returns false when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return true;
        }

        if self.task_edit_dialog_state.dialog_active {
            // Handle input for the task form
            let form = &mut self.task_edit_dialog_state;
            match key.code {
                KeyCode::Down => form.move_cursor_down(),
                KeyCode::Up => form.move_cursor_up(),
                KeyCode::Esc => form.close(),
                KeyCode::Enter => log_failure("save task", form.save_task(&mut self.items)),
                KeyCode::Left => form.move_cursor_left(),
                KeyCode::Right => form.move_cursor_right(),
                KeyCode::Backspace => form.delete_char(),
                KeyCode::Char(to_insert) => form.input(to_insert),
                _ => {}
            }
        } else {
            // Handle input for the task list navigation and state change
            match key.code {
                KeyCode::Char('q') => return false,
                KeyCode::Char('x') => log_failure("delete task", self.items.delete_selected()),
                KeyCode::Left => self.items.unselect(),
                KeyCode::Down => self.items.next(),
                KeyCode::Up => self.items.previous(),
                KeyCode::Tab => self.items.switch_focus(),
                KeyCode::Char('a') => self.task_edit_dialog_state.create_a_new_task(),
                KeyCode::Char('e') => self.edit_selected(),
                KeyCode::Enter | KeyCode::Char(' ') => {
                    log_failure("toggle task", self.items.toggle_completed())
                }
                _ => {}
            }
        }
        true
    }

    // Loads the selected task from the store into the form
    fn edit_selected(&mut self) {
        let Some(id) = self.items.get_selected().and_then(|task| task.id) else {
            return;
        };
        match self.items.tasks().find_by_key(id) {
            Ok(Some(task)) => self.task_edit_dialog_state.edit_task(&task),
            Ok(None) => log::warn!("Task {id} is gone from the store"),
            Err(e) => log::error!("Failed to load task {id}: {e}"),
        }
    }
}

// Store failures leave the UI as it was; they only go to the log
fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        log::error!("Failed to {what}: {e}");
    }
}

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| draw_ui(f, &mut app))?;
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if !app.handle_key(key) {
                    return Ok(());
                }
            }
        }
        advance_tick(&mut last_tick, tick_rate);
    }
}

// Starts a new tick once the current one has run out, so the next poll waits again
fn advance_tick(last_tick: &mut Instant, tick_rate: Duration) -> bool {
    if last_tick.elapsed() >= tick_rate {
        *last_tick = Instant::now();
        return true;
    }
    false
}

// Draws the whole user interface
fn draw_ui(f: &mut Frame, app: &mut App) {
    // Create two chunks of screen in 60-40 ratio
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(f.size());

    // DRAW LEFT PART
    // Pending tasks on top, completed tasks below
    let lists = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    let focus = app.items.focus;
    let pending = task_list_widget(&app.items.pending.items, "Pending", focus == Column::Pending);
    let completed = task_list_widget(
        &app.items.completed.items,
        "Completed",
        focus == Column::Completed,
    );

    f.render_stateful_widget(pending, lists[0], &mut app.items.pending.state);
    f.render_stateful_widget(completed, lists[1], &mut app.items.completed.state);

    // DRAW RIGHT PART
    if app.task_edit_dialog_state.dialog_active {
        let title = match app.task_edit_dialog_state.mode() {
            FormMode::Create => "Add Task",
            FormMode::Edit => "Edit Task",
        };
        let form = Paragraph::new(get_task_edit_ui(app))
            .block(Block::new().title(title).borders(Borders::ALL))
            .style(Style::new().white());

        f.render_widget(form, chunks[1]);
    } else {
        // If not editing, display instructions and statistics in vertically split layout
        let right_side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        let instructions = Paragraph::new(get_instructions_ui())
            .block(Block::new().title("Commands").borders(Borders::ALL))
            .style(Style::new().white());

        let statistics = Paragraph::new(get_statistics_ui(app))
            .block(Block::new().title("Statistics").borders(Borders::ALL))
            .style(Style::new().white());

        f.render_widget(instructions, right_side[0]);
        f.render_widget(statistics, right_side[1]);
    }
}

fn task_list_widget<'a>(items: &'a [Task], title: &'a str, focused: bool) -> List<'a> {
    let border = if focused {
        Style::default().fg(Color::LightGreen)
    } else {
        Style::default()
    };

    List::new(get_list_items_ui(items))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ")
}
