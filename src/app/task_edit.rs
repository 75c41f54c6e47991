use chrono::{DateTime, Utc};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::app::error::{Error, Result};
use crate::app::models::{NewTask, Task, TaskChanges, TaskPatch};
use crate::app::object_store::Key;
use crate::app::task_list::TaskList;
use derivative::Derivative;

use super::ui::App;

const ID_LINE: usize = 0;
const TITLE_LINE: usize = 1;
const COMPLETED_LINE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

// State object for the task form
// Keeps track of the state of the form and the content of the task being edited
#[derive(Derivative)]
#[derivative(Default)]
pub struct TaskEditDialogState {
    pub dialog_active: bool,
    content: TaskEditDialogContent,
    error_message: Option<String>,
    // (char offset, line); starts on the title line
    #[derivative(Default(value = "(0, TITLE_LINE)"))]
    cursor_position: (usize, usize),
}

// Current content of the form
#[derive(Debug, Clone, Default)]
struct TaskEditDialogContent {
    id: String,
    title: String,
    completed: bool,
    // Id and completion time of the loaded task.
    // The time is kept only while the box stays checked and the id field still names that task.
    loaded_id: Option<Key>,
    completed_at: Option<DateTime<Utc>>,
}

// What a submit sends to the store
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFormData {
    pub id: Option<Key>,
    pub title: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskEditDialogState {
    // Opens the form in create mode
    pub fn create_a_new_task(&mut self) {
        self.reset();
        self.dialog_active = true;
    }

    // Opens the form with the content of an existing task
    pub fn edit_task(&mut self, task: &Task) {
        self.reset();
        self.dialog_active = true;
        self.content = TaskEditDialogContent {
            id: task.id.map(|id| id.to_string()).unwrap_or_default(),
            title: task.title.clone(),
            completed: task.is_completed(),
            loaded_id: task.id,
            completed_at: task.completed_at,
        };
        self.cursor_position = (self.content.title.chars().count(), TITLE_LINE);
    }

    // Clears every field and goes back to create mode
    pub fn reset(&mut self) {
        *self = TaskEditDialogState {
            dialog_active: self.dialog_active,
            ..TaskEditDialogState::default()
        };
    }

    pub fn close(&mut self) {
        self.reset();
        self.dialog_active = false;
    }

    // Edit mode whenever the id field holds a positive number
    pub fn mode(&self) -> FormMode {
        match self.id() {
            Some(_) => FormMode::Edit,
            None => FormMode::Create,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    fn id(&self) -> Option<Key> {
        self.content.id.trim().parse::<Key>().ok().filter(|id| *id > 0)
    }

    fn last_line(&self) -> usize {
        match self.mode() {
            FormMode::Edit => COMPLETED_LINE,
            FormMode::Create => TITLE_LINE,
        }
    }

    // The completed checkbox only exists in edit mode
    fn toggle_create_or_edit(&mut self) {
        if self.cursor_position.1 > self.last_line() {
            self.cursor_position = (0, self.last_line());
        }
    }

    // Move the cursor one line BELOW the current one.
    // The horizontal cursor position is preserved if possible
    pub fn move_cursor_down(&mut self) {
        let (x, y) = self.cursor_position;
        let y = (y + 1).min(self.last_line());
        self.cursor_position = (x.min(self.line_len(y)), y);
    }

    // Move the cursor one line ABOVE the current one.
    pub fn move_cursor_up(&mut self) {
        let (x, y) = self.cursor_position;
        let y = y.saturating_sub(1);
        self.cursor_position = (x.min(self.line_len(y)), y);
    }

    // Move the cursor one char LEFT to the current one.
    pub fn move_cursor_left(&mut self) {
        let (x, y) = self.cursor_position;
        self.cursor_position = (x.saturating_sub(1), y);
    }

    // Move the cursor one char RIGHT to the current one.
    pub fn move_cursor_right(&mut self) {
        let (x, y) = self.cursor_position;
        self.cursor_position = ((x + 1).min(self.line_len(y)), y);
    }

    // Delete the char before the cursor
    pub fn delete_char(&mut self) {
        let (x, y) = self.cursor_position;
        if x == 0 {
            return;
        }

        if let Some(field) = self.field_mut(y) {
            let at = byte_index(field, x - 1);
            field.remove(at);
        }
        self.move_cursor_left();

        if y == ID_LINE {
            self.toggle_create_or_edit();
        }
    }

    // Handles the input of a char by inserting it into the field under the cursor
    pub fn input(&mut self, to_insert: char) {
        let (x, y) = self.cursor_position;
        match y {
            ID_LINE if !to_insert.is_ascii_digit() => return,
            COMPLETED_LINE => {
                if to_insert == ' ' {
                    self.content.completed = !self.content.completed;
                }
                return;
            }
            _ => {}
        }

        if let Some(field) = self.field_mut(y) {
            let at = byte_index(field, x);
            field.insert(at, to_insert);
        }
        self.move_cursor_right();

        if y == ID_LINE {
            self.toggle_create_or_edit();
        }
    }

    // Reads the form. A blank title stops here, before anything reaches the store.
    pub fn extract_data(&self) -> Result<TaskFormData> {
        let title = self.content.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }

        let id = self.id();
        let completed_at = match (id, self.content.completed) {
            (Some(id), true) if Some(id) == self.content.loaded_id => {
                Some(self.content.completed_at.unwrap_or_else(Utc::now))
            }
            (Some(_), true) => Some(Utc::now()),
            _ => None,
        };

        Ok(TaskFormData {
            id,
            title: title.to_string(),
            completed_at,
        })
    }

    // Creates or updates the task, refreshes its list item and resets the form
    pub fn save_task(&mut self, list: &mut TaskList<'_>) -> Result<()> {
        let data = match self.extract_data() {
            Ok(data) => data,
            Err(e) => {
                self.error_message = Some(e.to_string());
                return Err(e);
            }
        };

        let tasks = list.tasks();
        match data.id {
            Some(id) => {
                let patch = TaskPatch {
                    title: Some(data.title),
                    completed_at: Some(data.completed_at),
                };
                tasks.update(id, TaskChanges::Merge(patch))?;
                if let Some(task) = tasks.find_by_key(id)? {
                    list.update_item(task);
                }
            }
            None => {
                let task = tasks.create(NewTask { title: data.title })?;
                list.create_new_item(task);
            }
        }

        self.close();
        Ok(())
    }

    fn field(&self, y_position: usize) -> &str {
        match y_position {
            ID_LINE => &self.content.id,
            TITLE_LINE => &self.content.title,
            _ => "",
        }
    }

    fn field_mut(&mut self, y_position: usize) -> Option<&mut String> {
        match y_position {
            ID_LINE => Some(&mut self.content.id),
            TITLE_LINE => Some(&mut self.content.title),
            _ => None,
        }
    }

    fn line_len(&self, y_position: usize) -> usize {
        self.field(y_position).chars().count()
    }
}

fn byte_index(value: &str, char_index: usize) -> usize {
    value
        .char_indices()
        .nth(char_index)
        .map(|(i, _)| i)
        .unwrap_or(value.len())
}

// Returns the UI content for the task form
pub fn get_task_edit_ui<'a>(app: &'a App<'a>) -> Vec<Line<'a>> {
    const GRAY_TEXT: Style = Style::new().fg(Color::Rgb(62, 62, 62));
    const WHITE_TEXT: Style = Style::new().fg(Color::White);
    const BLACK_ON_WHITE: Style = Style::new().fg(Color::Black).bg(Color::White);

    let state = &app.task_edit_dialog_state;
    let (cursor_x, cursor_y) = state.cursor_position;
    let mut text = Vec::new();

    let inputs = [
        ("Id:        ", "empty for a new task", state.field(ID_LINE)),
        ("Title:     ", "My task name", state.field(TITLE_LINE)),
    ];

    for (i, (prefix, placeholder, value)) in inputs.into_iter().enumerate() {
        let mut spans = vec![Span::styled(prefix, WHITE_TEXT)];

        if value.is_empty() {
            // Placeholder, with the first char highlighted on the active line
            if cursor_y == i {
                spans.push(Span::styled(placeholder.chars().take(1).collect::<String>(), BLACK_ON_WHITE));
                spans.push(Span::styled(placeholder.chars().skip(1).collect::<String>(), GRAY_TEXT));
            } else {
                spans.push(Span::styled(placeholder, GRAY_TEXT));
            }
        } else if cursor_y == i {
            spans.push(Span::styled(value.chars().take(cursor_x).collect::<String>(), WHITE_TEXT));
            let under_cursor: String = value.chars().skip(cursor_x).take(1).collect();
            spans.push(Span::styled(
                if under_cursor.is_empty() { " ".to_string() } else { under_cursor },
                BLACK_ON_WHITE,
            ));
            spans.push(Span::styled(value.chars().skip(cursor_x + 1).collect::<String>(), WHITE_TEXT));
        } else {
            spans.push(Span::styled(value, WHITE_TEXT));
        }

        text.push(Line::from(spans));
    }

    if state.mode() == FormMode::Edit {
        let checkbox = if state.content.completed { "[x]" } else { "[ ]" };
        let style = if cursor_y == COMPLETED_LINE { BLACK_ON_WHITE } else { WHITE_TEXT };
        text.push(Line::from(vec![
            Span::styled("Completed: ", WHITE_TEXT),
            Span::styled(checkbox, style),
        ]));
    }

    text.push(Line::raw(""));

    if let Some(error_message) = state.error_message() {
        text.push(Line::from(vec![Span::styled(
            error_message,
            Style::new().fg(Color::Red),
        )]));
        text.push(Line::raw(""));
    }

    text.push(Line::from(vec![Span::styled(
        "Enter - save, Esc - cancel, Space - toggle completed",
        WHITE_TEXT,
    )]));

    text
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::app::storage::{Database, DbConfig};
    use crate::app::tasks::{self, Tasks};

    fn setup_db() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        let db = Database::new(
            DbConfig {
                name: "todo_list".to_string(),
                path: temp.path().join("todo.db"),
                version: 1,
            },
            tasks::setup,
        );
        (temp, db)
    }

    fn type_text(form: &mut TaskEditDialogState, text: &str) {
        for c in text.chars() {
            form.input(c);
        }
    }

    #[test]
    fn test_blank_title_aborts_before_storage() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        let mut list = TaskList::with_items_from_storage(tasks).unwrap();

        let mut form = TaskEditDialogState::default();
        form.create_a_new_task();
        type_text(&mut form, "   ");

        let result = form.save_task(&mut list);
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(form.error_message(), Some("title is required"));
        assert!(form.dialog_active);
        assert!(tasks.find_all().unwrap().is_empty());
    }

    #[test]
    fn test_submit_creates_task() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        let mut list = TaskList::with_items_from_storage(tasks).unwrap();

        let mut form = TaskEditDialogState::default();
        form.create_a_new_task();
        assert_eq!(form.mode(), FormMode::Create);
        type_text(&mut form, "  Buy milk ");
        form.save_task(&mut list).unwrap();

        assert!(!form.dialog_active);
        assert_eq!(list.pending.items.len(), 1);
        let stored = tasks.find_all().unwrap();
        assert_eq!(stored[0].title, "Buy milk");
        assert_eq!(stored[0].completed_at, None);
    }

    #[test]
    fn test_submit_updates_task() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        let created = tasks
            .create(NewTask {
                title: "A".to_string(),
            })
            .unwrap();
        let mut list = TaskList::with_items_from_storage(tasks).unwrap();

        let mut form = TaskEditDialogState::default();
        form.edit_task(&created);
        assert_eq!(form.mode(), FormMode::Edit);
        form.delete_char();
        type_text(&mut form, "B");
        form.move_cursor_down();
        form.input(' ');
        form.save_task(&mut list).unwrap();

        let stored = tasks.find_by_key(created.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.title, "B");
        assert!(stored.completed_at.is_some());
        assert!(stored.updated_at.is_some());
        assert_eq!(stored.created_at, created.created_at);
        assert_eq!(list.completed.items, vec![stored]);
    }

    #[test]
    fn test_id_input_toggles_mode() {
        let mut form = TaskEditDialogState::default();
        form.create_a_new_task();
        form.move_cursor_up();

        form.input('x');
        assert_eq!(form.mode(), FormMode::Create);

        form.input('3');
        assert_eq!(form.mode(), FormMode::Edit);
        form.move_cursor_down();
        form.move_cursor_down();
        assert_eq!(form.cursor_position.1, COMPLETED_LINE);

        form.move_cursor_up();
        form.move_cursor_up();
        form.move_cursor_right();
        form.delete_char();
        assert_eq!(form.mode(), FormMode::Create);
    }

    #[test]
    fn test_completed_is_ignored_in_create_mode() {
        let mut form = TaskEditDialogState::default();
        form.create_a_new_task();
        type_text(&mut form, "A");

        let data = form.extract_data().unwrap();
        assert_eq!(
            data,
            TaskFormData {
                id: None,
                title: "A".to_string(),
                completed_at: None,
            }
        );
    }

    #[test]
    fn test_edit_keeps_existing_completion_time() {
        let completed_at = Utc::now();
        let task = Task {
            id: Some(4),
            title: "A".to_string(),
            created_at: completed_at,
            updated_at: None,
            completed_at: Some(completed_at),
        };

        let mut form = TaskEditDialogState::default();
        form.edit_task(&task);
        let data = form.extract_data().unwrap();
        assert_eq!(data.id, Some(4));
        assert_eq!(data.completed_at, Some(completed_at));
    }

    #[test]
    fn test_changed_id_does_not_carry_completion_time() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        for title in ["one", "two"] {
            tasks
                .create(NewTask {
                    title: title.to_string(),
                })
                .unwrap();
        }
        let old = "2020-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let one = tasks
            .update(
                1,
                TaskChanges::Merge(TaskPatch {
                    title: None,
                    completed_at: Some(Some(old)),
                }),
            )
            .unwrap();
        let mut list = TaskList::with_items_from_storage(tasks).unwrap();

        let mut form = TaskEditDialogState::default();
        form.edit_task(&one);
        form.move_cursor_up();
        form.move_cursor_right();
        form.delete_char();
        form.input('2');
        assert_eq!(form.mode(), FormMode::Edit);

        let before = Utc::now();
        form.save_task(&mut list).unwrap();

        let two = tasks.find_by_key(2).unwrap().unwrap();
        assert!(two.completed_at.is_some_and(|at| at >= before));
        assert_eq!(tasks.find_by_key(1).unwrap().unwrap().completed_at, Some(old));
        assert_eq!(list.get_completed_today().len(), 1);
    }

    #[test]
    fn test_multibyte_input() {
        let mut form = TaskEditDialogState::default();
        form.create_a_new_task();
        type_text(&mut form, "čaj");
        form.move_cursor_left();
        form.delete_char();
        assert_eq!(form.field(TITLE_LINE), "čj");
    }
}
