use chrono::{DateTime, Local, Utc};
use now::DateTimeNow;
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};

use ratatui::widgets::*;

use crate::app::error::Result;
use crate::app::models::{Task, TaskChanges, TaskPatch};
use crate::app::object_store::Key;
use crate::app::tasks::Tasks;

use super::ui::App;

// Which of the two lists has the keyboard focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Pending,
    Completed,
}

#[derive(Default)]
pub struct TaskColumn {
    pub state: ListState,
    pub items: Vec<Task>,
}

impl TaskColumn {
    // Move the selection to the next item, wrapping around
    fn next(&mut self) {
        let i = match self.state.selected() {
            Some(i) if !self.items.is_empty() && i < self.items.len() - 1 => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    // Move the selection to the previous item, wrapping around
    fn previous(&mut self) {
        let i = match self.state.selected() {
            Some(0) | None => self.items.len().saturating_sub(1),
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn selected(&self) -> Option<&Task> {
        self.state.selected().and_then(|i| self.items.get(i))
    }

    fn position(&self, id: Key) -> Option<usize> {
        self.items.iter().position(|task| task.id == Some(id))
    }

    // Keep the selection inside the list after an item went away
    fn clamp_selection(&mut self) {
        match self.state.selected() {
            Some(_) if self.items.is_empty() => self.state.select(None),
            Some(i) if i >= self.items.len() => self.state.select(Some(self.items.len() - 1)),
            _ => {}
        }
    }

    fn remove(&mut self, id: Key) -> bool {
        match self.position(id) {
            Some(i) => {
                self.items.remove(i);
                self.clamp_selection();
                true
            }
            None => false,
        }
    }
}

// The two task lists shown on the left. Items are display copies; the store keeps the real ones.
pub struct TaskList<'a> {
    pub pending: TaskColumn,
    pub completed: TaskColumn,
    pub focus: Column,
    tasks: Tasks<'a>,
}

impl<'a> TaskList<'a> {
    // Initialize both lists with every task from the database
    pub fn with_items_from_storage(tasks: Tasks<'a>) -> Result<TaskList<'a>> {
        let mut list = TaskList {
            pending: TaskColumn::default(),
            completed: TaskColumn::default(),
            focus: Column::Pending,
            tasks,
        };
        for task in tasks.find_all()? {
            list.create_new_item(task);
        }
        Ok(list)
    }

    pub fn tasks(&self) -> Tasks<'a> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.pending.items.len() + self.completed.items.len()
    }

    // Append a task to the list matching its completion state
    pub fn create_new_item(&mut self, task: Task) {
        self.column_for_mut(&task).items.push(task);
    }

    // Replace the displayed copy of a task, moving it to the other list if needed
    pub fn update_item(&mut self, task: Task) {
        if let Some(id) = task.id {
            self.delete_item(id);
        }
        self.create_new_item(task);
    }

    pub fn delete_item(&mut self, id: Key) {
        if !self.pending.remove(id) {
            self.completed.remove(id);
        }
    }

    pub fn next(&mut self) {
        self.focused_mut().next();
    }

    pub fn previous(&mut self) {
        self.focused_mut().previous();
    }

    pub fn unselect(&mut self) {
        self.focused_mut().state.select(None);
    }

    // Move the keyboard focus to the other list
    pub fn switch_focus(&mut self) {
        self.unselect();
        self.focus = match self.focus {
            Column::Pending => Column::Completed,
            Column::Completed => Column::Pending,
        };
        if !self.focused().items.is_empty() {
            self.focused_mut().state.select(Some(0));
        }
    }

    // Get the selected task of the focused list
    pub fn get_selected(&self) -> Option<&Task> {
        self.focused().selected()
    }

    fn selected_id(&self) -> Option<Key> {
        self.get_selected().and_then(|task| task.id)
    }

    // Flip the completion of the selected task; Save in database; Move it to the other list.
    pub fn toggle_completed(&mut self) -> Result<()> {
        let Some(task) = self.get_selected() else {
            return Ok(());
        };
        let Some(id) = task.id else {
            return Ok(());
        };
        let completed = !task.is_completed();

        self.tasks
            .update(id, TaskChanges::Merge(TaskPatch::completed(completed)))?;
        if let Some(task) = self.tasks.find_by_key(id)? {
            self.update_item(task);
        }
        Ok(())
    }

    // Delete the selected task from database; Remove it from the list
    pub fn delete_selected(&mut self) -> Result<()> {
        if let Some(id) = self.selected_id() {
            self.tasks.delete(id)?;
            self.delete_item(id);
        }
        Ok(())
    }

    // Get the tasks completed since the start of today
    pub fn get_completed_today(&self) -> Vec<&Task> {
        let today = Utc::now().beginning_of_day();
        self.completed
            .items
            .iter()
            .filter(|task| task.completed_at.is_some_and(|at| at >= today))
            .collect()
    }

    fn focused(&self) -> &TaskColumn {
        match self.focus {
            Column::Pending => &self.pending,
            Column::Completed => &self.completed,
        }
    }

    fn focused_mut(&mut self) -> &mut TaskColumn {
        match self.focus {
            Column::Pending => &mut self.pending,
            Column::Completed => &mut self.completed,
        }
    }

    fn column_for_mut(&mut self, task: &Task) -> &mut TaskColumn {
        if task.is_completed() {
            &mut self.completed
        } else {
            &mut self.pending
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%d.%m.%Y %H:%M").to_string()
}

// Build the UI (list) for one task column
pub fn get_list_items_ui(tasks: &[Task]) -> Vec<ListItem<'_>> {
    tasks
        .iter()
        .map(|task| {
            let title_style = if task.is_completed() {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(Color::White)
            };

            let mut dates = vec![Span::from(format!(
                "    Created: {}",
                format_date(&task.created_at)
            ))];
            if let Some(updated_at) = &task.updated_at {
                dates.push(Span::from(format!(" Updated: {}", format_date(updated_at))));
            }
            if let Some(completed_at) = &task.completed_at {
                dates.push(
                    Span::from(format!(" Completed: {}", format_date(completed_at))).green(),
                );
            }

            let lines = vec![
                Line::from(vec![
                    Span::from(if task.is_completed() { "[x] " } else { "[ ] " }),
                    Span::from(format!("#{} ", task.id.unwrap_or_default())),
                    Span::styled(task.title.as_str(), title_style),
                ]),
                Line::from(dates),
            ];
            ListItem::new(lines).style(Style::default().fg(Color::White))
        })
        .collect()
}

// Build the UI (lines) for statistics infobox
pub fn get_statistics_ui<'a>(app: &'a App<'a>) -> Vec<Line<'a>> {
    vec![
        Line::from(format!("Total tasks: {}", app.items.len())),
        Line::from(format!("Pending tasks: {}", app.items.pending.items.len())),
        Line::from(format!(
            "Completed tasks: {}",
            app.items.completed.items.len()
        )),
        Line::from(format!(
            "Completed today: {}",
            app.items.get_completed_today().len()
        )),
    ]
}

// Build the UI (lines) for instructions infobox
pub fn get_instructions_ui<'a>() -> Vec<Line<'a>> {
    vec![
        "Enter/Space - toggle done".into(),
        "Tab - switch list".into(),
        "a - add a task".into(),
        "e - edit a task".into(),
        "x - delete a task".into(),
        "q - quit".into(),
    ]
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::app::models::NewTask;
    use crate::app::storage::{Database, DbConfig};
    use crate::app::tasks;

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

    fn create(tasks: &Tasks<'_>, title: &str) -> Task {
        tasks
            .create(NewTask {
                title: title.to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_loads_tasks_into_both_lists() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        create(&tasks, "A");
        let done = create(&tasks, "B");
        tasks
            .update(done.id.unwrap(), TaskChanges::Merge(TaskPatch::completed(true)))
            .unwrap();

        let list = TaskList::with_items_from_storage(tasks).unwrap();
        assert_eq!(list.pending.items.len(), 1);
        assert_eq!(list.completed.items.len(), 1);
        assert_eq!(list.completed.items[0].title, "B");
        assert_eq!(list.get_completed_today().len(), 1);
    }

    #[test]
    fn test_toggle_moves_between_lists() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        let task = create(&tasks, "A");

        let mut list = TaskList::with_items_from_storage(tasks).unwrap();
        list.next();
        list.toggle_completed().unwrap();
        assert!(list.pending.items.is_empty());
        assert_eq!(list.completed.items.len(), 1);
        assert_eq!(list.pending.state.selected(), None);

        list.switch_focus();
        assert_eq!(list.focus, Column::Completed);
        list.toggle_completed().unwrap();
        assert_eq!(list.pending.items.len(), 1);

        let stored = tasks.find_by_key(task.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.completed_at, None);
        assert_eq!(stored.created_at, task.created_at);
    }

    #[test]
    fn test_delete_selected() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        create(&tasks, "A");
        let second = create(&tasks, "B");

        let mut list = TaskList::with_items_from_storage(tasks).unwrap();
        list.previous();
        assert_eq!(list.get_selected().map(|t| t.title.as_str()), Some("B"));

        list.delete_selected().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.pending.state.selected(), Some(0));
        assert!(tasks.find_by_key(second.id.unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_navigation_wraps() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        create(&tasks, "A");
        create(&tasks, "B");

        let mut list = TaskList::with_items_from_storage(tasks).unwrap();
        list.next();
        list.next();
        list.next();
        assert_eq!(list.pending.state.selected(), Some(0));
        list.previous();
        assert_eq!(list.pending.state.selected(), Some(1));
    }

    #[test]
    fn test_actions_without_selection_do_nothing() {
        let (_temp, db) = setup_db();
        let tasks = Tasks::new(&db);
        create(&tasks, "A");

        let mut list = TaskList::with_items_from_storage(tasks).unwrap();
        list.toggle_completed().unwrap();
        list.delete_selected().unwrap();
        assert_eq!(list.pending.items.len(), 1);
    }
}
