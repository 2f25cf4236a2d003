//! Status-partitioned view of the todo list.

use serde::{Deserialize, Serialize};

use crate::todo::{Todo, TodoStatus};

/// Todos split into the three status columns.
///
/// Within a column, todos keep the order the store returned them in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub past: Vec<Todo>,
    pub present: Vec<Todo>,
    pub future: Vec<Todo>,
}

impl Board {
    pub fn from_todos(todos: impl IntoIterator<Item = Todo>) -> Self {
        let mut board = Self::default();
        for todo in todos {
            board.column_mut(todo.status).push(todo);
        }
        board
    }

    pub fn column(&self, status: TodoStatus) -> &[Todo] {
        match status {
            TodoStatus::Past => &self.past,
            TodoStatus::Present => &self.present,
            TodoStatus::Future => &self.future,
        }
    }

    fn column_mut(&mut self, status: TodoStatus) -> &mut Vec<Todo> {
        match status {
            TodoStatus::Past => &mut self.past,
            TodoStatus::Present => &mut self.present,
            TodoStatus::Future => &mut self.future,
        }
    }

    pub fn len(&self) -> usize {
        self.past.len() + self.present.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a todo in any column.
    pub fn find(&self, id: crate::TodoId) -> Option<&Todo> {
        TodoStatus::ALL
            .iter()
            .flat_map(|s| self.column(*s))
            .find(|t| t.id == id)
    }
}
