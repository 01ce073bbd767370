//! Record store interface.
//!
//! The listing engine and the HTTP handlers only talk to storage through
//! this trait. Implementations must apply each mutation as one indivisible
//! step so concurrent writers cannot interleave a read-modify-write.

use crate::error::Result;
use crate::types::{NewTodo, SortSpec, Todo, TodoChanges, TodoFilter};

pub trait TodoStore: Send + Sync {
    /// Number of records matching `filter`.
    fn count(&self, filter: &TodoFilter) -> Result<u64>;

    /// Records matching `filter`, ordered by `sort` then ascending id.
    fn find_page(
        &self,
        filter: &TodoFilter,
        sort: SortSpec,
        skip: u64,
        take: u64,
    ) -> Result<Vec<Todo>>;

    fn find_by_id(&self, id: i64) -> Result<Option<Todo>>;

    fn insert(&self, new: NewTodo) -> Result<Todo>;

    /// Apply `changes` and bump `updated_at`. `None` if `id` does not exist.
    fn update(&self, id: i64, changes: TodoChanges) -> Result<Option<Todo>>;

    /// Remove a record, returning it. `None` if `id` does not exist.
    fn delete(&self, id: i64) -> Result<Option<Todo>>;
}

impl<S: TodoStore + ?Sized> TodoStore for std::sync::Arc<S> {
    fn count(&self, filter: &TodoFilter) -> Result<u64> {
        (**self).count(filter)
    }

    fn find_page(
        &self,
        filter: &TodoFilter,
        sort: SortSpec,
        skip: u64,
        take: u64,
    ) -> Result<Vec<Todo>> {
        (**self).find_page(filter, sort, skip, take)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<Todo>> {
        (**self).find_by_id(id)
    }

    fn insert(&self, new: NewTodo) -> Result<Todo> {
        (**self).insert(new)
    }

    fn update(&self, id: i64, changes: TodoChanges) -> Result<Option<Todo>> {
        (**self).update(id, changes)
    }

    fn delete(&self, id: i64) -> Result<Option<Todo>> {
        (**self).delete(id)
    }
}
