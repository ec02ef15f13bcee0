//! Completion callbacks for call sites that want them.
//!
//! Every operation returns an [`OrmResult`]. Code written around a
//! `(error, result)` callback can attach one with [`Completion::notify`]
//! and still get the result back for `?`.
//!
//! ```
//! use netabase_orm::prelude::*;
//!
//! # fn main() -> OrmResult<()> {
//! let schema = Schema::memory();
//! let note = schema.define("Note", Properties::new().with("body", PropertyType::Text))?;
//!
//! let mut seen = None;
//! let created = note
//!     .create(row! { "body" => "hi" })
//!     .notify(|result| seen = result.ok().map(|n| n.id()))?;
//! assert_eq!(seen, Some(created.id()));
//! # Ok(())
//! # }
//! ```

use crate::error::{OrmError, OrmResult};

pub trait Completion<T> {
    /// Hand a view of the outcome to `callback`, then return the outcome
    /// unchanged.
    fn notify<F>(self, callback: F) -> Self
    where
        F: FnOnce(Result<&T, &OrmError>);

    /// [`notify`](Completion::notify) with an optional callback.
    fn notify_opt<F>(self, callback: Option<F>) -> Self
    where
        F: FnOnce(Result<&T, &OrmError>),
        Self: Sized,
    {
        match callback {
            Some(callback) => self.notify(callback),
            None => self,
        }
    }
}

impl<T> Completion<T> for OrmResult<T> {
    fn notify<F>(self, callback: F) -> Self
    where
        F: FnOnce(Result<&T, &OrmError>),
    {
        callback(self.as_ref());
        self
    }
}
