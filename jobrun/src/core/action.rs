//! The action capability: anything invokable with the job context.

use std::rc::Rc;

use anyhow::Result;

use crate::core::context::JobContext;

/// A unit of work attached to a step or registered as teardown.
///
/// The engine treats every implementation the same way: it calls [`Action::invoke`]
/// and records a returned error against the scope that ran it.
pub trait Action {
    fn invoke(&self, ctx: &mut JobContext) -> Result<()>;

    /// Short label for logs and outlines.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Shared actions let a step's action and its teardown hold common state.
impl<A: Action + ?Sized> Action for Rc<A> {
    fn invoke(&self, ctx: &mut JobContext) -> Result<()> {
        (**self).invoke(ctx)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl Action for Box<dyn Action> {
    fn invoke(&self, ctx: &mut JobContext) -> Result<()> {
        (**self).invoke(ctx)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Closure-backed action.
pub struct FnAction<F> {
    label: String,
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(&mut JobContext) -> Result<()>,
{
    pub fn new(label: impl Into<String>, func: F) -> Self {
        Self {
            label: label.into(),
            func,
        }
    }
}

impl<F> Action for FnAction<F>
where
    F: Fn(&mut JobContext) -> Result<()>,
{
    fn invoke(&self, ctx: &mut JobContext) -> Result<()> {
        (self.func)(ctx)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Wrap a closure as an anonymous [`Action`].
pub fn action_fn<F>(func: F) -> FnAction<F>
where
    F: Fn(&mut JobContext) -> Result<()>,
{
    FnAction::new("<fn>", func)
}
