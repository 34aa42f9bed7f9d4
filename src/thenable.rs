use crate::Deferred;

/// A value that settles later and reports the outcome to exactly one of two
/// callbacks.
///
/// Returning a thenable from a handler, or resolving a [`Resolver`] with one,
/// makes the receiving deferred value adopt its outcome. Implement this for a
/// foreign deferred type to chain it with [`Deferred`].
///
/// [`Resolver`]: crate::Resolver
pub trait Thenable<T, E> {
    fn subscribe(self: Box<Self>, on_fulfilled: Box<dyn FnOnce(T)>, on_rejected: Box<dyn FnOnce(E)>);
}

impl<T, E> Thenable<T, E> for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn subscribe(self: Box<Self>, on_fulfilled: Box<dyn FnOnce(T)>, on_rejected: Box<dyn FnOnce(E)>) {
        self.then_with(
            move |value| {
                on_fulfilled(value);
                Ok::<(), E>(())
            },
            move |reason| {
                on_rejected(reason);
                Ok::<(), E>(())
            },
        );
    }
}
