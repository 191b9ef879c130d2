use crate::promise::Promise;
use std::cell::RefCell;
use std::rc::Rc;

/// What a suspended computation awaited: a plain value, or a promise whose
/// settlement resumes it. Plain values are adopted as already-fulfilled.
pub enum Yielded<T, E> {
    Value(T),
    Promise(Promise<T, E>),
}

pub enum ResumeOutcome<T, E> {
    /// Suspended at an await point.
    Yielded(Yielded<T, E>),
    /// Ran to completion with a final value.
    Complete(T),
    /// Raised an error that nothing inside the computation caught.
    Failed(E),
}

/// A suspended unit of work driven by [`drive`]. The two resume entry points
/// mirror the target's coroutine handshake: a settled await either continues
/// execution with the value or re-raises the rejection reason inside the
/// computation, so error handling around an await point still observes it.
pub trait Resumable<T, E> {
    fn start(&mut self) -> ResumeOutcome<T, E>;

    fn resume(&mut self, value: T) -> ResumeOutcome<T, E>;

    fn resume_error(&mut self, error: E) -> ResumeOutcome<T, E>;
}

/// Steps `task` to completion, settling the returned promise with its final
/// value or first unhandled error.
pub fn drive<T, E, R>(task: R) -> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    R: Resumable<T, E> + 'static,
{
    let task = Rc::new(RefCell::new(task));
    let result = Promise::pending();
    let outcome = task.borrow_mut().start();
    advance(&task, &result, outcome);
    result
}

fn advance<T, E, R>(task: &Rc<RefCell<R>>, result: &Promise<T, E>, outcome: ResumeOutcome<T, E>)
where
    T: Clone + 'static,
    E: Clone + 'static,
    R: Resumable<T, E> + 'static,
{
    let mut outcome = outcome;
    loop {
        match outcome {
            ResumeOutcome::Complete(value) => {
                result.settle_fulfilled(value);
                return;
            }
            ResumeOutcome::Failed(error) => {
                result.settle_rejected(error);
                return;
            }
            ResumeOutcome::Yielded(Yielded::Value(value)) => {
                outcome = task.borrow_mut().resume(value);
            }
            ResumeOutcome::Yielded(Yielded::Promise(awaited)) => {
                let on_value = {
                    let task = Rc::clone(task);
                    let result = result.clone();
                    Box::new(move |value: &T| {
                        let outcome = task.borrow_mut().resume(value.clone());
                        advance(&task, &result, outcome);
                    })
                };
                let on_error = {
                    let task = Rc::clone(task);
                    let result = result.clone();
                    Box::new(move |error: &E| {
                        let outcome = task.borrow_mut().resume_error(error.clone());
                        advance(&task, &result, outcome);
                    })
                };
                awaited.subscribe(on_value, on_error);
                return;
            }
        }
    }
}
