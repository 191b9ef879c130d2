use std::cell::RefCell;
use std::rc::Rc;

/// Settlement state of a promise. Terminal once it leaves `Pending`; later
/// transition attempts are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// What a `then` handler hands back: a plain value, or another promise whose
/// eventual outcome the child promise adopts.
pub enum Handled<T, E> {
    Value(T),
    Chain(Promise<T, E>),
}

pub type FulfillHandler<T, E> = Box<dyn Fn(T) -> Result<Handled<T, E>, E>>;
pub type RejectHandler<T, E> = Box<dyn Fn(E) -> Result<Handled<T, E>, E>>;

struct PromiseRecord<T, E> {
    state: PromiseState,
    value: Option<T>,
    rejection_reason: Option<E>,
    fulfilled_callbacks: Vec<Box<dyn Fn(&T)>>,
    rejected_callbacks: Vec<Box<dyn Fn(&E)>>,
    finally_callbacks: Vec<Box<dyn Fn()>>,
}

impl<T, E> Default for PromiseRecord<T, E> {
    fn default() -> Self {
        Self {
            state: PromiseState::Pending,
            value: None,
            rejection_reason: None,
            fulfilled_callbacks: Vec::new(),
            rejected_callbacks: Vec::new(),
            finally_callbacks: Vec::new(),
        }
    }
}

/// Single-threaded promise over shared state. Callback lists are append-only
/// while pending and drained exactly once on settlement, in registration
/// order, settling callbacks before finally callbacks.
pub struct Promise<T, E> {
    record: Rc<RefCell<PromiseRecord<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            record: Rc::clone(&self.record),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Promise<T, E> {
    /// Runs `executor` with resolve and reject continuations. An executor
    /// that returns an error rejects the promise with that error.
    pub fn new<X>(executor: X) -> Self
    where
        X: FnOnce(&dyn Fn(T), &dyn Fn(E)) -> Result<(), E>,
    {
        let promise = Self::pending();
        let resolver = promise.clone();
        let rejecter = promise.clone();
        let resolve = move |value: T| resolver.settle_fulfilled(value);
        let reject = move |reason: E| rejecter.settle_rejected(reason);
        if let Err(error) = executor(&resolve, &reject) {
            promise.settle_rejected(error);
        }
        promise
    }

    pub fn resolve(value: T) -> Self {
        let promise = Self::pending();
        {
            let mut record = promise.record.borrow_mut();
            record.state = PromiseState::Fulfilled;
            record.value = Some(value);
        }
        promise
    }

    pub fn reject(reason: E) -> Self {
        let promise = Self::pending();
        {
            let mut record = promise.record.borrow_mut();
            record.state = PromiseState::Rejected;
            record.rejection_reason = Some(reason);
        }
        promise
    }

    pub(crate) fn pending() -> Self {
        Self {
            record: Rc::new(RefCell::new(PromiseRecord::default())),
        }
    }

    pub fn state(&self) -> PromiseState {
        self.record.borrow().state
    }

    pub fn value(&self) -> Option<T> {
        self.record.borrow().value.clone()
    }

    pub fn rejection_reason(&self) -> Option<E> {
        self.record.borrow().rejection_reason.clone()
    }

    /// Registers settlement handlers and returns the child promise they
    /// settle. A handler already matched by the current state fires during
    /// this call rather than being deferred. A missing handler passes the
    /// value or reason through to the child unchanged.
    pub fn then(
        &self,
        on_fulfilled: Option<FulfillHandler<T, E>>,
        on_rejected: Option<RejectHandler<T, E>>,
    ) -> Promise<T, E> {
        let child = Promise::pending();

        let fulfilled: Box<dyn Fn(&T)> = match on_fulfilled {
            Some(handler) => {
                let child = child.clone();
                Box::new(move |value: &T| child.settle_from_handler(handler(value.clone())))
            }
            None => {
                let child = child.clone();
                Box::new(move |value: &T| child.settle_fulfilled(value.clone()))
            }
        };
        let rejected: Box<dyn Fn(&E)> = match on_rejected {
            Some(handler) => {
                let child = child.clone();
                Box::new(move |reason: &E| child.settle_from_handler(handler(reason.clone())))
            }
            None => {
                let child = child.clone();
                Box::new(move |reason: &E| child.settle_rejected(reason.clone()))
            }
        };
        self.subscribe(fulfilled, rejected);
        child
    }

    pub fn catch(&self, on_rejected: RejectHandler<T, E>) -> Promise<T, E> {
        self.then(None, Some(on_rejected))
    }

    /// Registers a callback that fires exactly once on settlement, after the
    /// settling callbacks, regardless of outcome. Fires during this call if
    /// the promise is already settled. Returns this same promise.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T, E>
    where
        F: Fn() + 'static,
    {
        let pending = self.record.borrow().state == PromiseState::Pending;
        if pending {
            self.record
                .borrow_mut()
                .finally_callbacks
                .push(Box::new(on_finally));
        } else {
            on_finally();
        }
        self.clone()
    }

    /// Registers raw settlement continuations, firing the matching one
    /// immediately when the promise is already settled. The mechanism behind
    /// both `then` registration and chained-promise adoption.
    pub(crate) fn subscribe(&self, on_value: Box<dyn Fn(&T)>, on_error: Box<dyn Fn(&E)>) {
        let state = self.record.borrow().state;
        match state {
            PromiseState::Pending => {
                let mut record = self.record.borrow_mut();
                record.fulfilled_callbacks.push(on_value);
                record.rejected_callbacks.push(on_error);
            }
            PromiseState::Fulfilled => {
                let value = self.record.borrow().value.clone();
                if let Some(value) = value {
                    on_value(&value);
                }
            }
            PromiseState::Rejected => {
                let reason = self.record.borrow().rejection_reason.clone();
                if let Some(reason) = reason {
                    on_error(&reason);
                }
            }
        }
    }

    pub(crate) fn settle_fulfilled(&self, value: T) {
        let (callbacks, finals) = {
            let mut record = self.record.borrow_mut();
            if record.state != PromiseState::Pending {
                return;
            }
            record.state = PromiseState::Fulfilled;
            record.value = Some(value.clone());
            (
                std::mem::take(&mut record.fulfilled_callbacks),
                std::mem::take(&mut record.finally_callbacks),
            )
        };
        for callback in &callbacks {
            callback(&value);
        }
        for callback in &finals {
            callback();
        }
    }

    pub(crate) fn settle_rejected(&self, reason: E) {
        let (callbacks, finals) = {
            let mut record = self.record.borrow_mut();
            if record.state != PromiseState::Pending {
                return;
            }
            record.state = PromiseState::Rejected;
            record.rejection_reason = Some(reason.clone());
            (
                std::mem::take(&mut record.rejected_callbacks),
                std::mem::take(&mut record.finally_callbacks),
            )
        };
        for callback in &callbacks {
            callback(&reason);
        }
        for callback in &finals {
            callback();
        }
    }

    fn settle_from_handler(&self, outcome: Result<Handled<T, E>, E>) {
        match outcome {
            Ok(Handled::Value(value)) => self.settle_fulfilled(value),
            Ok(Handled::Chain(inner)) => {
                let on_value = {
                    let child = self.clone();
                    Box::new(move |value: &T| child.settle_fulfilled(value.clone()))
                };
                let on_error = {
                    let child = self.clone();
                    Box::new(move |reason: &E| child.settle_rejected(reason.clone()))
                };
                inner.subscribe(on_value, on_error);
            }
            Err(error) => self.settle_rejected(error),
        }
    }
}
