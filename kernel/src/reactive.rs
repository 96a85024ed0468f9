//! Reactive cells for entity properties and contexts.
//!
//! * [`Signal<T>`]: a value cell with a custom equality. Writes that compare
//!   equal are ignored; any other write notifies dependents.
//! * [`Effect`]: a computation that re-runs whenever a signal it read during
//!   its last run changes. Dependencies are tracked automatically.
//! * [`batch`]: defers every notification until the outermost batch ends, so
//!   dependents see one coalesced update.
//!
//! Everything is single threaded; the tracking state is per thread.

use std::{
    cell::{Cell, RefCell},
    mem,
    rc::{Rc, Weak},
};

thread_local! {
    static OBSERVERS: RefCell<Vec<Rc<EffectInner>>> = RefCell::new(Vec::new());
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState {
        depth: 0,
        pending: Vec::new(),
    });
}

struct BatchState {
    depth: usize,
    pending: Vec<Reaction>,
}

#[derive(Clone)]
enum Reaction {
    Effect(Weak<EffectInner>),
    Subscriber(Rc<dyn Fn()>),
}

impl Reaction {
    fn is_same(&self, other: &Reaction) -> bool {
        match (self, other) {
            (Reaction::Effect(a), Reaction::Effect(b)) => a.ptr_eq(b),
            (Reaction::Subscriber(a), Reaction::Subscriber(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn run(&self) {
        match self {
            Reaction::Effect(effect) => {
                if let Some(effect) = effect.upgrade() {
                    effect.execute();
                }
            }
            Reaction::Subscriber(subscriber) => subscriber(),
        }
    }
}

fn schedule(reactions: Vec<Reaction>) {
    let run_now = BATCH.with(|batch| {
        let mut batch = batch.borrow_mut();
        if batch.depth == 0 {
            return Some(reactions);
        }
        for reaction in reactions {
            if !batch.pending.iter().any(|pending| pending.is_same(&reaction)) {
                batch.pending.push(reaction);
            }
        }
        None
    });

    for reaction in run_now.into_iter().flatten() {
        reaction.run();
    }
}

/// Runs `f` with notifications deferred until the outermost batch returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH.with(|batch| batch.borrow_mut().depth += 1);
    let _guard = BatchGuard;
    f()
}

pub fn is_batching() -> bool {
    BATCH.with(|batch| batch.borrow().depth > 0)
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let pending = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            if batch.depth == 0 {
                mem::take(&mut batch.pending)
            } else {
                Vec::new()
            }
        });
        if std::thread::panicking() {
            return;
        }
        for reaction in pending {
            reaction.run();
        }
    }
}

// Signal

trait Source {
    fn unobserve(&self, effect: &Weak<EffectInner>);
}

struct SignalInner<T> {
    value: RefCell<T>,
    is_equal: Box<dyn Fn(&T, &T) -> bool>,
    observers: RefCell<Vec<Weak<EffectInner>>>,
    subscribers: RefCell<Vec<(SignalSubscription, Rc<dyn Fn()>)>>,
    next_subscription: Cell<u64>,
}

impl<T> Source for SignalInner<T> {
    fn unobserve(&self, effect: &Weak<EffectInner>) {
        self.observers.borrow_mut().retain(|known| !known.ptr_eq(effect));
    }
}

/// Handle returned by [`Signal::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignalSubscription(u64);

/// A shared reactive value cell. Clones refer to the same cell.
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self::with_equality(value, |a, b| a == b)
    }
}

impl<T: Clone + 'static> Signal<T> {
    pub fn with_equality(value: T, is_equal: impl Fn(&T, &T) -> bool + 'static) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                value: RefCell::new(value),
                is_equal: Box::new(is_equal),
                observers: RefCell::new(Vec::new()),
                subscribers: RefCell::new(Vec::new()),
                next_subscription: Cell::new(0),
            }),
        }
    }

    /// Reads the value and registers the running effect, if any, as a
    /// dependent.
    pub fn get(&self) -> T {
        self.track();
        self.get_untracked()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Writes `value`. Returns `false` if it compared equal and nothing was
    /// notified.
    pub fn set(&self, value: T) -> bool {
        let unchanged = {
            let current = self.inner.value.borrow();
            (self.inner.is_equal)(&*current, &value)
        };
        if unchanged {
            return false;
        }
        *self.inner.value.borrow_mut() = value;
        self.notify();
        true
    }

    /// Calls `listener` with the new value after every change.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> SignalSubscription {
        let key = SignalSubscription(self.inner.next_subscription.get());
        self.inner.next_subscription.set(key.0 + 1);

        let weak = Rc::downgrade(&self.inner);
        let reaction: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                let value = inner.value.borrow().clone();
                listener(&value);
            }
        });
        self.inner.subscribers.borrow_mut().push((key, reaction));
        key
    }

    pub fn unsubscribe(&self, key: SignalSubscription) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(known, _)| *known != key);
        before != subscribers.len()
    }

    pub fn same_cell(&self, other: &Signal<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn track(&self) {
        OBSERVERS.with(|observers| {
            let observers = observers.borrow();
            let Some(effect) = observers.last() else {
                return;
            };
            let weak = Rc::downgrade(effect);
            let mut known = self.inner.observers.borrow_mut();
            if known.iter().any(|observer| observer.ptr_eq(&weak)) {
                return;
            }
            known.push(weak);
            let source: Rc<dyn Source> = self.inner.clone();
            effect.sources.borrow_mut().push(source);
        });
    }

    fn notify(&self) {
        let mut reactions = Vec::new();
        {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(|observer| observer.strong_count() > 0);
            reactions.extend(observers.iter().cloned().map(Reaction::Effect));
        }
        reactions.extend(
            self.inner
                .subscribers
                .borrow()
                .iter()
                .map(|(_, reaction)| Reaction::Subscriber(reaction.clone())),
        );
        schedule(reactions);
    }
}

impl<T: Clone + std::fmt::Debug + 'static> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signal").field(&*self.inner.value.borrow()).finish()
    }
}

// Effect

struct EffectInner {
    run: RefCell<Box<dyn FnMut()>>,
    sources: RefCell<Vec<Rc<dyn Source>>>,
    disposed: Cell<bool>,
}

impl EffectInner {
    fn execute(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        // Already running further up the stack
        let Ok(mut run) = self.run.try_borrow_mut() else {
            return;
        };
        self.clear_sources();

        OBSERVERS.with(|observers| observers.borrow_mut().push(self.clone()));
        let _guard = ObserverGuard;
        run();
    }

    fn clear_sources(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        for source in mem::take(&mut *self.sources.borrow_mut()) {
            source.unobserve(&weak);
        }
    }
}

struct ObserverGuard;

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        OBSERVERS.with(|observers| {
            observers.borrow_mut().pop();
        });
    }
}

/// A side effect re-run whenever a signal it read changes. Runs once on
/// creation. Dropping the handle disposes it.
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub fn new(run: impl FnMut() + 'static) -> Self {
        let inner = Rc::new(EffectInner {
            run: RefCell::new(Box::new(run)),
            sources: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        });
        inner.execute();
        Self { inner }
    }

    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.clear_sources();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.dispose();
    }
}
