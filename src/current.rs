//! The context current on the calling thread.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use crate::context::RenderContext;

thread_local! {
    static CURRENT: RefCell<Option<Weak<RenderContext>>> = const { RefCell::new(None) };
}

pub(crate) fn get() -> Option<Arc<RenderContext>> {
    CURRENT.with(|slot| slot.borrow().as_ref().and_then(Weak::upgrade))
}

pub(crate) fn set(context: &Arc<RenderContext>) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(Arc::downgrade(context)));
}

/// Clear the slot if it holds `context`.
pub(crate) fn clear(context: &RenderContext) {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot
            .as_ref()
            .is_some_and(|current| std::ptr::eq(current.as_ptr(), context))
        {
            *slot = None;
        }
    });
}
