//! Release of GPU-backed resources.
//!
//! Memory that lives on the graphics device is not reclaimed when the Rust
//! handle goes away while anything else (a bind group, an in-flight command
//! buffer) still references it. Scene teardown therefore frees it explicitly
//! through the two traits in this module:
//!
//! - [`Release`] is implemented by the GPU objects themselves and consumes them.
//! - [`Dispose`] is implemented by the *slots* holding those objects
//!   (`Option<T>`, [`Shared<T>`]) and empties the slot, which makes a second
//!   call a no-op.

use std::sync::Arc;

/// A GPU object that can free its device memory.
pub trait Release {
    fn release(self);
}

/// Something holding releasable resources.
///
/// Implementations must leave `self` empty so that repeated calls release nothing.
pub trait Dispose {
    /// Empties the slot and returns how many GPU objects were actually freed.
    fn dispose(&mut self) -> usize;

    /// Whether a later call to [`dispose`](Self::dispose) would release anything.
    fn holds_resource(&self) -> bool;
}

impl<T: Release> Dispose for Option<T> {
    fn dispose(&mut self) -> usize {
        match self.take() {
            Some(resource) => {
                resource.release();
                1
            }
            None => 0,
        }
    }

    fn holds_resource(&self) -> bool {
        self.is_some()
    }
}

/// A reference-counted resource handle.
///
/// Textures may be referenced by several materials and by the scene background at
/// the same time. Each holder owns one `Shared` clone; disposing it gives up that
/// holder's reference and the underlying object is released only by the last one.
#[derive(Debug)]
pub struct Shared<T: Release> {
    inner: Option<Arc<T>>,
}

impl<T: Release> Shared<T> {
    pub fn new(resource: T) -> Self {
        Self {
            inner: Some(Arc::new(resource)),
        }
    }

    /// An empty handle, e.g. for a material slot without a texture.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// Number of live holders of the underlying resource, `0` once this handle is disposed.
    pub fn holders(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }
}

impl<T: Release> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Release> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Release> From<T> for Shared<T> {
    fn from(resource: T) -> Self {
        Self::new(resource)
    }
}

impl<T: Release> Dispose for Shared<T> {
    fn dispose(&mut self) -> usize {
        // `into_inner` only yields the value for the last strong reference.
        match self.inner.take().and_then(Arc::into_inner) {
            Some(resource) => {
                resource.release();
                1
            }
            None => 0,
        }
    }

    fn holds_resource(&self) -> bool {
        self.inner.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    /// Records every release into a shared log so tests can check counts and order.
    #[derive(Debug)]
    pub(crate) struct Tracked {
        pub(crate) name: &'static str,
        pub(crate) log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Release for Tracked {
        fn release(self) {
            self.log.borrow_mut().push(self.name);
        }
    }

    pub(crate) fn tracked(name: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Tracked {
        Tracked {
            name,
            log: log.clone(),
        }
    }

    #[test]
    fn option_slot_releases_once() {
        let log = Rc::default();
        let mut slot = Some(tracked("buffer", &log));
        assert!(slot.holds_resource());

        assert_eq!(slot.dispose(), 1);
        assert_eq!(slot.dispose(), 0);

        assert!(!slot.holds_resource());
        assert_eq!(*log.borrow(), vec!["buffer"]);
    }

    #[test]
    fn shared_releases_with_last_holder() {
        let log = Rc::default();
        let mut first = Shared::new(tracked("texture", &log));
        let mut second = first.clone();
        assert_eq!(first.holders(), 2);

        assert_eq!(first.dispose(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(second.holders(), 1);
        assert!(second.get().is_some());

        assert_eq!(second.dispose(), 1);
        assert_eq!(*log.borrow(), vec!["texture"]);
    }

    #[test]
    fn disposing_a_shared_handle_twice_keeps_other_holders_alive() {
        let log = Rc::default();
        let mut first = Shared::new(tracked("texture", &log));
        let second = first.clone();

        first.dispose();
        first.dispose();

        assert_eq!(second.holders(), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn empty_shared_is_a_noop() {
        let mut slot: Shared<Tracked> = Shared::empty();
        assert!(!slot.holds_resource());
        assert_eq!(slot.holders(), 0);
        slot.dispose();
        assert!(slot.get().is_none());
    }
}
