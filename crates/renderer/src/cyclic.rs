//! Fixed-size ring of reusable per-frame resources.
//!
//! The ring only hands slots out in order. It never waits on the GPU: a slot
//! carries its own completion fence, and whoever reuses the slot waits on it.

/// Round-robin arena of `N` slots.
#[derive(Debug)]
pub struct CyclicQueue<T> {
    items: Vec<T>,
    next: usize,
    current: Option<usize>,
}

impl<T> CyclicQueue<T> {
    /// Builds a ring of `n` slots, calling `make` with each slot index.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn new(n: usize, make: impl FnMut(usize) -> T) -> Self {
        Self::from_vec((0..n).map(make).collect())
    }

    /// Like [`CyclicQueue::new`] with a fallible constructor.
    pub fn try_new<E>(n: usize, make: impl FnMut(usize) -> Result<T, E>) -> Result<Self, E> {
        let items = (0..n).map(make).collect::<Result<Vec<_>, E>>()?;
        Ok(Self::from_vec(items))
    }

    /// # Panics
    ///
    /// Panics if `items` is empty.
    pub fn from_vec(items: Vec<T>) -> Self {
        assert!(!items.is_empty(), "cyclic queue needs at least one slot");
        Self {
            items,
            next: 0,
            current: None,
        }
    }

    /// Hands out the next slot: `index = (previous + 1) mod N`, starting at 0.
    pub fn acquire_next(&mut self) -> (usize, &mut T) {
        let index = self.next;
        self.next = (index + 1) % self.items.len();
        self.current = Some(index);
        (index, &mut self.items[index])
    }

    /// Drops every slot and rebuilds the ring at size `n`, cursor back at 0.
    ///
    /// Only safe once no GPU work references the old slots.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn resize(&mut self, n: usize, make: impl FnMut(usize) -> T) {
        *self = Self::new(n, make);
    }

    /// Index of the slot handed out last, if any.
    #[inline]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_wraps_around() {
        let mut queue = CyclicQueue::new(3, |i| i * 10);
        let indices: Vec<usize> = (0..4).map(|_| queue.acquire_next().0).collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_acquire_returns_matching_slot() {
        let mut queue = CyclicQueue::new(2, |i| format!("slot-{}", i));
        let (index, slot) = queue.acquire_next();
        assert_eq!(index, 0);
        assert_eq!(slot, "slot-0");

        slot.push_str("-used");
        queue.acquire_next();
        let (index, slot) = queue.acquire_next();
        assert_eq!(index, 0);
        assert_eq!(slot, "slot-0-used");
    }

    #[test]
    fn test_single_slot_always_zero() {
        let mut queue = CyclicQueue::new(1, |_| ());
        for _ in 0..5 {
            assert_eq!(queue.acquire_next().0, 0);
        }
    }

    #[test]
    fn test_current_index() {
        let mut queue = CyclicQueue::new(3, |_| ());
        assert_eq!(queue.current_index(), None);
        queue.acquire_next();
        queue.acquire_next();
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_resize_resets_cursor() {
        let mut queue = CyclicQueue::new(3, |i| i);
        queue.acquire_next();
        queue.acquire_next();

        queue.resize(2, |i| i + 100);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current_index(), None);
        let (index, value) = queue.acquire_next();
        assert_eq!((index, *value), (0, 100));
        let (index, value) = queue.acquire_next();
        assert_eq!((index, *value), (1, 101));
        assert_eq!(queue.acquire_next().0, 0);
    }

    #[test]
    fn test_try_new_propagates_error() {
        let result: Result<CyclicQueue<usize>, String> =
            CyclicQueue::try_new(3, |i| if i == 2 { Err(format!("slot {}", i)) } else { Ok(i) });
        assert_eq!(result.unwrap_err(), "slot 2");
    }

    #[test]
    #[should_panic(expected = "at least one slot")]
    fn test_zero_size_panics() {
        let _ = CyclicQueue::new(0, |_| ());
    }

    #[test]
    fn test_iter_visits_every_slot() {
        let mut queue = CyclicQueue::new(3, |i| i);
        for item in queue.iter_mut() {
            *item *= 2;
        }
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![0, 2, 4]);
    }
}
