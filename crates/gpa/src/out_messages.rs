/// Ordered batch of messages produced by one GPA transition.
///
/// Batches returned by sub-calls can be merged in directly, including absent
/// ones (`Option::None`) and empty ones, which are no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutMessages<M> {
    msgs: Vec<M>,
}

impl<M> OutMessages<M> {
    pub fn new() -> Self {
        Self { msgs: Vec::new() }
    }

    /// The empty batch.
    pub fn none() -> Self {
        Self::new()
    }

    pub fn single(msg: M) -> Self {
        Self { msgs: vec![msg] }
    }

    pub fn add(&mut self, msg: M) -> &mut Self {
        self.msgs.push(msg);
        self
    }

    /// Append a whole batch, preserving order.
    pub fn add_all(&mut self, other: impl Into<Option<OutMessages<M>>>) -> &mut Self {
        if let Some(other) = other.into() {
            self.msgs.extend(other.msgs);
        }
        self
    }

    pub fn count(&self) -> usize {
        self.msgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, M> {
        self.msgs.iter()
    }

    /// Visit each message in order, stopping at the first error.
    pub fn try_for_each<E>(&self, f: impl FnMut(&M) -> Result<(), E>) -> Result<(), E> {
        self.msgs.iter().try_for_each(f)
    }

    pub fn into_vec(self) -> Vec<M> {
        self.msgs
    }
}

impl<M> Default for OutMessages<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> From<Vec<M>> for OutMessages<M> {
    fn from(msgs: Vec<M>) -> Self {
        Self { msgs }
    }
}

impl<M> FromIterator<M> for OutMessages<M> {
    fn from_iter<T: IntoIterator<Item = M>>(iter: T) -> Self {
        Self {
            msgs: iter.into_iter().collect(),
        }
    }
}

impl<M> Extend<M> for OutMessages<M> {
    fn extend<T: IntoIterator<Item = M>>(&mut self, iter: T) {
        self.msgs.extend(iter);
    }
}

impl<M> IntoIterator for OutMessages<M> {
    type Item = M;
    type IntoIter = std::vec::IntoIter<M>;

    fn into_iter(self) -> Self::IntoIter {
        self.msgs.into_iter()
    }
}

impl<'a, M> IntoIterator for &'a OutMessages<M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.msgs.iter()
    }
}
