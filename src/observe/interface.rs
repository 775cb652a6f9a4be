//! Observer contracts.

/// Reacts to changes of named properties on an observed source.
///
/// `source` is the tag of the object being observed (for example
/// `"machine"`), `property` the name of the value that changes.
pub trait PropertyObserver {
    /// Called before the named property changes.
    fn property_will_change(&self, source: &str, property: &str);

    /// Called after the named property has changed.
    fn property_did_change(&self, source: &str, property: &str);
}

/// Reacts to changes of cell ranges in an observed container.
///
/// `from` is the first affected index (inclusive), `to` the last affected
/// index plus one (exclusive); `to - from` is always non-zero. All methods
/// default to doing nothing so observers implement only the events they
/// care about.
pub trait RangeObserver {
    /// Called before cells in `from..to` change in place.
    fn range_will_change(&self, _source: &str, _from: usize, _to: usize) {}

    /// Called after cells in `from..to` changed in place.
    fn range_did_change(&self, _source: &str, _from: usize, _to: usize) {}

    /// Called before cells `from..to` are added to the container.
    fn range_will_grow(&self, _source: &str, _from: usize, _to: usize) {}

    /// Called after cells `from..to` were added to the container.
    fn range_did_grow(&self, _source: &str, _from: usize, _to: usize) {}

    /// Called before cells `from..to` are removed from the container.
    fn range_will_shrink(&self, _source: &str, _from: usize, _to: usize) {}

    /// Called after cells `from..to` were removed from the container.
    fn range_did_shrink(&self, _source: &str, _from: usize, _to: usize) {}
}
