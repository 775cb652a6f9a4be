//! Event brokers with weak observer registration.
//!
//! A broker is embedded in each observable object and fans its `will_*` /
//! `did_*` calls out to the registered observers. Registration identity is
//! the observer allocation itself, so the same `Rc` used to register also
//! removes; observers are stored as [`Weak`] references and pruned once
//! their last strong reference is gone.

use crate::observe::{PropertyObserver, RangeObserver};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

struct PropertyRegistration {
    observer: Weak<dyn PropertyObserver>,
    key: *const (),
    /// Watched property names; `None` watches every property.
    names: Option<HashSet<String>>,
}

impl PropertyRegistration {
    fn watches(&self, property: &str) -> bool {
        match &self.names {
            None => true,
            Some(names) => names.contains(property),
        }
    }
}

/// Dispatches before/after notifications for named property changes.
///
/// `will_change(name)` must be followed by exactly one `did_change()`;
/// pairs never nest.
pub struct PropertyBroker {
    source: String,
    registrations: Vec<PropertyRegistration>,
    pending: Option<String>,
}

impl PropertyBroker {
    /// Creates a broker whose callbacks identify the observed object by
    /// `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            registrations: Vec::new(),
            pending: None,
        }
    }

    /// Returns the source tag passed to observer callbacks.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Registers an observer for the given property names, or for every
    /// property when `properties` is `None`.
    ///
    /// Registering an already-known observer widens its watched set; once
    /// an observer watches everything, further subsets are absorbed. Only a
    /// weak reference is held - the registration never keeps the observer
    /// alive.
    pub fn add_observer<O>(&mut self, observer: &Rc<O>, properties: Option<&[&str]>)
    where
        O: PropertyObserver + 'static,
    {
        let key = Rc::as_ptr(observer) as *const ();
        if let Some(registration) = self.registrations.iter_mut().find(|r| r.key == key) {
            match properties {
                None => registration.names = None,
                Some(added) => {
                    if let Some(names) = &mut registration.names {
                        names.extend(added.iter().map(|n| n.to_string()));
                    }
                }
            }
            return;
        }
        let observer: Rc<dyn PropertyObserver> = observer.clone();
        self.registrations.push(PropertyRegistration {
            observer: Rc::downgrade(&observer),
            key,
            names: properties.map(|names| names.iter().map(|n| n.to_string()).collect()),
        });
    }

    /// Removes the given property names from an observer's watched set, or
    /// the whole registration when `properties` is `None`. An observer
    /// whose watched set empties is dropped entirely.
    pub fn remove_observer<O>(&mut self, observer: &Rc<O>, properties: Option<&[&str]>)
    where
        O: PropertyObserver + 'static,
    {
        let key = Rc::as_ptr(observer) as *const ();
        match properties {
            None => self.registrations.retain(|r| r.key != key),
            Some(removed) => {
                let mut drop_entry = false;
                if let Some(registration) = self.registrations.iter_mut().find(|r| r.key == key) {
                    if let Some(names) = &mut registration.names {
                        for name in removed {
                            names.remove(*name);
                        }
                        drop_entry = names.is_empty();
                    }
                }
                if drop_entry {
                    self.registrations.retain(|r| r.key != key);
                }
            }
        }
    }

    /// Notifies watchers that `property` is about to change.
    pub fn will_change(&mut self, property: &str) {
        debug_assert!(
            self.pending.is_none(),
            "property change notifications must not nest"
        );
        self.pending = Some(property.to_string());
        for observer in self.watchers(property) {
            observer.property_will_change(&self.source, property);
        }
    }

    /// Notifies watchers that the property announced by the preceding
    /// [`will_change`](Self::will_change) has changed.
    pub fn did_change(&mut self) {
        let Some(property) = self.pending.take() else {
            debug_assert!(false, "did_change without a matching will_change");
            return;
        };
        for observer in self.watchers(&property) {
            observer.property_did_change(&self.source, &property);
        }
    }

    /// Upgrades the live watchers of `property`, pruning dead
    /// registrations on the way.
    fn watchers(&mut self, property: &str) -> Vec<Rc<dyn PropertyObserver>> {
        self.registrations
            .retain(|r| r.observer.strong_count() > 0);
        self.registrations
            .iter()
            .filter(|r| r.watches(property))
            .filter_map(|r| r.observer.upgrade())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RangeEvent {
    Change,
    Grow,
    Shrink,
}

struct RangeRegistration {
    observer: Weak<dyn RangeObserver>,
    key: *const (),
}

/// Dispatches before/after notifications for container range changes.
///
/// Three paired event kinds exist: in-place change, growth, and shrinkage.
/// Every `will_*` must be closed by the `did_*` of the same kind; pairs
/// never nest. Ranges are half-open and never empty.
pub struct RangeBroker {
    source: String,
    registrations: Vec<RangeRegistration>,
    pending: Option<(RangeEvent, usize, usize)>,
}

impl RangeBroker {
    /// Creates a broker whose callbacks identify the observed container by
    /// `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            registrations: Vec::new(),
            pending: None,
        }
    }

    /// Registers an observer for all range events of this container.
    /// Only a weak reference is held.
    pub fn add_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: RangeObserver + 'static,
    {
        let key = Rc::as_ptr(observer) as *const ();
        if self.registrations.iter().any(|r| r.key == key) {
            return;
        }
        let observer: Rc<dyn RangeObserver> = observer.clone();
        self.registrations.push(RangeRegistration {
            observer: Rc::downgrade(&observer),
            key,
        });
    }

    /// Removes an observer's registration.
    pub fn remove_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: RangeObserver + 'static,
    {
        let key = Rc::as_ptr(observer) as *const ();
        self.registrations.retain(|r| r.key != key);
    }

    /// Notifies observers that cells `from..to` are about to change in
    /// place.
    pub fn will_change(&mut self, from: usize, to: usize) {
        self.begin(RangeEvent::Change, from, to);
    }

    /// Closes the pending in-place change notification.
    pub fn did_change(&mut self) {
        self.finish(RangeEvent::Change);
    }

    /// Notifies observers that cells `from..to` are about to be added.
    pub fn will_grow(&mut self, from: usize, to: usize) {
        self.begin(RangeEvent::Grow, from, to);
    }

    /// Closes the pending growth notification.
    pub fn did_grow(&mut self) {
        self.finish(RangeEvent::Grow);
    }

    /// Notifies observers that cells `from..to` are about to be removed.
    pub fn will_shrink(&mut self, from: usize, to: usize) {
        self.begin(RangeEvent::Shrink, from, to);
    }

    /// Closes the pending shrinkage notification.
    pub fn did_shrink(&mut self) {
        self.finish(RangeEvent::Shrink);
    }

    fn begin(&mut self, event: RangeEvent, from: usize, to: usize) {
        debug_assert!(
            self.pending.is_none(),
            "range change notifications must not nest"
        );
        debug_assert!(to > from, "range notifications cover at least one cell");
        self.pending = Some((event, from, to));
        for observer in self.live() {
            match event {
                RangeEvent::Change => observer.range_will_change(&self.source, from, to),
                RangeEvent::Grow => observer.range_will_grow(&self.source, from, to),
                RangeEvent::Shrink => observer.range_will_shrink(&self.source, from, to),
            }
        }
    }

    fn finish(&mut self, event: RangeEvent) {
        let Some((_began, from, to)) = self.pending.take() else {
            debug_assert!(false, "did-notification without a matching will-notification");
            return;
        };
        debug_assert!(_began == event, "mismatched range notification pair");
        for observer in self.live() {
            match event {
                RangeEvent::Change => observer.range_did_change(&self.source, from, to),
                RangeEvent::Grow => observer.range_did_grow(&self.source, from, to),
                RangeEvent::Shrink => observer.range_did_shrink(&self.source, from, to),
            }
        }
    }

    fn live(&mut self) -> Vec<Rc<dyn RangeObserver>> {
        self.registrations
            .retain(|r| r.observer.strong_count() > 0);
        self.registrations
            .iter()
            .filter_map(|r| r.observer.upgrade())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }
    }

    impl PropertyObserver for Recorder {
        fn property_will_change(&self, source: &str, property: &str) {
            self.events
                .borrow_mut()
                .push(format!("will {}.{}", source, property));
        }

        fn property_did_change(&self, source: &str, property: &str) {
            self.events
                .borrow_mut()
                .push(format!("did {}.{}", source, property));
        }
    }

    impl RangeObserver for Recorder {
        fn range_will_change(&self, source: &str, from: usize, to: usize) {
            self.events
                .borrow_mut()
                .push(format!("will change {}[{}..{}]", source, from, to));
        }

        fn range_did_change(&self, source: &str, from: usize, to: usize) {
            self.events
                .borrow_mut()
                .push(format!("did change {}[{}..{}]", source, from, to));
        }

        fn range_will_grow(&self, source: &str, from: usize, to: usize) {
            self.events
                .borrow_mut()
                .push(format!("will grow {}[{}..{}]", source, from, to));
        }

        fn range_did_grow(&self, source: &str, from: usize, to: usize) {
            self.events
                .borrow_mut()
                .push(format!("did grow {}[{}..{}]", source, from, to));
        }
    }

    #[test]
    fn property_notifications_are_paired() {
        let mut broker = PropertyBroker::new("machine");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder, None);

        broker.will_change("pc");
        broker.did_change();

        assert_eq!(recorder.events(), vec!["will machine.pc", "did machine.pc"]);
    }

    #[test]
    fn property_observers_filter_by_name() {
        let mut broker = PropertyBroker::new("machine");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder, Some(&["pc"]));

        broker.will_change("sp");
        broker.did_change();
        broker.will_change("pc");
        broker.did_change();

        assert_eq!(recorder.events(), vec!["will machine.pc", "did machine.pc"]);
    }

    #[test]
    fn re_registration_widens_the_watched_set() {
        let mut broker = PropertyBroker::new("machine");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder, Some(&["pc"]));
        broker.add_observer(&recorder, Some(&["sp"]));

        broker.will_change("sp");
        broker.did_change();

        assert_eq!(recorder.events(), vec!["will machine.sp", "did machine.sp"]);
        assert_eq!(broker.registrations.len(), 1);
    }

    #[test]
    fn removing_the_last_watched_name_drops_the_registration() {
        let mut broker = PropertyBroker::new("machine");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder, Some(&["pc", "sp"]));

        broker.remove_observer(&recorder, Some(&["pc"]));
        assert_eq!(broker.registrations.len(), 1);
        broker.remove_observer(&recorder, Some(&["sp"]));
        assert!(broker.registrations.is_empty());
    }

    #[test]
    fn dropped_observers_are_pruned_silently() {
        let mut broker = PropertyBroker::new("machine");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder, None);
        drop(recorder);

        broker.will_change("pc");
        broker.did_change();

        assert!(broker.registrations.is_empty());
    }

    #[test]
    fn range_notifications_carry_the_half_open_range() {
        let mut broker = RangeBroker::new("S");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder);

        broker.will_grow(0, 2);
        broker.did_grow();
        broker.will_change(1, 2);
        broker.did_change();

        assert_eq!(
            recorder.events(),
            vec![
                "will grow S[0..2]",
                "did grow S[0..2]",
                "will change S[1..2]",
                "did change S[1..2]",
            ]
        );
    }

    #[test]
    fn removed_range_observer_stops_receiving() {
        let mut broker = RangeBroker::new("H");
        let recorder = Rc::new(Recorder::default());
        broker.add_observer(&recorder);
        broker.remove_observer(&recorder);

        broker.will_grow(0, 1);
        broker.did_grow();

        assert!(recorder.events().is_empty());
    }
}
