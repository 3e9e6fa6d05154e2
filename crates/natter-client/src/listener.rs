//! Listener registration and fan-out for received commands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use natter_protocol::Command;

/// Subscriber invoked with every command the session receives.
///
/// Invocations happen on the session's receive task, synchronously and in
/// registration order. A listener may add or remove listeners (including
/// itself) from inside the callback.
pub trait CommandListener: Send + Sync {
    /// Called once per received command.
    fn on_command(&self, command: &Command);
}

impl<F> CommandListener for F
where
    F: Fn(&Command) + Send + Sync,
{
    fn on_command(&self, command: &Command) {
        self(command)
    }
}

/// Opaque handle identifying one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The set of registered listeners.
///
/// Dispatch iterates over a snapshot taken under a short lock, so
/// concurrent add/remove never faults and never alters an in-flight
/// iteration.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Arc<dyn CommandListener>)>>,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, listener: Arc<dyn CommandListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().expect("listener lock poisoned");
        entries.push((id, listener));
        id
    }

    /// Removes a registration. Returns false if the id was not present.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().expect("listener lock poisoned");
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub(crate) fn dispatch(&self, command: &Command) {
        let snapshot: Vec<Arc<dyn CommandListener>> = {
            let entries = self.entries.lock().expect("listener lock poisoned");
            entries.iter().map(|(_, listener)| listener.clone()).collect()
        };
        for listener in snapshot {
            listener.on_command(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_listener() -> (Arc<dyn CommandListener>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = Arc::new(move |command: &Command| {
            sink.lock().unwrap().push(command.kind().to_string());
        });
        (listener, seen)
    }

    #[test]
    fn dispatch_reaches_every_listener_in_order() {
        let set = ListenerSet::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = order.clone();
            set.add(Arc::new(move |_: &Command| {
                order.lock().unwrap().push(tag);
            }));
        }

        set.dispatch(&Command::End);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn removed_listener_is_not_invoked() {
        let set = ListenerSet::new();
        let (l1, seen1) = recording_listener();
        let (l2, seen2) = recording_listener();
        let id1 = set.add(l1);
        set.add(l2);

        set.dispatch(&Command::public_message("one"));
        assert!(set.remove(id1));
        set.dispatch(&Command::public_message("two"));

        assert_eq!(seen1.lock().unwrap().len(), 1);
        assert_eq!(seen2.lock().unwrap().len(), 2);
    }

    #[test]
    fn remove_unknown_id_is_a_noop() {
        let set = ListenerSet::new();
        let id = set.add(Arc::new(|_: &Command| {}));
        assert!(set.remove(id));
        assert!(!set.remove(id));
    }

    #[test]
    fn listener_can_remove_itself_during_dispatch() {
        let set = Arc::new(ListenerSet::new());
        let fired = Arc::new(Mutex::new(0usize));

        let set_handle = set.clone();
        let fired_handle = fired.clone();
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let slot = id_slot.clone();
        let id = set.add(Arc::new(move |_: &Command| {
            *fired_handle.lock().unwrap() += 1;
            if let Some(id) = *slot.lock().unwrap() {
                set_handle.remove(id);
            }
        }));
        *id_slot.lock().unwrap() = Some(id);

        set.dispatch(&Command::End);
        set.dispatch(&Command::End);
        assert_eq!(*fired.lock().unwrap(), 1);
    }
}
