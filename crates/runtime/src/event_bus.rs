/// One traced engine event.
///
/// `seq` is strictly increasing per bus, so tests can assert on ordering
/// without depending on wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub seq: u64,
    pub kind: &'static str,
    pub message: String,
}

/// Bounded, ordered trace log of engine events.
///
/// Every emitted event is also forwarded to `tracing` at debug level. Once
/// `capacity` is reached the oldest events are dropped.
#[derive(Debug)]
pub struct EventBus {
    next_seq: u64,
    capacity: usize,
    events: Vec<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 512;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_seq: 0,
            capacity: capacity.max(1),
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, kind: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "mapview::events", kind, "{message}");

        if self.events.len() >= self.capacity {
            let overflow = self.events.len() + 1 - self.capacity;
            self.events.drain(..overflow);
        }
        self.events.push(Event {
            seq: self.next_seq,
            kind,
            message,
        });
        self.next_seq += 1;
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
