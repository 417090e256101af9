//! Broker in-memory con colas por topic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::errors::ChannelError;
use crate::event::Topic;

use super::{InboundMessage, MessageSink, MessageSource};

const DEFAULT_CAPACITY: usize = 1_024;

#[derive(Default)]
struct BrokerInner {
    queues: HashMap<Topic, VecDeque<InboundMessage>>,
}

/// Broker compartible entre productores y consumidores (clonar es barato).
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
    arrived: Arc<Condvar>,
    capacity: usize,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl InMemoryBroker {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(BrokerInner::default())),
               arrived: Arc::new(Condvar::new()),
               capacity }
    }

    /// Consumidor sobre un topic concreto.
    pub fn source(&self, topic: Topic) -> InMemorySource {
        InMemorySource { broker: self.clone(),
                         topic }
    }

    /// Vacía un topic (utilidad para tests/demos que simulan workers).
    pub fn drain(&self, topic: Topic) -> Vec<InboundMessage> {
        let mut inner = self.inner.lock().expect("broker lock");
        inner.queues
             .get_mut(&topic)
             .map(|q| q.drain(..).collect())
             .unwrap_or_default()
    }

    pub fn len(&self, topic: Topic) -> usize {
        let inner = self.inner.lock().expect("broker lock");
        inner.queues.get(&topic).map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_empty(&self, topic: Topic) -> bool {
        self.len(topic) == 0
    }

    /// Encola directamente (lado "worker de etapa" en tests/demos).
    pub fn push(&self, topic: Topic, key: &str, value: &str) -> Result<(), ChannelError> {
        let mut inner = self.inner.lock().expect("broker lock");
        let queue = inner.queues.entry(topic).or_default();
        if queue.len() >= self.capacity {
            return Err(ChannelError::QueueFull { pending: queue.len() });
        }
        queue.push_back(InboundMessage { key: key.to_string(),
                                         value: value.to_string() });
        self.arrived.notify_all();
        Ok(())
    }
}

impl MessageSink for InMemoryBroker {
    fn produce(&self, topic: Topic, key: &str, value: &str) -> Result<(), ChannelError> {
        self.push(topic, key, value)
    }
}

/// Vista consumidora de un topic del broker in-memory.
pub struct InMemorySource {
    broker: InMemoryBroker,
    topic: Topic,
}

impl MessageSource for InMemorySource {
    /// Espera acotada: despierta en cuanto `push` publica en el broker o
    /// cuando vence el timeout, lo que ocurra antes.
    fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, ChannelError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.broker.inner.lock().expect("broker lock");
        loop {
            if let Some(msg) = inner.queues.get_mut(&self.topic).and_then(VecDeque::pop_front) {
                return Ok(Some(msg));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            inner = self.broker
                        .arrived
                        .wait_timeout(inner, deadline - now)
                        .expect("broker lock")
                        .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produced_messages_are_polled_in_order() {
        let broker = InMemoryBroker::default();
        broker.produce(Topic::Dispatcher, "k1", "a").unwrap();
        broker.produce(Topic::Dispatcher, "k1", "b").unwrap();
        let mut source = broker.source(Topic::Dispatcher);
        assert_eq!(source.poll(Duration::from_millis(1)).unwrap().unwrap().value, "a");
        assert_eq!(source.poll(Duration::from_millis(1)).unwrap().unwrap().value, "b");
        assert_eq!(source.poll(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn poll_on_an_empty_topic_waits_for_the_timeout() {
        let broker = InMemoryBroker::default();
        let mut source = broker.source(Topic::Dispatcher);
        let started = Instant::now();
        assert_eq!(source.poll(Duration::from_millis(30)).unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn full_buffer_fails_loudly() {
        let broker = InMemoryBroker::with_capacity(1);
        broker.produce(Topic::TextEncoding, "k", "a").unwrap();
        let err = broker.produce(Topic::TextEncoding, "k", "b").unwrap_err();
        assert_eq!(err, ChannelError::QueueFull { pending: 1 });
    }
}
