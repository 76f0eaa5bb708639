use std::sync::atomic::{AtomicU64, Ordering};

/// Which public operation a model call was made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Act,
    Extract,
    Observe,
    Agent,
}

#[derive(Debug, Default)]
struct Counters {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    inference_time_ms: AtomicU64,
}

impl Counters {
    fn add(&self, prompt: u64, completion: u64, time_ms: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.inference_time_ms.fetch_add(time_ms, Ordering::Relaxed);
    }
}

/// Token usage and inference latency, accumulated per operation.
///
/// Interior-mutable so a shared handle can be updated from handlers without
/// locking.
#[derive(Debug, Default)]
pub struct Metrics {
    act: Counters,
    extract: Counters,
    observe: Counters,
    agent: Counters,
    total: Counters,
}

/// A point-in-time reading of one operation's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub inference_time_ms: u64,
}

impl Metrics {
    pub fn record(&self, op: Operation, prompt: u64, completion: u64, time_ms: u64) {
        let counters = match op {
            Operation::Act => &self.act,
            Operation::Extract => &self.extract,
            Operation::Observe => &self.observe,
            Operation::Agent => &self.agent,
        };
        counters.add(prompt, completion, time_ms);
        self.total.add(prompt, completion, time_ms);
    }

    pub fn usage(&self, op: Operation) -> Usage {
        let counters = match op {
            Operation::Act => &self.act,
            Operation::Extract => &self.extract,
            Operation::Observe => &self.observe,
            Operation::Agent => &self.agent,
        };
        Self::read(counters)
    }

    pub fn total(&self) -> Usage {
        Self::read(&self.total)
    }

    fn read(counters: &Counters) -> Usage {
        Usage {
            prompt_tokens: counters.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: counters.completion_tokens.load(Ordering::Relaxed),
            inference_time_ms: counters.inference_time_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_per_operation_and_total() {
        let m = Metrics::default();
        m.record(Operation::Observe, 100, 20, 350);
        m.record(Operation::Observe, 50, 10, 150);
        m.record(Operation::Extract, 200, 40, 700);

        let observe = m.usage(Operation::Observe);
        assert_eq!(observe.prompt_tokens, 150);
        assert_eq!(observe.completion_tokens, 30);
        assert_eq!(observe.inference_time_ms, 500);

        let total = m.total();
        assert_eq!(total.prompt_tokens, 350);
        assert_eq!(total.completion_tokens, 70);

        let act = m.usage(Operation::Act);
        assert_eq!(act.prompt_tokens, 0);
    }
}
