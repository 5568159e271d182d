use neurofb_core::Condition;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

const UNSET: u32 = u32::MAX;

/// Write side of the current trial condition. Only the orchestrator holds one.
#[derive(Debug)]
pub struct CurrentCondition {
    code: Arc<AtomicU32>,
}

/// Read-only view of the current trial condition.
#[derive(Debug, Clone)]
pub struct ConditionReader {
    code: Arc<AtomicU32>,
}

impl CurrentCondition {
    pub fn new() -> Self {
        Self {
            code: Arc::new(AtomicU32::new(UNSET)),
        }
    }

    pub fn set(&self, condition: Condition) {
        self.code.store(condition.code(), Ordering::Release);
    }

    pub fn clear(&self) {
        self.code.store(UNSET, Ordering::Release);
    }

    pub fn reader(&self) -> ConditionReader {
        ConditionReader {
            code: Arc::clone(&self.code),
        }
    }
}

impl Default for CurrentCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionReader {
    /// `None` outside a running session.
    pub fn get(&self) -> Option<Condition> {
        Condition::from_code(self.code.load(Ordering::Acquire))
    }
}
