use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// First store failure seen by any worker. Setting it raises `abort` so the dispatch loop stops.
#[derive(Clone, Default)]
pub struct FirstError {
    message: Arc<Mutex<Option<String>>>,
    abort: Arc<AtomicBool>,
}

impl FirstError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first failure only; later ones are logged.
    pub fn record(&self, err: &anyhow::Error) {
        log::error!("Store write failed: {:#}", err);
        if let Ok(mut slot) = self.message.lock()
            && slot.is_none()
        {
            *slot = Some(format!("{:#}", err));
        }
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Call after the pool has drained: the first recorded failure, if any, as an error.
    pub fn check(&self) -> Result<()> {
        let taken = match self.message.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match taken {
            Some(msg) => Err(anyhow::anyhow!("{}", msg)),
            None if self.is_set() => Err(anyhow::anyhow!("store write failed")),
            None => Ok(()),
        }
    }
}
