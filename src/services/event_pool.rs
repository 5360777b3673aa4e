// Object pools: a ClickEvent pool and a request-context pool.
// Both share the same lock-free-ish design — a `crossbeam`-free `Mutex<Vec<T>>`
// free list, since pool churn happens once per request, not once per field.

use std::sync::Mutex;

use crate::models::click_event::ClickEvent;

pub trait Reset {
    fn reset(&mut self);
}

impl Reset for ClickEvent {
    fn reset(&mut self) {
        ClickEvent::reset(self)
    }
}

/// Request-scoped fields captured once per redirect request and handed to the
/// pipeline; reused across requests the same way `ClickEvent` is.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub short_code: String,
    pub domain: String,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub accept_language: String,
}

impl Reset for RequestContext {
    fn reset(&mut self) {
        self.short_code.clear();
        self.domain.clear();
        self.ip_address.clear();
        self.user_agent.clear();
        self.referer.clear();
        self.accept_language.clear();
    }
}

/// A bounded free list of reusable `T`s. `acquire` pops a reset instance (or
/// allocates a fresh one if the pool is empty); `release` resets and returns
/// it. Thread-safe; intended to be shared process-wide via `Arc`.
pub struct Pool<T: Reset + Default> {
    free: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T: Reset + Default> Pool<T> {
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle.min(1024))),
            max_idle,
        }
    }

    pub fn acquire(&self) -> T {
        let mut free = self.free.lock().expect("pool lock poisoned");
        free.pop().unwrap_or_default()
    }

    pub fn release(&self, mut item: T) {
        item.reset();
        let mut free = self.free.lock().expect("pool lock poisoned");
        if free.len() < self.max_idle {
            free.push(item);
        }
    }

    pub fn idle_len(&self) -> usize {
        self.free.lock().expect("pool lock poisoned").len()
    }
}

pub type ClickEventPool = Pool<ClickEvent>;
pub type RequestContextPool = Pool<RequestContext>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_on_empty_pool_allocates_default() {
        let pool: ClickEventPool = Pool::new(16);
        let event = pool.acquire();
        assert_eq!(event.short_code, "");
    }

    #[test]
    fn release_resets_and_recycles() {
        let pool: ClickEventPool = Pool::new(16);
        let mut event = pool.acquire();
        event.short_code = "abc".to_string();
        let cap_before = event.short_code.capacity();

        pool.release(event);
        assert_eq!(pool.idle_len(), 1);

        let recycled = pool.acquire();
        assert_eq!(recycled.short_code, "");
        assert_eq!(recycled.short_code.capacity(), cap_before);
    }

    #[test]
    fn pool_does_not_grow_past_max_idle() {
        let pool: RequestContextPool = Pool::new(1);
        pool.release(RequestContext::default());
        pool.release(RequestContext::default());
        assert_eq!(pool.idle_len(), 1);
    }
}
