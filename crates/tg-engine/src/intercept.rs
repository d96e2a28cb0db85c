//! Request interception middleware chain.
//!
//! The host wraps the page's request-issuing primitive exactly once and
//! consults the chain for every outgoing request. Middlewares are asked in
//! registration order; the first short-circuit wins, and anything else
//! passes through unchanged. The explicit installed flag replaces
//! wrapper-detection heuristics: wrapping composes by never happening
//! twice.

use tg_core::patterns::PatternTable;

/// What to do with an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Forward unchanged and pass the result through untouched.
    PassThrough,
    /// Terminate with an empty success response.
    ShortCircuit,
}

/// One participant in the interception chain.
pub trait RequestMiddleware {
    fn handle(&mut self, url: &str) -> RequestOutcome;
}

/// Middleware classifying requests against the ad pattern table.
#[derive(Debug, Clone)]
pub struct PatternMiddleware {
    table: PatternTable,
}

impl PatternMiddleware {
    pub fn new(table: PatternTable) -> Self {
        Self { table }
    }
}

impl RequestMiddleware for PatternMiddleware {
    fn handle(&mut self, url: &str) -> RequestOutcome {
        match self.table.classify(url) {
            Some(pattern) => {
                log::debug!("ad request matched {:?}: {}", pattern.source(), url);
                RequestOutcome::ShortCircuit
            }
            None => RequestOutcome::PassThrough,
        }
    }
}

/// Ordered middleware chain with an install-once guard.
#[derive(Default)]
pub struct InterceptorChain {
    middlewares: Vec<Box<dyn RequestMiddleware>>,
    installed: bool,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware at the end of the chain.
    pub fn register(&mut self, middleware: Box<dyn RequestMiddleware>) {
        self.middlewares.push(middleware);
    }

    /// Claim the host wrapping. Returns false when the chain is already
    /// installed, in which case the caller must not wrap again.
    pub fn try_install(&mut self) -> bool {
        if self.installed {
            return false;
        }
        self.installed = true;
        true
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Ask each middleware in order; first short-circuit wins.
    pub fn dispatch(&mut self, url: &str) -> RequestOutcome {
        for middleware in &mut self.middlewares {
            if middleware.handle(url) == RequestOutcome::ShortCircuit {
                return RequestOutcome::ShortCircuit;
            }
        }
        RequestOutcome::PassThrough
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOutcome(RequestOutcome);

    impl RequestMiddleware for FixedOutcome {
        fn handle(&mut self, _url: &str) -> RequestOutcome {
            self.0
        }
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let mut chain = InterceptorChain::new();
        assert_eq!(chain.dispatch("https://example.com/"), RequestOutcome::PassThrough);
    }

    #[test]
    fn test_first_short_circuit_wins() {
        let mut chain = InterceptorChain::new();
        chain.register(Box::new(FixedOutcome(RequestOutcome::PassThrough)));
        chain.register(Box::new(FixedOutcome(RequestOutcome::ShortCircuit)));
        assert_eq!(chain.dispatch("https://example.com/"), RequestOutcome::ShortCircuit);
    }

    #[test]
    fn test_install_once() {
        let mut chain = InterceptorChain::new();
        assert!(chain.try_install());
        assert!(!chain.try_install());
        assert!(chain.is_installed());
    }

    #[test]
    fn test_pattern_middleware() {
        let mut middleware = PatternMiddleware::new(PatternTable::defaults());
        assert_eq!(
            middleware.handle("https://static.doubleclick.net/ads.js"),
            RequestOutcome::ShortCircuit
        );
        assert_eq!(
            middleware.handle("https://www.youtube.com/watch?v=abc"),
            RequestOutcome::PassThrough
        );
    }
}
