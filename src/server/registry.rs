use std::collections::HashMap;
use std::sync::Arc;

use crate::http::request::{Method, Request};
use crate::http::writer::ResponseWriter;

/// Application logic for one route.
///
/// A handler must finish every request it accepts with a terminal
/// response on `response`; returning `Err` (or panicking) before that lets
/// the dispatcher answer 500 instead.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request, response: &ResponseWriter) -> anyhow::Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&Request, &ResponseWriter) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, request: &Request, response: &ResponseWriter) -> anyhow::Result<()> {
        self(request, response)
    }
}

/// Exact-match routing table keyed by method, then path.
///
/// Filled during setup and only read afterwards.
#[derive(Default)]
pub struct Registry {
    routes: HashMap<Method, HashMap<String, Arc<dyn Handler>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Registering the same method and path again replaces
    /// the earlier handler.
    pub fn register(&mut self, method: Method, path: impl Into<String>, handler: impl Handler) {
        let path = path.into();
        tracing::debug!(%method, path = %path, "Registering handler");
        self.routes
            .entry(method)
            .or_default()
            .insert(path, Arc::new(handler));
    }

    pub fn lookup(&self, method: Method, path: &str) -> Option<Arc<dyn Handler>> {
        self.routes.get(&method)?.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
