//! Caller-supplied hooks and link/meta resolvers.
//!
//! Every hook declares its calling convention up front: [`Hook::sync`] for a
//! closure that answers immediately, [`Hook::deferred`] for one that returns
//! a future. The codec awaits both the same way.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::HookError;
use crate::model::Resource;

type SyncFn<I, O> = dyn Fn(I) -> Result<O, HookError> + Send + Sync;
type DeferredFn<I, O> = dyn Fn(I) -> BoxFuture<'static, Result<O, HookError>> + Send + Sync;

/// A caller-supplied transformation from `I` to `O` that may fail.
pub enum Hook<I, O> {
    /// Returns its result directly.
    Sync(Arc<SyncFn<I, O>>),
    /// Returns a future that resolves to the result.
    Deferred(Arc<DeferredFn<I, O>>),
}

impl<I: 'static, O: 'static> Hook<I, O> {
    /// Wraps a closure that answers immediately.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(I) -> Result<O, HookError> + Send + Sync + 'static,
    {
        Hook::Sync(Arc::new(f))
    }

    /// Wraps a closure that returns a future.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, HookError>> + Send + 'static,
    {
        Hook::Deferred(Arc::new(
            move |input| -> BoxFuture<'static, Result<O, HookError>> { Box::pin(f(input)) },
        ))
    }

    /// Invokes the hook, awaiting it if it is deferred.
    pub async fn call(&self, input: I) -> Result<O, HookError> {
        match self {
            Hook::Sync(f) => f(input),
            Hook::Deferred(f) => f(input).await,
        }
    }
}

impl<I, O> Clone for Hook<I, O> {
    fn clone(&self) -> Self {
        match self {
            Hook::Sync(f) => Hook::Sync(Arc::clone(f)),
            Hook::Deferred(f) => Hook::Deferred(Arc::clone(f)),
        }
    }
}

impl<I, O> fmt::Debug for Hook<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Sync(_) => f.write_str("Hook::Sync(..)"),
            Hook::Deferred(_) => f.write_str("Hook::Deferred(..)"),
        }
    }
}

/// What a resolver or collection hook gets to look at.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// The resource being serialized; `None` for top-level links and meta.
    ///
    /// For relationship links and meta this is the parent resource.
    pub resource: Option<Resource>,
    /// Layered option values: codec defaults, schema pass-through values,
    /// per-call values and the per-call `request` context.
    pub options: Arc<Map<String, Value>>,
}

impl ResolveContext {
    pub fn new(resource: Option<Resource>, options: Arc<Map<String, Value>>) -> Self {
        Self { resource, options }
    }

    /// Returns a single option value.
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Returns the per-call request context, or `Null`.
    pub fn request(&self) -> &Value {
        self.options.get("request").unwrap_or(&Value::Null)
    }
}

/// Hook run on each record before it is projected.
pub type ResourceHook = Hook<Value, Value>;

/// Hook run on each collection before its items are serialized.
pub type CollectionHook = Hook<(Vec<Value>, ResolveContext), Vec<Value>>;

/// A link or meta entry: a literal value or a computed one.
#[derive(Debug, Clone)]
pub enum Resolver {
    Value(Value),
    /// Computed per resource; `Ok(None)` leaves the entry unset.
    Computed(Hook<ResolveContext, Option<Value>>),
}

impl Resolver {
    pub fn value(value: impl Into<Value>) -> Self {
        Resolver::Value(value.into())
    }

    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(ResolveContext) -> Result<Option<Value>, HookError> + Send + Sync + 'static,
    {
        Resolver::Computed(Hook::sync(f))
    }

    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(ResolveContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, HookError>> + Send + 'static,
    {
        Resolver::Computed(Hook::deferred(f))
    }

    pub(crate) async fn resolve(&self, ctx: &ResolveContext) -> Result<Option<Value>, HookError> {
        match self {
            Resolver::Value(value) => Ok(Some(value.clone())),
            Resolver::Computed(hook) => hook.call(ctx.clone()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ResolveContext {
        let mut options = Map::new();
        options.insert("baseUrl".to_string(), json!("https://example.com"));
        options.insert("request".to_string(), json!({"page": 2}));
        ResolveContext::new(Some(Resource::new("users", "1")), Arc::new(options))
    }

    #[tokio::test]
    async fn test_sync_and_deferred_hooks() {
        let double = Hook::<i64, i64>::sync(|n| Ok(n * 2));
        assert_eq!(double.call(21).await.unwrap(), 42);

        let later = Hook::<i64, i64>::deferred(|n| async move {
            tokio::task::yield_now().await;
            Ok(n + 1)
        });
        assert_eq!(later.call(1).await.unwrap(), 2);

        let failing = Hook::<i64, i64>::sync(|_| Err(HookError::new("nope").with_status(418)));
        let err = failing.call(0).await.unwrap_err();
        assert_eq!(err.status(), Some(418));
    }

    #[tokio::test]
    async fn test_resolvers() {
        let ctx = context();

        let literal = Resolver::value("static");
        assert_eq!(literal.resolve(&ctx).await.unwrap(), Some(json!("static")));

        let computed = Resolver::sync(|ctx| {
            let base = ctx.option("baseUrl").and_then(Value::as_str).unwrap_or("");
            let id = ctx.resource.as_ref().map(|r| r.id.clone()).unwrap_or_default();
            Ok(Some(json!(format!("{base}/users/{id}"))))
        });
        assert_eq!(
            computed.resolve(&ctx).await.unwrap(),
            Some(json!("https://example.com/users/1"))
        );

        let page = Resolver::deferred(|ctx| async move { Ok(ctx.request().get("page").cloned()) });
        assert_eq!(page.resolve(&ctx).await.unwrap(), Some(json!(2)));

        let unset = Resolver::sync(|_| Ok(None));
        assert_eq!(unset.resolve(&ctx).await.unwrap(), None);
    }
}
