//! Handler pipeline: handlers, decorators, before/after hooks.
//!
//! # Data Flow
//! ```text
//! decorator 1 → decorator 2 → ... → route handler
//!      ↑ first registered is outermost
//! ```
//!
//! # Design Decisions
//! - A decorator sees the context and a `Next` it may call zero or one times
//! - `before` and `after` are sugar over decorators
//! - Chains are composed once when the router is built

use std::sync::Arc;

use crate::context::{Context, Output};
use crate::error::Result;

/// A composed route handler.
pub type Handler = Arc<dyn Fn(&mut dyn Context) -> Result<Output> + Send + Sync>;

/// Wraps the rest of the chain.
pub type Decorator = Arc<dyn Fn(&mut dyn Context, Next<'_>) -> Result<Output> + Send + Sync>;

/// The remainder of the pipeline, handed to a decorator.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    handler: &'a (dyn Fn(&mut dyn Context) -> Result<Output> + Send + Sync),
}

impl<'a> Next<'a> {
    pub fn run(self, ctx: &mut dyn Context) -> Result<Output> {
        (self.handler)(ctx)
    }
}

/// Box a user closure into a `Handler`.
pub fn handler<F, O>(f: F) -> Handler
where
    F: Fn(&mut dyn Context) -> Result<O> + Send + Sync + 'static,
    O: Into<Output>,
{
    Arc::new(move |ctx: &mut dyn Context| f(ctx).map(Into::into))
}

/// Box a user closure into a `Decorator`.
pub fn decorator<F>(f: F) -> Decorator
where
    F: Fn(&mut dyn Context, Next<'_>) -> Result<Output> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Decorator running `f` ahead of the chain. The chain is skipped once `f` starts the response.
pub fn before<F>(f: F) -> Decorator
where
    F: Fn(&mut dyn Context) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(move |ctx: &mut dyn Context, next: Next<'_>| {
        f(&mut *ctx)?;
        if ctx.is_response_started() {
            return Ok(Output::Empty);
        }
        next.run(ctx)
    })
}

/// Decorator post-processing a successful output.
pub fn after<F>(f: F) -> Decorator
where
    F: Fn(&mut dyn Context, &mut Output) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(move |ctx: &mut dyn Context, next: Next<'_>| {
        let mut output = next.run(&mut *ctx)?;
        f(ctx, &mut output)?;
        Ok(output)
    })
}

/// Wrap `handler` with `decorators`; the first decorator ends up outermost.
pub fn compose(decorators: &[Decorator], handler: Handler) -> Handler {
    decorators.iter().rev().fold(handler, |next, decorator| {
        let decorator = Arc::clone(decorator);
        Arc::new(move |ctx: &mut dyn Context| {
            decorator(
                ctx,
                Next {
                    handler: next.as_ref(),
                },
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockContext;
    use std::sync::Mutex;

    #[test]
    fn decorators_run_outside_in() {
        let trail = Arc::new(Mutex::new(Vec::new()));
        let make = |label: &'static str| {
            let trail = Arc::clone(&trail);
            decorator(move |ctx, next| {
                trail.lock().unwrap().push(format!("{}>", label));
                let out = next.run(ctx);
                trail.lock().unwrap().push(format!("<{}", label));
                out
            })
        };
        let inner_trail = Arc::clone(&trail);
        let chain = compose(
            &[make("a"), make("b")],
            handler(move |_ctx| {
                inner_trail.lock().unwrap().push("handler".to_string());
                Ok("done")
            }),
        );

        let mut ctx = MockContext::new();
        assert_eq!(chain(&mut ctx).unwrap(), Output::Text("done".into()));
        assert_eq!(
            *trail.lock().unwrap(),
            vec!["a>", "b>", "handler", "<b", "<a"]
        );
    }

    #[test]
    fn before_short_circuits_on_started_response() {
        let chain = compose(
            &[before(|ctx| ctx.send_status(axum::http::StatusCode::UNAUTHORIZED))],
            handler(|_ctx| -> Result<&'static str> { panic!("handler must not run") }),
        );
        let mut ctx = MockContext::new();
        assert_eq!(chain(&mut ctx).unwrap(), Output::Empty);
        assert_eq!(ctx.response().status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn after_rewrites_output() {
        let chain = compose(
            &[after(|_ctx, out| {
                if let Output::Text(text) = out {
                    text.push('!');
                }
                Ok(())
            })],
            handler(|_ctx| Ok("hey")),
        );
        let mut ctx = MockContext::new();
        assert_eq!(chain(&mut ctx).unwrap(), Output::Text("hey!".into()));
    }
}
