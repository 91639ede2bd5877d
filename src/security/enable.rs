//! Per-check enable switch: statically on/off, or decided per request.

use std::fmt;
use std::sync::Arc;

use super::bypass::PathRules;
use super::context::RequestContext;

type Predicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Whether an access check applies to a request.
#[derive(Clone, Default)]
pub enum Enable {
    #[default]
    Always,
    Never,
    When(Predicate),
}

impl Enable {
    /// Enable the check only for requests where `f` returns true.
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Enable::When(Arc::new(f))
    }

    /// Enable the check only for paths matched by `paths`.
    pub fn for_paths(paths: PathRules) -> Self {
        Enable::when(move |ctx| paths.matches_any(&ctx.path))
    }

    pub fn is_enabled(&self, ctx: &RequestContext) -> bool {
        match self {
            Enable::Always => true,
            Enable::Never => false,
            Enable::When(f) => f(ctx),
        }
    }

    /// Short description used in startup diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Enable::Always => "always",
            Enable::Never => "disabled",
            Enable::When(_) => "per route",
        }
    }
}

impl From<bool> for Enable {
    fn from(on: bool) -> Self {
        if on {
            Enable::Always
        } else {
            Enable::Never
        }
    }
}

impl fmt::Debug for Enable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Enable::Always => write!(f, "Always"),
            Enable::Never => write!(f, "Never"),
            Enable::When(_) => write!(f, "When(<predicate>)"),
        }
    }
}
