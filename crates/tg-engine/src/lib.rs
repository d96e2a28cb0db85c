//! TubeGuard Engine
//!
//! The host-facing half of TubeGuard: everything that touches the live page
//! goes through the `Dom` trait defined here, so the whole
//! observe-classify-suppress pipeline runs identically against the browser
//! adapter and against the mock used in tests.
//!
//! # Modules
//!
//! - `dom`: traits abstracting the host page surface
//! - `features`: feature extraction from a DOM node
//! - `actuate`: suppression actions (hide, skip, mute, strip)
//! - `intercept`: request interception middleware chain
//! - `stats`: statistics sink interface
//! - `session`: the observation-loop session object

pub mod actuate;
pub mod dom;
pub mod features;
pub mod intercept;
pub mod session;
pub mod stats;

pub use dom::{Dom, DomError, DomNode, VideoState};
pub use intercept::{InterceptorChain, PatternMiddleware, RequestMiddleware, RequestOutcome};
pub use session::{LoopConfig, Session};
pub use stats::{NullSink, StatsSink};
