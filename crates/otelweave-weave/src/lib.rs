//! The weaver: every phase of turning a matched rule set into rewritten Go source, wired
//! together by `otelweave-cli`. Each module is one component from spec.md §4: package
//! resolution, the toolexec router, the embedded rule catalog, the one-time setup pipeline,
//! per-compile weaving (including trampoline generation), link-time import tracking, and the
//! on-disk scratch layout.

pub mod resolver;
pub mod router;
pub mod rules;
pub mod setup;
pub mod tracker;
pub mod weave;
pub mod workdir;

pub use resolver::{PackageLister, SubprocessLister};
pub use router::Classification;
pub use rules::Catalog;
pub use setup::SetupOutcome;
pub use weave::{weave_compile, SourceFile, WeaveOutput};
pub use workdir::Workdir;
