//! Turns the case matrix into libtest trials
//!
//! Each trial blocks on its case through a runtime handle, so libtest-mimic's
//! own thread pool decides how many cases run at once (`--test-threads`).

use demux_conformance_core::{CaseRunner, PageLauncher, TestCase};
use libtest_mimic::{Failed, Trial};
use std::sync::Arc;
use tokio::runtime::Handle;

/// One trial per case, named `<scenario>::<sample>` and kinded by scenario
///
/// Must be run from outside the runtime `handle` belongs to.
pub fn build_trials<L>(
    runner: Arc<CaseRunner<L>>,
    cases: Vec<TestCase>,
    handle: Handle,
) -> Vec<Trial>
where
    L: PageLauncher + 'static,
{
    cases
        .into_iter()
        .map(|case| {
            let runner = Arc::clone(&runner);
            let handle = handle.clone();
            let kind = case.scenario.slug();
            Trial::test(case.name(), move || {
                handle
                    .block_on(runner.execute(&case))
                    .into_result()
                    .map_err(|failure| Failed::from(failure.to_string()))
            })
            .with_kind(kind)
        })
        .collect()
}
