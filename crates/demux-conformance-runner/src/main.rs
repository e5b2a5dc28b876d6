use demux_conformance_core::{build_matrix, CaseRunner, HarnessConfig};
use demux_conformance_runner::{build_trials, init_tracing, BrowserSettings, ChromeLauncher};
use libtest_mimic::Arguments;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};

fn main() {
    init_tracing();
    let args = Arguments::from_args();

    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };
    let cases = match build_matrix(&config) {
        Ok(cases) => cases,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };
    let settings = match BrowserSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{:#}", e);
            process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start the async runtime: {}", e);
            process::exit(2);
        }
    };

    info!("Running {} case(s) against {}", cases.len(), config.page_url);
    let launcher = Arc::new(ChromeLauncher::new(settings));
    let runner = Arc::new(CaseRunner::new(Arc::clone(&launcher), &config));
    let trials = build_trials(runner, cases, runtime.handle().clone());

    let conclusion = libtest_mimic::run(&args, trials);

    match Arc::try_unwrap(launcher) {
        Ok(launcher) => {
            if let Err(e) = runtime.block_on(launcher.shutdown()) {
                warn!("{:#}", e);
            }
        }
        Err(_) => warn!("Browser still referenced after the run; skipping shutdown"),
    }

    conclusion.exit();
}
