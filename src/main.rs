//! Runs the case tree against the first matching Vulkan device.
//!
//! Takes the usual libtest arguments, e.g. `vkcts ray_tracing --exact`.
//! The device is configured through `VKCTS_*` environment variables.

use std::sync::{Arc, OnceLock};

use libtest_mimic::{Arguments, Failed, Trial};
use parking_lot::Mutex;

use vkcts::{
    harness::{execute_case, Summary, TestCaseGroup},
    package::create_test_package,
    shader::Glslc,
    vulkan::Context,
    Config, StatusCode,
};

type LazyContext = OnceLock<Result<Context, vkcts::Error>>;

struct Runner {
    config: Config,
    package: TestCaseGroup<Context>,
    context: LazyContext,
    compiler: Glslc,
    summary: Mutex<Summary>,
    /// Set by the first driver or compiler error. Later cases do not run.
    aborted: Mutex<Option<String>>,
}

impl Runner {
    fn run(&self, path: &str) -> Result<(), Failed> {
        if let Some(ref reason) = *self.aborted.lock() {
            return Err(Failed::from(format!("run aborted: {reason}")));
        }
        let context = self
            .context
            .get_or_init(|| Context::new(&self.config))
            .as_ref()
            .map_err(|err| Failed::from(format!("no Vulkan context: {err}")))?;
        let case = self
            .package
            .find(path)
            .ok_or_else(|| Failed::from(format!("unknown case {path}")))?;

        log::info!("Running {}: {}", path, case.description());
        let status = match execute_case(case, context, &self.compiler) {
            Ok(status) => status,
            Err(err) => {
                let reason = format!("{path}: {err}");
                log::error!("{}", reason);
                *self.aborted.lock() = Some(reason.clone());
                return Err(Failed::from(reason));
            }
        };
        log::info!("TEST RESULT: {}", status);
        self.summary.lock().record(&status);

        match status.code() {
            StatusCode::Pass | StatusCode::NotSupported => Ok(()),
            StatusCode::Fail => Err(Failed::from(status.description())),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = Arguments::from_args();
    // Every case shares one device and its queue.
    args.test_threads = Some(1);

    let config = Config::from_env();
    log::debug!("{:?}", config);
    let runner = Arc::new(Runner {
        compiler: Glslc::new(config.glslc.clone()),
        config,
        package: create_test_package(),
        context: OnceLock::new(),
        summary: Mutex::new(Summary::default()),
        aborted: Mutex::new(None),
    });

    let trials = runner
        .package
        .cases()
        .into_iter()
        .map(|(path, _)| {
            let runner = Arc::clone(&runner);
            Trial::test(path.clone(), move || runner.run(&path))
        })
        .collect();

    let conclusion = libtest_mimic::run(&args, trials);
    if !args.list {
        println!("{}", runner.summary.lock());
    }
    conclusion.exit_if_failed();
    Ok(())
}
