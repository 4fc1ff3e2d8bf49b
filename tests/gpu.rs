use vkcts::{
    harness::execute_case,
    package::create_test_package,
    shader::Glslc,
    vulkan::Context,
    Config,
};

fn create_context(config: &Config) -> Option<Context> {
    let _ = env_logger::builder().is_test(true).try_init();
    match Context::new(config) {
        Ok(context) => Some(context),
        Err(err) => {
            log::warn!("Skipping, no Vulkan context: {}", err);
            None
        }
    }
}

/// Runs the whole tree on the first device. Skips when there is no Vulkan loader or device.
#[test]
fn run_on_first_device() {
    let config = Config::from_env();
    let Some(context) = create_context(&config) else {
        return;
    };
    let compiler = Glslc::new(config.glslc.clone());
    let package = create_test_package();

    for (path, case) in package.cases() {
        if path.starts_with("ray_tracing.") && !glslc_available(&config) {
            log::warn!("Skipping {}, no shader compiler", path);
            continue;
        }
        let status = execute_case(case, &context, &compiler)
            .unwrap_or_else(|err| panic!("{path}: {err}"));
        if path.starts_with("ray_tracing.") {
            assert!(!status.is_fail(), "{path}: {status}");
        }
    }
}

#[test]
fn null_as_repeats_its_verdict() {
    const PATH: &str = "ray_tracing.null_as.test";

    let config = Config::from_env();
    let Some(context) = create_context(&config) else {
        return;
    };
    if !glslc_available(&config) {
        log::warn!("Skipping {}, no shader compiler", PATH);
        return;
    }
    let compiler = Glslc::new(config.glslc.clone());
    let package = create_test_package();
    let case = package.find(PATH).expect("case is registered");

    let first = execute_case(case, &context, &compiler).unwrap_or_else(|err| panic!("{PATH}: {err}"));
    let second = execute_case(case, &context, &compiler).unwrap_or_else(|err| panic!("{PATH}: {err}"));
    assert_eq!(first.code(), second.code());
    assert_eq!(first.description(), second.description());
}

fn glslc_available(config: &Config) -> bool {
    std::process::Command::new(&config.glslc)
        .arg("--version")
        .output()
        .map_or(false, |output| output.status.success())
}
