use modload_logger::{LevelFilter, Logger};

#[test]
fn init_console_only_has_no_guard() {
    let logger = Logger::builder()
        .name("integration-console-only")
        .console(true)
        .json(true)
        .level(LevelFilter::INFO)
        .init()
        .expect("logger should initialize");

    tracing::info!(module = "app/main", "console only");
    assert!(logger.guard().is_none(), "console-only logger should not create a file guard");
}
