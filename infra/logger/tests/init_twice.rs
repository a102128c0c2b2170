use modload_logger::{Logger, LoggerError, parse_level};

#[test]
fn second_subscriber_is_refused() {
    let level = parse_level("debug").expect("known level");
    let _first = Logger::builder()
        .name("modload-first")
        .level(level)
        .env_filter("modload=trace")
        .init()
        .expect("first install");

    tracing::debug!(module = "lib/math", "still routed to the first subscriber");

    let err = Logger::builder().name("modload-second").init().unwrap_err();
    assert!(matches!(err, LoggerError::Subscriber { .. }), "got {err}");
}
