#[test]
fn loader_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/loader_error_pass.rs");
}
