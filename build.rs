fn main() {
    if !cfg!(unix) {
        panic!(
            "{} drives the debugger subprocess through unix pipes and signals",
            env!("CARGO_PKG_NAME")
        );
    }
}
