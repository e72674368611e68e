#![forbid(unsafe_code)]

//! Runs the host-side walkthroughs with tracing enabled, so the framework's
//! descend/ascend and playback diagnostics are visible alongside the
//! history-tree dumps.

mod managers;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_target(true)
        .init();

    managers::run_basics();
    managers::run_inline_params();
    managers::run_user_params();
    managers::run_advanced();

    println!("all walkthroughs completed");
}
