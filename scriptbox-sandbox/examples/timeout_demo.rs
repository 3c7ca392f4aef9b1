//! Shows the watchdog stopping a runaway script and a memory hog

use scriptbox_sandbox::{ExecutionRequest, ResourceLimits, Runtime, V8Runtime};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> scriptbox_sandbox::Result<()> {
    tracing_subscriber::fmt::init();

    let limits = ResourceLimits::default().with_max_memory_bytes(64 * 1024 * 1024);
    let runtime = V8Runtime::with_limits(limits);

    println!("=== Infinite loop, 1s deadline ===");
    let request = ExecutionRequest::new("let n = 0; while (true) { n++; }", "loop.js")
        .with_timeout(Duration::from_secs(1));
    let started = Instant::now();
    let result = runtime.execute(request).await;
    println!(
        "exit {} after {:?}: {}",
        result.exit_code,
        started.elapsed(),
        result.summary
    );
    print!("stderr: {}", result.stderr);

    println!("\n=== Allocation loop, 64 MiB ceiling ===");
    let request = ExecutionRequest::new(
        "const keep = []; while (true) { keep.push(new Array(100000).fill(1)); }",
        "hog.js",
    )
    .with_timeout(Duration::from_secs(10));
    let result = runtime.execute(request).await;
    println!("exit {}: {}", result.exit_code, result.summary);
    print!("stderr: {}", result.stderr);

    Ok(())
}
