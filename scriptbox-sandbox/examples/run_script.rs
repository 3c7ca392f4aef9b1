//! Run a script through the sandbox and print the markdown report
//!
//! Usage: cargo run --example run_script -- [path/to/config.toml]
//!
//! Uses esbuild when it is on `PATH`, otherwise runs the code unbundled.

use scriptbox_sandbox::{
    ExecutionReport, PassthroughBundler, SandboxConfig, SandboxService, V8Runtime,
};

const SCRIPT: &str = r#"
const greet = (name) => `Hello, ${name}!`;
console.log(greet("sandbox"));
console.log("random bytes:", crypto.getRandomValues(new Uint8Array(4)).length);
console.error("this goes to stderr");
"#;

#[tokio::main]
async fn main() -> scriptbox_sandbox::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scriptbox_sandbox=info".into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SandboxConfig::load(path)?,
        None => SandboxConfig::default(),
    };

    let service = if esbuild_on_path(&config).await {
        SandboxService::from_config(&config)
    } else {
        println!("esbuild not found, running without bundling\n");
        SandboxService::new(
            V8Runtime::with_limits(config.limits.clone()),
            PassthroughBundler,
        )
        .with_default_timeout_ms(config.default_timeout_ms)
    };

    println!(
        "Runtime: {}, bundler: {}\n",
        service.runtime_name(),
        service.bundler_name()
    );

    let outcome = service.execute_script(SCRIPT, 0).await?;
    println!("{}", ExecutionReport::from_outcome(&outcome).to_markdown());

    Ok(())
}

async fn esbuild_on_path(config: &SandboxConfig) -> bool {
    tokio::process::Command::new(&config.bundler.esbuild_path)
        .arg("--version")
        .output()
        .await
        .map(|out| out.status.success())
        .unwrap_or(false)
}
