#![cfg(unix)]

mod common;

use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mvnenv_core::{ExecutorOptions, ShimExecutor};
use mvnenv_platform::{ShimLayout, ToolPaths};

use common::TestResolver;

// Kept in its own test binary: the signal goes to the whole test process.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sigterm_to_the_dispatcher_kills_the_child_promptly() {
    let temp = tempfile::tempdir().expect("tempdir should be created");
    let paths = ToolPaths::at(temp.path());
    let started_flag = temp.path().join("child-started");
    let bin = paths.version_dir("3.9.4").join("bin");
    std::fs::create_dir_all(&bin).expect("bin dir should be created");
    let script = bin.join("mvn");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\ntouch '{}'\nexec sleep 60\n",
            started_flag.display()
        ),
    )
    .expect("script should be written");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
        .expect("script should be executable");

    let resolver = Arc::new(TestResolver::new(temp.path()));
    resolver.set_active("3.9.4");
    let executor = ShimExecutor::new(
        ShimLayout::unix(),
        resolver,
        ExecutorOptions {
            diagnostics: false,
            kill_grace: Duration::from_secs(5),
        },
    );

    let started = Instant::now();
    let running = tokio::spawn(async move {
        let args: Vec<OsString> = Vec::new();
        executor.run("mvn", &args).await
    });

    // Handlers are armed before the child is spawned, so once the child has
    // written its flag a SIGTERM is routed to the executor.
    while !started_flag.exists() {
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "child never started"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("kill should run");
    assert!(status.success());

    let code = tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("dispatcher should stop within the grace period")
        .expect("dispatcher task should not panic")
        .expect("dispatcher should report the child's exit code");

    assert_eq!(code, 128 + 9);
    assert!(started.elapsed() < Duration::from_secs(20));
}
