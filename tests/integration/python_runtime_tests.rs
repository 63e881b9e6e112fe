//! Live tests against a real `python3`; skipped when no interpreter loads

use crate::common::*;
use assert_matches::assert_matches;
use pyblocks_common::RunOutcome;
use pyblocks_sandbox::{ClickOutcome, Console, ProcessRuntime, RunController};
use std::sync::Arc;
use std::time::Duration;

async fn python_controller(source: Arc<SwitchableSource>) -> Option<(Arc<RunController>, Console)> {
    let runtime = ProcessRuntime::new().with_boot_timeout(Duration::from_secs(20));
    let console = Console::new();
    let controller = Arc::new(RunController::new(runtime, console.clone(), source));
    match controller.boot().await {
        Ok(()) => Some((controller, console)),
        Err(e) => {
            eprintln!("Skipping live interpreter test: {}", e);
            None
        }
    }
}

#[tokio::test]
async fn test_python_print_and_fault() {
    setup_test_logging();

    let source = SwitchableSource::new("print('hi')");
    let Some((controller, _console)) = python_controller(source.clone()).await else {
        return;
    };

    assert_eq!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Ok("hi\n".to_string()))
    );

    source.set(Some("print('partial')\n1/0"));
    let outcome = controller.click().await;
    assert_matches!(
        outcome,
        ClickOutcome::Completed(RunOutcome::Fault(ref text))
            if text.starts_with("partial\n") && text.contains("ZeroDivisionError")
    );

    // Globals do not leak between runs in one session
    source.set(Some("x = 41"));
    controller.click().await;
    source.set(Some("print(x + 1)"));
    assert_matches!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Fault(ref text)) if text.contains("NameError")
    );
}

#[tokio::test]
async fn test_python_input_round_trip() {
    setup_test_logging();

    let source = SwitchableSource::new("name = input('Name? ')\nprint('Hello, ' + name)");
    let Some((controller, console)) = python_controller(source).await else {
        return;
    };

    let runner = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.click().await }
    });
    wait_until_long("a prompt", || console.latest_pending_prompt().is_some()).await;
    let id = console.latest_pending_prompt().unwrap();
    assert!(console.render_plain().starts_with("Name? "));
    assert!(console.submit(id, "Ada"));

    assert_eq!(
        runner.await.unwrap(),
        ClickOutcome::Completed(RunOutcome::Ok("Hello, Ada\n".to_string()))
    );
}

#[tokio::test]
async fn test_python_stop_during_input_then_rerun() {
    setup_test_logging();

    let source = SwitchableSource::new("input('Wait? ')");
    let Some((controller, console)) = python_controller(source.clone()).await else {
        return;
    };

    let runner = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.click().await }
    });
    wait_until_long("a prompt", || console.latest_pending_prompt().is_some()).await;
    let id = console.latest_pending_prompt().unwrap();

    assert_eq!(controller.stop().await, ClickOutcome::Stopped);
    assert_eq!(runner.await.unwrap(), ClickOutcome::Interrupted);
    assert!(!console.prompt(id).unwrap().is_interactive());

    source.set(Some("print('again')"));
    assert_eq!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Ok("again\n".to_string()))
    );
}

#[tokio::test]
async fn test_python_stop_busy_loop() {
    setup_test_logging();

    let source = SwitchableSource::new("while True:\n    pass");
    let Some((controller, console)) = python_controller(source).await else {
        return;
    };

    let runner = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.click().await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(controller.stop().await, ClickOutcome::Stopped);
    assert_eq!(runner.await.unwrap(), ClickOutcome::Interrupted);
    assert!(console.render_plain().contains("Program halted by user"));
}

#[tokio::test]
async fn test_python_background_output_does_not_break_next_run() {
    setup_test_logging();

    let source = SwitchableSource::new(
        "import threading, time\n\
         def late():\n    time.sleep(0.3)\n    print('late')\n\
         threading.Thread(target=late, daemon=True).start()\n\
         print('done')",
    );
    let Some((controller, _console)) = python_controller(source.clone()).await else {
        return;
    };

    assert_eq!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Ok("done\n".to_string()))
    );
    tokio::time::sleep(Duration::from_millis(600)).await;

    source.set(Some("print('next')"));
    assert_matches!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Ok(ref text)) if text.ends_with("next\n")
    );
}

#[tokio::test]
async fn test_python_stdin_read_becomes_prompt() {
    setup_test_logging();

    let source = SwitchableSource::new("import sys\nprint(repr(sys.stdin.readline()))");
    let Some((controller, console)) = python_controller(source).await else {
        return;
    };

    let runner = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.click().await }
    });
    wait_until_long("a prompt", || console.latest_pending_prompt().is_some()).await;
    let id = console.latest_pending_prompt().unwrap();
    assert!(console.submit(id, "Ada"));

    assert_eq!(
        runner.await.unwrap(),
        ClickOutcome::Completed(RunOutcome::Ok("'Ada\\n'\n".to_string()))
    );
}

#[tokio::test]
async fn test_python_sys_exit_codes() {
    setup_test_logging();

    let source = SwitchableSource::new("import sys\nprint('a')\nsys.exit('bad')");
    let Some((controller, _console)) = python_controller(source.clone()).await else {
        return;
    };

    assert_eq!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Fault("a\nbad\n".to_string()))
    );

    source.set(Some("import sys\nprint('b')\nsys.exit(0)"));
    assert_eq!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Ok("b\n".to_string()))
    );

    source.set(Some("import sys\nsys.exit()"));
    assert_eq!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Ok(String::new()))
    );
}

#[tokio::test]
async fn test_python_traceback_omits_worker_frames() {
    setup_test_logging();

    let source = SwitchableSource::new("print('x', end='')\n1/0");
    let Some((controller, _console)) = python_controller(source).await else {
        return;
    };

    assert_matches!(
        controller.click().await,
        ClickOutcome::Completed(RunOutcome::Fault(ref text))
            if text.starts_with("x\nTraceback")
                && text.contains("File \"<blocks>\", line 2")
                && !text.contains("<string>")
    );
}

/// Real interpreters take longer to answer than the scripted one
async fn wait_until_long(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
