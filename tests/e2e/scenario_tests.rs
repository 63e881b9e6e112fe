//! End-to-end user scenarios: button presses, prompts and console clears
//! observed through the console the way a renderer sees them

use crate::common::*;
use assert_matches::assert_matches;
use pyblocks_common::{
    ButtonLabel, ConsoleEntry, ConsoleEvent, ControllerState, RunOutcome, StatusMarkup,
};
use pyblocks_sandbox::{ClickOutcome, CLEAR_CONFIRMATION};
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_hello_world_run() {
    setup_test_logging();

    let (controller, console, _stats) = scripted_controller("print('hi')");
    tokio_test::assert_ok!(controller.boot().await);

    let outcome = controller.click().await;
    assert_eq!(outcome, ClickOutcome::Completed(RunOutcome::Ok("hi\n".to_string())));

    assert_eq!(
        console.entries(),
        vec![
            ConsoleEntry::Text("hi\n".to_string()),
            ConsoleEntry::Markup(StatusMarkup::Separator),
        ]
    );
    assert_eq!(console.render_html(), "hi\n<hr><br>");
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(console.button().label, ButtonLabel::Run);
    assert_eq!(console.button().label.to_string(), "Run");
    assert!(console.button().enabled);
}

#[tokio::test]
async fn test_program_output_is_escaped() {
    setup_test_logging();

    let (controller, console, _stats) = scripted_controller("print('<b>bold</b> & more')");
    controller.boot().await.unwrap();
    controller.click().await;

    assert_eq!(
        console.render_html(),
        "&lt;b&gt;bold&lt;/b&gt; &amp; more\n<hr><br>"
    );
}

#[tokio::test]
async fn test_stop_while_waiting_for_input() {
    setup_test_logging();

    let (controller, console, _stats) = scripted_controller("print('start')\ninput('Name? ')");
    let mut events = console.subscribe();
    controller.boot().await.unwrap();

    let runner = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.click().await }
    });
    wait_until("a prompt", || console.latest_pending_prompt().is_some()).await;
    let id = console.latest_pending_prompt().unwrap();
    assert_eq!(console.button().label, ButtonLabel::Stop);

    assert_eq!(controller.click().await, ClickOutcome::Stopped);
    assert_eq!(runner.await.unwrap(), ClickOutcome::Interrupted);

    assert_eq!(
        console.render_plain(),
        "start\nName? [closed] \nProgram halted by user\n----\n"
    );
    assert!(!console.prompt(id).unwrap().is_interactive());
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(console.button().label, ButtonLabel::Run);

    let mut disabled = false;
    while let Ok(event) = events.try_recv() {
        if let ConsoleEvent::PromptUpdated(view) = event {
            assert_eq!(view.id, id);
            disabled = !view.input_enabled && !view.submit_enabled;
        }
    }
    assert!(disabled);
}

#[tokio::test]
async fn test_clear_confirmation() {
    setup_test_logging();

    let (controller, console, _stats) = scripted_controller("print('hi')");
    controller.boot().await.unwrap();

    // Nothing to lose yet, so no question is asked
    assert!(controller.clear(&|_: &str| -> bool { panic!("asked to confirm") }));

    controller.click().await;
    let asked = Mutex::new(Vec::new());
    let decline = |message: &str| {
        asked.lock().unwrap().push(message.to_string());
        false
    };
    assert!(!controller.clear(&decline));
    assert_eq!(console.render_plain(), "hi\n----\n");
    assert_eq!(*asked.lock().unwrap(), vec![CLEAR_CONFIRMATION.to_string()]);

    assert!(controller.clear(&|_: &str| true));
    assert!(console.is_empty());
    assert_eq!(console.render_html(), "");
}

#[tokio::test]
async fn test_clear_during_run_asks_even_when_empty() {
    setup_test_logging();

    let (controller, console, stats) = scripted_controller("gate()");
    controller.boot().await.unwrap();

    let runner = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.click().await }
    });
    wait_until("the run to start", || stats.runs_started() == 1).await;

    assert!(console.is_empty());
    assert!(!controller.clear(&|_: &str| false));

    stats.open_gate();
    assert_matches!(runner.await.unwrap(), ClickOutcome::Completed(_));
}

#[tokio::test]
async fn test_interpreter_load_failure() {
    setup_test_logging();

    let (controller, console, stats) = scripted_controller("print('hi')");
    stats.fail_boot(true);

    let err = tokio_test::assert_err!(controller.boot().await);
    assert!(err.to_string().contains("Interpreter failed to initialize"));

    assert!(controller.is_failed());
    assert_eq!(console.button().label, ButtonLabel::Unavailable);
    assert!(!console.button().enabled);
    assert_matches!(
        console.entries().as_slice(),
        [ConsoleEntry::Markup(StatusMarkup::FatalError(details))]
            if details.contains("exited before becoming ready")
    );
    assert!(console
        .render_html()
        .contains("An exception occurred while loading the Python environment"));

    assert_eq!(controller.click().await, ClickOutcome::Ignored);
    assert_eq!(controller.run().await, ClickOutcome::Ignored);
    assert_eq!(stats.runs_started(), 0);
    assert_eq!(console.button().label, ButtonLabel::Unavailable);
}
