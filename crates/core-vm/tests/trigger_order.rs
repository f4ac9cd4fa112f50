//! Dispatch-ordering guarantees for one inbound unit: TextLine triggers
//! first, then the WAITFOR check, then Text triggers, with TextLine fires
//! suppressing Text fires for that unit.

use std::sync::{Arc, Mutex, RwLock};

use core_vm::{SystemConstants, Vm, VmState};

fn harness(src: &str) -> (Vm, Arc<Mutex<Vec<String>>>) {
    let program = Arc::new(core_lang::compile_source(src, "order.ts").unwrap());
    let consts = Arc::new(RwLock::new(SystemConstants::new()));
    let mut vm = Vm::new(1, "order", program, consts);
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();
    vm.set_echo_handler(Arc::new(move |text: &str| {
        sink.lock().unwrap().push(text.to_string());
    }));
    (vm, captured)
}

#[test]
fn textline_runs_before_waitfor_on_the_same_unit() {
    // The line trigger redirects flow while a WAITFOR for the same line is
    // pending; the handler observes the unit first.
    let src = "\
settextlinetrigger 1 :line \"Sector\"
waitfor \"Sector\"
echo \"after-wait\"
halt
:line
echo \"line-first\"
return";
    let (mut vm, cap) = harness(src);
    vm.execute().unwrap();
    assert_eq!(*vm.state(), VmState::Waiting("Sector".into()));

    vm.process_incoming_text("Sector 1 is quiet", true).unwrap();
    let got = cap.lock().unwrap().clone();
    assert_eq!(got.first().map(String::as_str), Some("line-first"));
    // The handler fell through to the saved Waiting state, and the WAITFOR
    // check on the same unit then satisfied it.
    assert_eq!(got, vec!["line-first", "after-wait"]);
}

#[test]
fn waitfor_runs_before_text_triggers() {
    let src = "\
settexttrigger 1 :t \"prompt\"
waitfor \"prompt\"
echo \"woke\"
pause
:t
echo \"text\"
halt";
    let (mut vm, cap) = harness(src);
    vm.execute().unwrap();
    vm.process_incoming_text("prompt>", false).unwrap();
    assert_eq!(*cap.lock().unwrap(), vec!["woke", "text"]);
}

#[test]
fn partial_units_skip_textline_triggers() {
    let src = "\
settextlinetrigger 1 :line \"Warp\"
settexttrigger 2 :text \"Warp\"
pause
:line
echo \"line\"
halt
:text
echo \"text\"
halt";
    let (mut vm, cap) = harness(src);
    vm.execute().unwrap();
    // A partial (prompt-style) unit can only fire Text triggers.
    vm.process_incoming_text("Warp to?", false).unwrap();
    assert_eq!(*cap.lock().unwrap(), vec!["text"]);
}

#[test]
fn response_only_trigger_does_not_redirect() {
    let src = "settexttrigger 1 \"\" \"ping\" \"pong\"\nwaitfor \"never\"";
    let (mut vm, _cap) = harness(src);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = sent.clone();
    vm.set_send_handler(Arc::new(move |text: &str| {
        sink.lock().unwrap().push(text.to_string());
    }));
    vm.execute().unwrap();
    vm.process_incoming_text("ping pong table", false).unwrap();
    assert_eq!(*sent.lock().unwrap(), vec!["pong"]);
    // Still waiting: no handler label, so flow was untouched.
    assert_eq!(*vm.state(), VmState::Waiting("never".into()));
}

#[test]
fn killtrigger_removes_a_pending_trigger() {
    let src = "\
settexttrigger 1 :t \"x\"
killtrigger 1
pause
:t
echo \"fired\"
halt";
    let (mut vm, cap) = harness(src);
    vm.execute().unwrap();
    assert_eq!(vm.trigger_count(), 0);
    vm.process_incoming_text("x", false).unwrap();
    assert!(cap.lock().unwrap().is_empty());
}

#[test]
fn killalltriggers_clears_every_kind() {
    let src = "\
settexttrigger 1 :t \"a\"
settextlinetrigger 2 :t \"b\"
setdelaytrigger 3 :t 50000
seteventtrigger 4 :t \"EV\"
killalltriggers
pause
:t
halt";
    let (mut vm, _) = harness(src);
    vm.execute().unwrap();
    assert_eq!(vm.trigger_count(), 0);
}

#[test]
fn handler_can_reregister_its_own_id() {
    let src = "\
settexttrigger 1 :hit \"go\"
pause
:hit
$count++
settexttrigger 1 :hit \"go\"
return";
    let (mut vm, _) = harness(src);
    vm.execute().unwrap();
    vm.process_incoming_text("go", false).unwrap();
    vm.process_incoming_text("go again", false).unwrap();
    vm.process_incoming_text("go once more", false).unwrap();
    assert_eq!(vm.get_var("count").to_text(), "3");
    assert_eq!(vm.trigger_count(), 1);
}
