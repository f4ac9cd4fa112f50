//! Engine-level stream tests: chunked ANSI input, fan-out, lifecycle.

use std::sync::{Arc, Mutex};

use core_engine::Engine;
use core_vm::strip_ansi;

fn capture() -> (Arc<Mutex<Vec<String>>>, core_vm::TextSink) {
    let store: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = store.clone();
    let handler: core_vm::TextSink = Arc::new(move |text: &str| {
        sink.lock().unwrap().push(text.to_string());
    });
    (store, handler)
}

fn engine() -> Engine {
    Engine::new(std::path::Path::new("."))
}

#[test]
fn waitfor_is_satisfied_through_engine_delivery() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);

    let id = engine
        .load_from_string("wait", "echo \"A\"\nwaitfor \"READY\"\necho \"B\"")
        .unwrap();
    engine.run(id).unwrap();
    assert_eq!(*echoes.lock().unwrap(), vec!["A"]);

    engine.process_text("Working...");
    assert_eq!(*echoes.lock().unwrap(), vec!["A"]);

    engine.process_text("...READY now");
    assert_eq!(*echoes.lock().unwrap(), vec!["A", "B"]);
    assert!(!engine.get(id).unwrap().running);
}

#[test]
fn ansi_split_across_chunks_does_not_leak_escapes() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);

    let id = engine
        .load_from_string("w", "waitfor \"green light\"\necho $currentline")
        .unwrap();
    engine.run(id).unwrap();

    // The escape sequence is split mid-CSI across deliveries.
    engine.process_text("\x1b[1;3");
    engine.process_text("2mgreen light\x1b[0m\r\n");
    let got = echoes.lock().unwrap().clone();
    assert_eq!(got, vec!["green light"]);
}

#[test]
fn streamed_strip_equals_whole_strip() {
    let input = "a\x1b[1mb\x1b]0;t\x07c";
    let whole = strip_ansi(input);
    let mut stripper = core_vm::AnsiStripper::new();
    let streamed = stripper.push(&input[..3]) + &stripper.push(&input[3..]);
    assert_eq!(streamed, whole);
}

#[test]
fn textline_triggers_fire_on_complete_lines_only() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);

    let src = "settextlinetrigger 1 :hit \"Sector\"\npause\n:hit\necho \"line!\"\nhalt";
    let id = engine.load_from_string("lines", src).unwrap();
    engine.run(id).unwrap();

    // Partial: no fire yet.
    engine.process_text("Sector 101 ");
    assert!(echoes.lock().unwrap().is_empty());

    // Completing the line fires the trigger.
    engine.process_text("has a port\r\n");
    assert_eq!(*echoes.lock().unwrap(), vec!["line!"]);
}

#[test]
fn fan_out_reaches_every_running_script_independently() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);

    let a = engine
        .load_from_string("a", "waitfor \"GO\"\necho \"a-done\"")
        .unwrap();
    let b = engine
        .load_from_string("b", "waitfor \"GO\"\necho \"b-done\"")
        .unwrap();
    engine.run(a).unwrap();
    engine.run(b).unwrap();

    engine.process_text("GO\r\n");
    let mut got = echoes.lock().unwrap().clone();
    got.sort();
    assert_eq!(got, vec!["a-done", "b-done"]);
}

#[test]
fn one_scripts_error_does_not_stop_the_other() {
    let engine = engine();
    let (_echoes, echo) = capture();
    engine.set_echo_handler(echo);

    let bad = engine
        .load_from_string("bad", "waitfor \"GO\"\n$x := 1 / 0")
        .unwrap();
    let good = engine
        .load_from_string("good", "waitfor \"GO\"\necho \"fine\"")
        .unwrap();
    engine.run(bad).unwrap();
    engine.run(good).unwrap();

    engine.process_text("GO\r\n");
    assert!(!engine.get(bad).unwrap().running);
    assert!(!engine.get(good).unwrap().running);
    // The good script halted normally, not in error: it produced output.
}

#[test]
fn stop_all_spares_system_scripts() {
    let engine = engine();
    let user = engine.load_from_string("user", "pause").unwrap();
    let system = engine.load_system_script("sys", "pause").unwrap();
    engine.run(user).unwrap();
    engine.run(system).unwrap();

    engine.stop_all();
    assert!(!engine.get(user).unwrap().running);
    assert!(engine.get(system).unwrap().running);
}

#[test]
fn unload_removes_the_script() {
    let engine = engine();
    let id = engine.load_from_string("gone", "halt").unwrap();
    engine.unload(id).unwrap();
    assert!(engine.get(id).is_none());
    assert!(matches!(
        engine.run(id),
        Err(core_engine::EngineError::UnknownScript(_))
    ));
}

#[test]
fn run_sync_completes_and_unloads() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let id = engine.load_from_string("once", "echo \"ran\"").unwrap();
    engine.run_sync(id).unwrap();
    assert_eq!(*echoes.lock().unwrap(), vec!["ran"]);
    assert!(engine.get(id).is_none());

    let id = engine.load_from_string("stuck", "pause").unwrap();
    assert!(matches!(
        engine.run_sync(id),
        Err(core_engine::EngineError::DidNotComplete(_))
    ));
}

#[test]
fn send_handler_change_reaches_existing_vms() {
    let engine = engine();
    let id = engine
        .load_from_string("sender", "waitfor \"GO\"\nsend \"payload\"")
        .unwrap();
    engine.run(id).unwrap();

    // Wired after the script was loaded and started.
    let (sent, send) = capture();
    engine.set_send_handler(send);
    engine.process_text("GO\r\n");
    assert_eq!(*sent.lock().unwrap(), vec!["payload"]);
}

#[test]
fn current_line_constant_tracks_completed_lines() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let id = engine
        .load_from_string("c", "waitfor \"two\"\necho $currentline")
        .unwrap();
    engine.run(id).unwrap();
    engine.process_text("line one\r\nline two\r\n");
    assert_eq!(*echoes.lock().unwrap(), vec!["line two"]);
}

#[test]
fn outgoing_triggers_see_user_input() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let src = "settextouttrigger 1 :h \"quit\"\npause\n:h\necho \"leaving\"\nhalt";
    let id = engine.load_from_string("out", src).unwrap();
    engine.run(id).unwrap();
    engine.process_text_out("quit now");
    assert_eq!(*echoes.lock().unwrap(), vec!["leaving"]);
}

#[test]
fn raw_taps_observe_unstripped_bytes() {
    let engine = engine();
    let (raw_seen, tap) = capture();
    engine.add_raw_tap(tap);
    engine.process_text("\x1b[1mhello\x1b[0m");
    assert_eq!(*raw_seen.lock().unwrap(), vec!["\x1b[1mhello\x1b[0m"]);
}

#[test]
fn supply_input_feeds_the_waiting_script() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let id = engine
        .load_from_string("ask", "getinput $name \"Enter name\" \"guest\"\necho \"hi \" $name")
        .unwrap();
    engine.run(id).unwrap();
    assert_eq!(*echoes.lock().unwrap(), vec!["Enter name [guest]"]);

    // Unrelated input with nobody waiting would not be consumed afterwards.
    assert!(engine.supply_input("zaphod"));
    assert_eq!(
        *echoes.lock().unwrap(),
        vec!["Enter name [guest]", "hi zaphod"]
    );
    assert!(!engine.supply_input("again"));
}

#[test]
fn control_flow_macros_run_through_the_engine() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let src = "\
$total := 0
$i := 0
WHILE $i < 4
  IF $i = 2
    $total += 10
  ELSE
    $total += 1
  END
  $i++
END
echo $total";
    let id = engine.load_from_string("macro", src).unwrap();
    engine.run(id).unwrap();
    assert_eq!(*echoes.lock().unwrap(), vec!["13"]);
}

#[test]
fn event_triggers_fire_on_connection_lifecycle() {
    let engine = engine();
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let src = "seteventtrigger 1 :gone \"DISCONNECT\"\npause\n:gone\necho \"dropped\"\nhalt";
    let id = engine.load_from_string("ev", src).unwrap();
    engine.run(id).unwrap();

    engine.set_connected(true);
    assert!(echoes.lock().unwrap().is_empty());
    engine.set_connected(false);
    assert_eq!(*echoes.lock().unwrap(), vec!["dropped"]);
}

#[test]
fn include_resolution_applies_to_engine_loads() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.ts"), "echo \"from lib\"\n").unwrap();
    let engine = Engine::new(dir.path());
    let (echoes, echo) = capture();
    engine.set_echo_handler(echo);
    let id = engine
        .load_from_string("main", "INCLUDE \"lib.ts\"\necho \"from main\"")
        .unwrap();
    engine.run(id).unwrap();
    assert_eq!(*echoes.lock().unwrap(), vec!["from lib", "from main"]);
}
