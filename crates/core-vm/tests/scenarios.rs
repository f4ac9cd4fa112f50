//! End-to-end VM scenarios: compiled source in, observable behavior out.

use std::sync::{Arc, Mutex, RwLock};

use core_host::{GameStore, MemoryStore, PortRecord, SectorRecord, StoredFrame};
use core_value::Value;
use core_vm::{SystemConstants, Vm, VmState};

struct Harness {
    vm: Vm,
    echoes: Arc<Mutex<Vec<String>>>,
    sends: Arc<Mutex<Vec<String>>>,
}

fn harness(src: &str) -> Harness {
    let program = Arc::new(core_lang::compile_source(src, "scenario.ts").unwrap());
    let consts = Arc::new(RwLock::new(SystemConstants::new()));
    let mut vm = Vm::new(1, "scenario", program, consts);
    let echoes = Arc::new(Mutex::new(Vec::new()));
    let sends = Arc::new(Mutex::new(Vec::new()));
    let echo_sink = echoes.clone();
    vm.set_echo_handler(Arc::new(move |text: &str| {
        echo_sink.lock().unwrap().push(text.to_string());
    }));
    let send_sink = sends.clone();
    vm.set_send_handler(Arc::new(move |text: &str| {
        send_sink.lock().unwrap().push(text.to_string());
    }));
    Harness { vm, echoes, sends }
}

impl Harness {
    fn echoes(&self) -> Vec<String> {
        self.echoes.lock().unwrap().clone()
    }

    fn sends(&self) -> Vec<String> {
        self.sends.lock().unwrap().clone()
    }
}

#[test]
fn if_else_expansion_takes_the_true_branch() {
    let mut h = harness("IF 1 = 1\n  echo \"hit\"\nELSE\n  echo \"miss\"\nEND");
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["hit"]);
    assert_eq!(*h.vm.state(), VmState::Halted);
}

#[test]
fn elseif_chain_picks_the_matching_arm() {
    let src = "$x := 2\nIF $x = 1\n  echo \"one\"\nELSEIF $x = 2\n  echo \"two\"\nELSE\n  echo \"other\"\nEND";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["two"]);
}

#[test]
fn while_loop_counts() {
    let src = "$i := 0\nWHILE $i < 3\n  $i++\n  echo \"tick\" $i\nEND";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["tick1", "tick2", "tick3"]);
    assert_eq!(h.vm.get_var("i"), Value::Str("3".into()));
}

#[test]
fn waitfor_resumes_on_substring_across_units() {
    let mut h = harness("echo \"A\"\nwaitfor \"READY\"\necho \"B\"");
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["A"]);
    assert_eq!(*h.vm.state(), VmState::Waiting("READY".into()));

    h.vm.process_incoming_text("Working...", false).unwrap();
    assert_eq!(h.echoes(), vec!["A"]);
    assert_eq!(*h.vm.state(), VmState::Waiting("READY".into()));

    h.vm.process_incoming_text("...READY now", false).unwrap();
    assert_eq!(h.echoes(), vec!["A", "B"]);
    assert_eq!(*h.vm.state(), VmState::Halted);
}

#[test]
fn getinput_applies_the_default_on_empty_input() {
    let mut h = harness("getinput $name \"Enter name\" \"guest\"\necho $name");
    h.vm.execute().unwrap();
    assert!(h.vm.awaiting_input());
    assert_eq!(h.echoes(), vec!["Enter name [guest]"]);

    h.vm.resume_with_input("").unwrap();
    assert_eq!(h.vm.get_var("name"), Value::Str("guest".into()));
    assert_eq!(h.echoes(), vec!["Enter name [guest]", "guest"]);
    assert_eq!(*h.vm.state(), VmState::Halted);
}

#[test]
fn getinput_takes_supplied_input_over_the_default() {
    let mut h = harness("getinput $name \"Enter name\" \"guest\"\necho $name");
    h.vm.execute().unwrap();
    h.vm.resume_with_input("zaphod").unwrap();
    assert_eq!(h.vm.get_var("name"), Value::Str("zaphod".into()));
}

#[test]
fn trigger_redirects_flow_out_of_pause() {
    let src = "settexttrigger 1 :onPrompt \"Command [\"\npause\n:onPrompt\necho \"fired\"\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    assert_eq!(*h.vm.state(), VmState::Paused);

    h.vm
        .process_incoming_text("Command [TL=00:00:00]:", false)
        .unwrap();
    assert_eq!(h.echoes(), vec!["fired"]);
    assert_eq!(*h.vm.state(), VmState::Halted);
    assert_eq!(h.vm.trigger_count(), 0);
}

#[test]
fn trigger_handler_fall_through_resumes_one_past_the_pause() {
    // The handler ends with RETURN and no GOSUB frame: control goes back to
    // one step past the interrupted PAUSE, still paused.
    let src = "settexttrigger 1 :h \"X\"\npause\necho \"after\"\nhalt\n:h\necho \"handled\"\nreturn";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    let paused_position = h.vm.position();
    h.vm.process_incoming_text("X marks", false).unwrap();
    assert_eq!(h.echoes(), vec!["handled"]);
    assert_eq!(*h.vm.state(), VmState::Paused);
    assert_eq!(h.vm.position(), paused_position + 1);

    // An external resume continues after the pause without skipping a step.
    h.vm.resume().unwrap();
    assert_eq!(h.echoes(), vec!["handled", "after"]);
    assert_eq!(*h.vm.state(), VmState::Halted);
}

#[test]
fn trigger_response_is_sent_before_the_handler_runs() {
    let src = "settexttrigger 1 :h \"prompt\" \"yes\"\npause\n:h\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    h.vm.process_incoming_text("prompt here", false).unwrap();
    assert_eq!(h.sends(), vec!["yes"]);
}

#[test]
fn textline_fire_suppresses_text_triggers_for_that_unit() {
    let src = "settextlinetrigger 1 :line \"Warp\"\nsettexttrigger 2 :text \"Warp\"\npause\n:line\necho \"line\"\nhalt\n:text\necho \"text\"\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    h.vm.process_incoming_text("Warp lane open", true).unwrap();
    // Only the line handler ran; the matching text trigger was suppressed.
    assert_eq!(h.echoes(), vec!["line"]);
}

#[test]
fn getsector_populates_the_dotted_subtree() {
    let store = Arc::new(MemoryStore::new());
    store.put_sector(SectorRecord {
        index: 100,
        explored: true,
        constellation: "Federation space".into(),
        warps: [101, 0, 103, 0, 0, 0],
        ..Default::default()
    });
    store.put_port(
        100,
        PortRecord {
            name: "Trading Post".into(),
            class_index: 3,
        },
    );

    let src = "getsector 100 $s\necho $s.warp[1] \" \" $s.warp[3] \" \" $s.port.class";
    let mut h = harness(src);
    h.vm.attach_store(store);
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["101 103 3"]);
    assert_eq!(h.vm.get_var("s.port.name"), Value::Str("Trading Post".into()));
    assert_eq!(h.vm.get_var("s.warps"), Value::Str("2".into()));
    assert_eq!(h.vm.get_var("s.explored"), Value::Str("1".into()));
}

#[test]
fn getsector_of_missing_sector_fills_defaults() {
    let mut h = harness("getsector 42 $s\necho $s.port.exists \"/\" $s.warps");
    h.vm.attach_store(Arc::new(MemoryStore::new()));
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["0/0"]);
}

#[test]
fn getsector_zero_is_a_no_op() {
    let mut h = harness("getsector 0 $s\necho \"ok\"");
    h.vm.attach_store(Arc::new(MemoryStore::new()));
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["ok"]);
    assert_eq!(h.vm.get_var("s.index"), Value::Str("".into()));
}

#[test]
fn savevar_and_loadvar_round_trip_through_the_store() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    {
        let mut h = harness("setvar $keep \"treasure\"\nsavevar $keep");
        h.vm.attach_store(store.clone());
        h.vm.execute().unwrap();
    }
    assert_eq!(
        store.load_script_variable("KEEP").unwrap(),
        Some(Value::Str("treasure".into()))
    );
    {
        let mut h = harness("loadvar $keep\necho $keep");
        h.vm.attach_store(store);
        h.vm.execute().unwrap();
        assert_eq!(h.echoes(), vec!["treasure"]);
    }
}

#[test]
fn durable_frames_mirror_gosub_and_restore() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let src = "gosub :outer\nhalt\n:outer\ngosub :inner\nreturn\n:inner\npause\nreturn";
    let mut h = harness(src);
    h.vm.attach_store(store.clone());
    h.vm.enable_durable_frames(true);
    h.vm.execute().unwrap();
    // Paused inside :inner with two frames live.
    assert_eq!(h.vm.stack_depth(), 2);
    let frames = store.call_stack(1).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].frame_index, 0);
    assert_eq!(frames[0].label, "OUTER");
    assert_eq!(frames[1].label, "INNER");

    // A fresh VM restores the same stack from the durable rows.
    let program = Arc::new(core_lang::compile_source(src, "scenario.ts").unwrap());
    let consts = Arc::new(RwLock::new(SystemConstants::new()));
    let mut restored = Vm::new(1, "scenario", program, consts);
    restored.attach_store(store);
    restored.restore_call_stack().unwrap();
    assert_eq!(restored.stack_depth(), 2);
}

#[test]
fn one_shot_trigger_count_drops_to_zero() {
    let src = "settexttrigger 9 :h \"ping\"\npause\n:h\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    assert_eq!(h.vm.trigger_count(), 1);
    h.vm.process_incoming_text("ping", false).unwrap();
    assert_eq!(h.vm.trigger_count(), 0);
}

#[test]
fn delay_trigger_fires_after_its_duration() {
    let src = "setdelaytrigger t1 :h 60000\npause\n:h\necho \"late\"\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    let now = std::time::Instant::now();
    h.vm.check_delay_triggers(now).unwrap();
    assert!(h.echoes().is_empty());
    h.vm
        .check_delay_triggers(now + std::time::Duration::from_secs(61))
        .unwrap();
    assert_eq!(h.echoes(), vec!["late"]);
}

#[test]
fn event_trigger_fires_on_named_event() {
    let src = "seteventtrigger e1 :h \"CONNECT\"\npause\n:h\necho \"connected\"\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    h.vm.process_event("connect").unwrap();
    assert_eq!(h.echoes(), vec!["connected"]);
}

#[test]
fn text_out_trigger_sees_outgoing_text() {
    let src = "settextouttrigger o1 :h \"secret\"\npause\n:h\necho \"caught\"\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    h.vm.process_text_out("say secret word").unwrap();
    assert_eq!(h.echoes(), vec!["caught"]);
}

#[test]
fn legacy_settrigger_ids_stay_unique() {
    let src = "settrigger :h \"a\"\nsettrigger :h \"b\"\nsettrigger :h \"c\"\npause\n:h\nhalt";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    assert_eq!(h.vm.trigger_count(), 3);
}

#[test]
fn division_by_zero_sets_error_state() {
    let mut h = harness("$x := 1 / 0");
    let err = h.vm.execute().unwrap_err();
    assert!(matches!(err, core_vm::VmError::DivisionByZero));
    assert!(matches!(h.vm.state(), VmState::Error(_)));
    assert_eq!(h.vm.trigger_count(), 0);
}

#[test]
fn script_error_is_reported_through_the_output_handler() {
    let mut h = harness("nosuchcommand 1 2 3");
    let _ = h.vm.execute().unwrap_err();
    let all = h.echoes().join("");
    assert!(all.contains("Script error in scenario"), "{all:?}");
    assert!(all.contains("NOSUCHCOMMAND"), "{all:?}");
}

#[test]
fn setarray_allows_indexed_writes() {
    let src = "setarray $grid 2 3\n$grid[2][3] := \"corner\"\necho $grid[2][3]";
    let mut h = harness(src);
    h.vm.execute().unwrap();
    assert_eq!(h.echoes(), vec!["corner"]);
}

#[test]
fn durable_frame_rows_match_the_contract() {
    // Insert out of order through the trait; query returns frame order.
    let store = MemoryStore::new();
    store
        .insert_call_frame(
            7,
            &StoredFrame {
                frame_index: 1,
                label: "B".into(),
                position: 5,
                return_addr: 6,
            },
        )
        .unwrap();
    store
        .insert_call_frame(
            7,
            &StoredFrame {
                frame_index: 0,
                label: "A".into(),
                position: 1,
                return_addr: 2,
            },
        )
        .unwrap();
    let frames = store.call_stack(7).unwrap();
    assert_eq!(frames[0].label, "A");
    assert_eq!(frames[1].label, "B");
}
