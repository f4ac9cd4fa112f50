//! The VM core: a step-executed cooperative interpreter.
//!
//! One `Vm` owns its variable tree, GOSUB stack, and trigger set. It never
//! blocks: the three suspension commands (`WAITFOR`, `GETINPUT`, `PAUSE`)
//! move it out of `Running`, and external events move it back. Trigger
//! handlers execute synchronously inside the inbound delivery and redirect
//! flow permanently (no frame is pushed); a handler that falls through via
//! `RETURN` with an empty stack resumes one step past the interrupted
//! command.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Instant;

use core_host::{GameStore, MenuHost, NetHost, StoredFrame};
use core_lang::{canonical_label, AccessSeg, AssignOp, IncDecOp, Node, NodeKind, Program};
use core_value::{Value, VarPath, VarTree};
use tracing::{debug, trace, warn};

use crate::consts::SystemConstants;
use crate::error::VmError;
use crate::eval::eval;
use crate::registry::{Param, ParamKind, Registry};
use crate::state::{StackFrame, VmState};
use crate::triggers::{FiredTrigger, TriggerSet};

/// Text sink wired in by the engine: send (to the remote), echo (local
/// terminal), output (status/messages).
pub type TextSink = Arc<dyn Fn(&str) + Send + Sync>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::standard)
}

#[derive(Debug)]
enum Jump {
    Label(String),
    Pos(usize),
}

enum HandlerOutcome {
    /// `RETURN` with no frame: control goes back to the interrupted spot.
    FellThrough,
    /// The handler paused, waits, halted, or errored; its state stands.
    Yielded,
}

pub struct Vm {
    id: u64,
    name: String,
    program: Arc<Program>,
    labels: HashMap<String, usize>,
    pub(crate) position: usize,
    pub(crate) state: VmState,
    pending_jump: Option<Jump>,
    pub(crate) stack: Vec<StackFrame>,
    pub(crate) vars: VarTree,
    pub(crate) triggers: TriggerSet,
    pub(crate) consts: Arc<RwLock<SystemConstants>>,
    pub(crate) store: Option<Arc<dyn GameStore>>,
    pub(crate) menus: Option<Arc<dyn MenuHost>>,
    pub(crate) net: Option<Arc<dyn NetHost>>,
    send_handler: Option<TextSink>,
    echo_handler: Option<TextSink>,
    output_handler: Option<TextSink>,
    pub(crate) waiting_for_input: bool,
    pub(crate) input_prompt: String,
    pub(crate) pending_input: Option<String>,
    pub(crate) just_resumed: bool,
    pub(crate) logging_inbound: bool,
    pub(crate) timer: Option<Instant>,
    auto_trigger_seq: u64,
    in_handler: bool,
    durable_frames: bool,
    current_line: u32,
    /// Position of the command that paused us. `resume` advances only when
    /// still sitting on it; a trigger fall-through has already moved past.
    paused_at: Option<usize>,
}

impl Vm {
    pub fn new(
        id: u64,
        name: &str,
        program: Arc<Program>,
        consts: Arc<RwLock<SystemConstants>>,
    ) -> Self {
        let mut labels = HashMap::new();
        for (idx, node) in program.nodes.iter().enumerate() {
            if let NodeKind::Label(text) = &node.kind {
                labels.entry(canonical_label(text)).or_insert(idx);
            }
        }
        Self {
            id,
            name: name.to_string(),
            program,
            labels,
            position: 0,
            state: VmState::Running,
            pending_jump: None,
            stack: Vec::new(),
            vars: VarTree::new(),
            triggers: TriggerSet::new(),
            consts,
            store: None,
            menus: None,
            net: None,
            send_handler: None,
            echo_handler: None,
            output_handler: None,
            waiting_for_input: false,
            input_prompt: String::new(),
            pending_input: None,
            just_resumed: false,
            logging_inbound: false,
            timer: None,
            auto_trigger_seq: 0,
            in_handler: false,
            durable_frames: false,
            current_line: 0,
            paused_at: None,
        }
    }

    // ---- wiring -------------------------------------------------------

    pub fn attach_store(&mut self, store: Arc<dyn GameStore>) {
        self.store = Some(store);
    }

    pub fn attach_menus(&mut self, menus: Arc<dyn MenuHost>) {
        self.menus = Some(menus);
    }

    pub fn attach_net(&mut self, net: Arc<dyn NetHost>) {
        self.net = Some(net);
    }

    pub fn set_send_handler(&mut self, sink: TextSink) {
        self.send_handler = Some(sink);
    }

    pub fn set_echo_handler(&mut self, sink: TextSink) {
        self.echo_handler = Some(sink);
    }

    pub fn set_output_handler(&mut self, sink: TextSink) {
        self.output_handler = Some(sink);
    }

    pub fn enable_durable_frames(&mut self, on: bool) {
        self.durable_frames = on;
    }

    // ---- introspection ------------------------------------------------

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &VmState {
        &self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    pub fn logging_inbound(&self) -> bool {
        self.logging_inbound
    }

    pub fn input_prompt(&self) -> &str {
        &self.input_prompt
    }

    pub fn awaiting_input(&self) -> bool {
        matches!(self.state, VmState::Paused) && self.waiting_for_input
    }

    // ---- variables ----------------------------------------------------

    /// Parse a string-form variable name, resolving `$i` index references
    /// through the full lookup chain.
    pub(crate) fn parse_path(&self, raw: &str) -> Result<VarPath, VmError> {
        Ok(VarPath::parse(raw, &|inner| {
            self.read_var_name(inner).to_text()
        })?)
    }

    /// Read through the lookup chain: user tree, durable store, system
    /// constants (base names only), then the empty string.
    pub(crate) fn lookup_path(&self, path: &VarPath) -> Value {
        if let Some(text) = self.vars.read_text(path) {
            return Value::Str(text);
        }
        if let Some(store) = &self.store {
            if let Ok(Some(value)) = store.load_script_variable(&path.storage_key()) {
                return value;
            }
        }
        if path.segments.is_empty() {
            if let Ok(consts) = self.consts.read() {
                if let Some(value) = consts.get(&path.base) {
                    return value;
                }
            }
        }
        Value::empty()
    }

    pub fn read_var_name(&self, raw: &str) -> Value {
        match self.parse_path(raw) {
            Ok(path) => self.lookup_path(&path),
            Err(_) => Value::empty(),
        }
    }

    pub fn write_var_name(&mut self, raw: &str, value: &Value) -> Result<(), VmError> {
        let path = self.parse_path(raw)?;
        self.vars.write(&path, value);
        Ok(())
    }

    /// Convenience used by tests and the engine.
    pub fn get_var(&self, raw: &str) -> Value {
        self.read_var_name(raw)
    }

    pub fn vars(&self) -> &VarTree {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarTree {
        &mut self.vars
    }

    pub(crate) fn sysconst(&self, name: &str) -> Value {
        self.consts
            .read()
            .ok()
            .and_then(|c| c.get(name))
            .unwrap_or_else(Value::empty)
    }

    /// Build a `VarPath` from a variable AST node, evaluating index
    /// expressions to their string form.
    pub(crate) fn path_from_node(&self, node: &Node) -> Result<VarPath, VmError> {
        match &node.kind {
            NodeKind::Variable(base) => Ok(VarPath::root(base)),
            NodeKind::ArrayAccess { base, segs } => {
                let mut path = VarPath::root(base);
                for seg in segs {
                    match seg {
                        AccessSeg::Index(expr) => {
                            let index = eval(self, expr)?;
                            path.push_index(&index.to_text());
                        }
                        AccessSeg::Prop(prop) => path.push_prop(prop),
                    }
                }
                Ok(path)
            }
            other => Err(VmError::bad(
                "variable",
                format!("not a variable reference: {other:?}"),
            )),
        }
    }

    pub(crate) fn eval_var_node(&self, node: &Node) -> Result<Value, VmError> {
        let path = self.path_from_node(node)?;
        Ok(self.lookup_path(&path))
    }

    /// Bare name for a `Var` parameter: full path form with indices resolved.
    fn var_name_of(&self, node: &Node) -> Result<String, VmError> {
        match &node.kind {
            NodeKind::Variable(_) | NodeKind::ArrayAccess { .. } => {
                Ok(self.path_from_node(node)?.storage_key())
            }
            NodeKind::Literal(text) => Ok(text
                .trim_start_matches('$')
                .trim()
                .to_ascii_uppercase()),
            other => Err(VmError::bad(
                "parameter",
                format!("expected a variable name, got {other:?}"),
            )),
        }
    }

    // ---- sinks --------------------------------------------------------

    pub(crate) fn send(&self, text: &str) {
        trace!(target: "vm.send", script = %self.name, len = text.len(), "send");
        if let Some(sink) = &self.send_handler {
            sink(text);
        }
    }

    pub(crate) fn echo_out(&self, text: &str) {
        if let Some(sink) = &self.echo_handler {
            sink(text);
        }
    }

    /// Local echo of an inbound line, used by the engine when the script
    /// enabled `LOGGING`.
    pub fn echo_line(&self, text: &str) {
        self.echo_out(text);
    }

    pub(crate) fn output(&self, text: &str) {
        if let Some(sink) = self.output_handler.as_ref().or(self.echo_handler.as_ref()) {
            sink(text);
        }
    }

    // ---- control flow -------------------------------------------------

    pub(crate) fn jump_to_label(&mut self, label: &str) {
        self.pending_jump = Some(Jump::Label(canonical_label(label)));
    }

    pub(crate) fn jump_to_position(&mut self, position: usize) {
        self.pending_jump = Some(Jump::Pos(position));
    }

    fn label_position(&self, canonical: &str) -> Result<usize, VmError> {
        self.labels
            .get(canonical)
            .copied()
            .ok_or_else(|| VmError::UnknownLabel(canonical.to_string()))
    }

    pub(crate) fn push_frame(&mut self, frame: StackFrame) {
        if self.durable_frames {
            if let Some(store) = &self.store {
                let stored = StoredFrame {
                    frame_index: self.stack.len() as u32,
                    label: frame.label.clone(),
                    position: frame.saved_position,
                    return_addr: frame.return_address,
                };
                if let Err(e) = store.insert_call_frame(self.id, &stored) {
                    warn!(target: "vm", script = %self.name, error = %e, "durable frame insert failed");
                }
            }
        }
        self.stack.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<StackFrame> {
        let frame = self.stack.pop()?;
        if self.durable_frames {
            if let Some(store) = &self.store {
                let result = store.clear_call_stack(self.id).and_then(|_| {
                    self.stack.iter().enumerate().try_for_each(|(i, f)| {
                        store.insert_call_frame(
                            self.id,
                            &StoredFrame {
                                frame_index: i as u32,
                                label: f.label.clone(),
                                position: f.saved_position,
                                return_addr: f.return_address,
                            },
                        )
                    })
                });
                if let Err(e) = result {
                    warn!(target: "vm", script = %self.name, error = %e, "durable frame sync failed");
                }
            }
        }
        Some(frame)
    }

    /// Rebuild the GOSUB stack from the durable store, ordered by frame
    /// index. Used after a VM restart.
    pub fn restore_call_stack(&mut self) -> Result<(), VmError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        self.stack = store
            .call_stack(self.id)?
            .into_iter()
            .map(|f| StackFrame {
                label: f.label,
                saved_position: f.position,
                return_address: f.return_addr,
            })
            .collect();
        Ok(())
    }

    pub(crate) fn in_handler(&self) -> bool {
        self.in_handler
    }

    pub fn halt(&mut self) {
        debug!(target: "vm", script = %self.name, "halt");
        self.state = VmState::Halted;
        self.triggers.clear();
        self.waiting_for_input = false;
    }

    fn fail(&mut self, err: &VmError) {
        let msg = if self.current_line > 0 {
            format!("{err} (line {})", self.current_line)
        } else {
            format!("{err}")
        };
        warn!(target: "vm", script = %self.name, error = %msg, "script error");
        self.output(&format!("Script error in {}: {msg}\r\n", self.name));
        self.state = VmState::Error(msg);
        self.triggers.clear();
    }

    fn guard(&mut self, result: Result<(), VmError>) -> Result<(), VmError> {
        if let Err(err) = &result {
            if !err.is_suspension() && !matches!(self.state, VmState::Error(_)) {
                self.fail(err);
            }
        }
        result
    }

    // ---- execution ----------------------------------------------------

    /// Run until the script halts, suspends, or errors.
    pub fn execute(&mut self) -> Result<(), VmError> {
        let result = self.execute_inner();
        self.guard(result)
    }

    fn execute_inner(&mut self) -> Result<(), VmError> {
        loop {
            if !self.state.is_running() {
                return Ok(());
            }
            match self.execute_step() {
                Ok(()) => {}
                Err(VmError::Paused) => {
                    // Paused without advancing: the suspended command re-runs
                    // on resume (GETINPUT) or is skipped by a trigger redirect.
                    self.state = VmState::Paused;
                    self.paused_at = Some(self.position);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Execute the node at the current position and advance.
    pub fn execute_step(&mut self) -> Result<(), VmError> {
        let Some(node) = self.program.nodes.get(self.position).cloned() else {
            self.halt();
            return Ok(());
        };
        self.current_line = node.line;
        trace!(target: "vm.step", script = %self.name, position = self.position, line = node.line, "step");
        match &node.kind {
            NodeKind::Label(_) => {}
            NodeKind::Command { name, args } => self.run_command(name, args)?,
            NodeKind::Assignment { target, value } => {
                let value = eval(self, value)?;
                let path = self.path_from_node(target)?;
                self.vars.write(&path, &value);
            }
            NodeKind::CompoundAssignment { op, target, value } => {
                let rhs = eval(self, value)?;
                let path = self.path_from_node(target)?;
                let current = self.lookup_path(&path);
                let updated = match op {
                    AssignOp::Add => Value::Num(current.number_lossy() + rhs.number_lossy()),
                    AssignOp::Sub => Value::Num(current.number_lossy() - rhs.number_lossy()),
                    AssignOp::Mul => Value::Num(current.number_lossy() * rhs.number_lossy()),
                    AssignOp::Div => {
                        let divisor = rhs.number_lossy();
                        if divisor == 0.0 {
                            return Err(VmError::DivisionByZero);
                        }
                        Value::Num(current.number_lossy() / divisor)
                    }
                    AssignOp::Concat => {
                        Value::Str(format!("{}{}", current.to_text(), rhs.to_text()))
                    }
                };
                self.vars.write(&path, &updated);
            }
            NodeKind::IncrementDecrement { op, target } => {
                let path = self.path_from_node(target)?;
                let current = self.lookup_path(&path).number_lossy();
                let updated = match op {
                    IncDecOp::Increment => current + 1.0,
                    IncDecOp::Decrement => current - 1.0,
                };
                self.vars.write(&path, &Value::Num(updated));
            }
            NodeKind::Include(name) => return Err(VmError::UnresolvedInclude(name.clone())),
            NodeKind::If { .. } | NodeKind::While { .. } | NodeKind::End => {
                return Err(VmError::UnexpandedDirective)
            }
            other => {
                return Err(VmError::bad(
                    "statement",
                    format!("unexpected {other:?} as a statement"),
                ))
            }
        }
        match self.pending_jump.take() {
            Some(Jump::Label(label)) => self.position = self.label_position(&label)?,
            Some(Jump::Pos(position)) => self.position = position,
            None => {
                if self.state.is_alive() {
                    self.position += 1;
                }
            }
        }
        Ok(())
    }

    fn run_command(&mut self, name: &str, args: &[Node]) -> Result<(), VmError> {
        let def = registry()
            .get(name)
            .ok_or_else(|| VmError::UnknownCommand(name.to_string()))?;
        if !def.accepts(args.len()) {
            return Err(VmError::Arity {
                name: name.to_string(),
                expected: def.expected(),
                got: args.len(),
            });
        }
        let mut params = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            match def.kind_at(i) {
                ParamKind::Value => params.push(Param::Value(eval(self, arg)?)),
                ParamKind::Var => params.push(Param::Var(self.var_name_of(arg)?)),
            }
        }
        (def.handler)(self, &params)
    }

    // ---- suspension & resumption --------------------------------------

    /// Resume a `GETINPUT`/`GETCONSOLEINPUT` suspension with collected input.
    pub fn resume_with_input(&mut self, input: &str) -> Result<(), VmError> {
        if !self.awaiting_input() {
            return Ok(());
        }
        self.pending_input = Some(input.to_string());
        self.just_resumed = true;
        self.waiting_for_input = false;
        self.paused_at = None;
        self.state = VmState::Running;
        self.execute()
    }

    /// External unpause of a plain `PAUSE`. Steps past the pause command when
    /// still parked on it.
    pub fn resume(&mut self) -> Result<(), VmError> {
        if matches!(self.state, VmState::Paused) && !self.waiting_for_input {
            if self.paused_at == Some(self.position) {
                self.position += 1;
            }
            self.paused_at = None;
            self.state = VmState::Running;
            self.execute()
        } else {
            Ok(())
        }
    }

    // ---- inbound text & triggers --------------------------------------

    /// Dispatch one inbound text unit: TextLine triggers, then the WAITFOR
    /// check, then Text triggers (suppressed when a TextLine fired).
    pub fn process_incoming_text(
        &mut self,
        unit: &str,
        complete_line: bool,
    ) -> Result<(), VmError> {
        let result = self.process_incoming_inner(unit, complete_line);
        self.guard(result)
    }

    fn process_incoming_inner(&mut self, unit: &str, complete_line: bool) -> Result<(), VmError> {
        if !self.state.is_alive() {
            return Ok(());
        }
        let mut any_line_fired = false;
        if complete_line {
            for id in self.triggers.match_text_line(unit) {
                if let Some(fired) = self.triggers.consume_fire(&id) {
                    any_line_fired = true;
                    self.fire_trigger(fired)?;
                }
            }
        }
        if let VmState::Waiting(wait_text) = &self.state {
            if unit.contains(wait_text.as_str()) {
                debug!(target: "vm", script = %self.name, "waitfor satisfied");
                self.state = VmState::Running;
                self.execute_inner()?;
            }
        }
        if !any_line_fired {
            for id in self.triggers.match_text(unit) {
                if let Some(fired) = self.triggers.consume_fire(&id) {
                    self.fire_trigger(fired)?;
                }
            }
        }
        Ok(())
    }

    /// Outgoing-text triggers (user input on its way to the remote).
    pub fn process_text_out(&mut self, text: &str) -> Result<(), VmError> {
        let ids = self.triggers.match_text_out(text);
        let result = self.fire_all(ids);
        self.guard(result)
    }

    /// Named events, script-raised or engine lifecycle.
    pub fn process_event(&mut self, event: &str) -> Result<(), VmError> {
        let ids = self.triggers.match_event(event);
        let result = self.fire_all(ids);
        self.guard(result)
    }

    /// Fire any delay triggers whose duration elapsed by `now`.
    pub fn check_delay_triggers(&mut self, now: Instant) -> Result<(), VmError> {
        let ids = self.triggers.expired_delays(now);
        let result = self.fire_all(ids);
        self.guard(result)
    }

    fn fire_all(&mut self, ids: Vec<String>) -> Result<(), VmError> {
        for id in ids {
            if let Some(fired) = self.triggers.consume_fire(&id) {
                self.fire_trigger(fired)?;
            }
        }
        Ok(())
    }

    /// Execute one fired trigger: send its response, then redirect flow into
    /// the handler label. The redirect is permanent (no GOSUB frame). When the
    /// handler falls through, the interrupted position advances by one so the
    /// script resumes after the command (typically PAUSE) it was stopped at.
    fn fire_trigger(&mut self, fired: FiredTrigger) -> Result<(), VmError> {
        debug!(target: "vm.trigger", script = %self.name, id = %fired.id, label = %fired.label, "fire");
        if !fired.response.is_empty() {
            self.send(&fired.response);
        }
        if fired.label.is_empty() {
            return Ok(());
        }
        let saved_position = self.position;
        let saved_state = self.state.clone();
        self.position = self.label_position(&canonical_label(&fired.label))?;
        self.state = VmState::Running;
        self.in_handler = true;
        let outcome = self.run_handler_loop();
        self.in_handler = false;
        match outcome? {
            HandlerOutcome::FellThrough => match saved_state {
                // The interrupted command (typically PAUSE) is skipped; the
                // previous run/pause state stands.
                VmState::Paused => {
                    self.position = saved_position + 1;
                    self.state = VmState::Paused;
                }
                // A pending WAITFOR already advanced past its command; keep
                // the position and the wait.
                VmState::Waiting(text) => {
                    self.position = saved_position;
                    self.state = VmState::Waiting(text);
                }
                _ => {
                    self.position = saved_position + 1;
                    self.state = VmState::Running;
                    self.execute_inner()?;
                }
            },
            HandlerOutcome::Yielded => {}
        }
        Ok(())
    }

    fn run_handler_loop(&mut self) -> Result<HandlerOutcome, VmError> {
        loop {
            match self.state {
                VmState::Running => {}
                _ => return Ok(HandlerOutcome::Yielded),
            }
            match self.execute_step() {
                Ok(()) => {}
                Err(VmError::Paused) => {
                    self.state = VmState::Paused;
                    self.paused_at = Some(self.position);
                    return Ok(HandlerOutcome::Yielded);
                }
                Err(VmError::HandlerReturn) => return Ok(HandlerOutcome::FellThrough),
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) fn next_auto_trigger_id(&mut self) -> String {
        self.auto_trigger_seq += 1;
        format!("auto-{}", self.auto_trigger_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn build(src: &str) -> (Vm, Arc<Mutex<Vec<String>>>) {
        let program = Arc::new(core_lang::compile_source(src, "test.ts").unwrap());
        let consts = Arc::new(RwLock::new(SystemConstants::new()));
        let mut vm = Vm::new(1, "test", program, consts);
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        vm.set_echo_handler(Arc::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        }));
        (vm, captured)
    }

    fn echoes(captured: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        captured.lock().unwrap().clone()
    }

    #[test]
    fn assignment_and_expression() {
        let (mut vm, _) = build("$x := 2 + 3 * 4\n$y := $x & \" ok\"");
        vm.execute().unwrap();
        assert_eq!(vm.get_var("x"), Value::Str("14".into()));
        assert_eq!(vm.get_var("y"), Value::Str("14 ok".into()));
        assert_eq!(*vm.state(), VmState::Halted);
    }

    #[test]
    fn compound_assignment_and_incdec() {
        let (mut vm, _) = build("$x := 10\n$x += 5\n$x /= 3\n$x++\n$s := \"a\"\n$s &= \"b\"");
        vm.execute().unwrap();
        assert_eq!(vm.get_var("x"), Value::Str("6".into()));
        assert_eq!(vm.get_var("s"), Value::Str("ab".into()));
    }

    #[test]
    fn goto_skips_and_gosub_returns() {
        let (mut vm, cap) = build(
            "gosub :sub\necho \"after\"\nhalt\n:sub\necho \"inside\"\nreturn",
        );
        vm.execute().unwrap();
        assert_eq!(echoes(&cap), vec!["inside", "after"]);
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn unknown_label_is_an_error() {
        let (mut vm, _) = build("goto :nowhere");
        let err = vm.execute().unwrap_err();
        assert!(matches!(err, VmError::UnknownLabel(_)));
        assert!(matches!(vm.state(), VmState::Error(_)));
    }

    #[test]
    fn return_without_gosub_is_an_error_outside_handlers() {
        let (mut vm, _) = build("return");
        let err = vm.execute().unwrap_err();
        assert!(matches!(err, VmError::ReturnWithoutGosub));
    }

    #[test]
    fn waitfor_suspends_until_substring_arrives() {
        let (mut vm, cap) = build("echo \"A\"\nwaitfor \"READY\"\necho \"B\"");
        vm.execute().unwrap();
        assert_eq!(echoes(&cap), vec!["A"]);
        assert_eq!(*vm.state(), VmState::Waiting("READY".into()));

        vm.process_incoming_text("Working...", false).unwrap();
        assert_eq!(*vm.state(), VmState::Waiting("READY".into()));

        vm.process_incoming_text("...READY now", false).unwrap();
        assert_eq!(echoes(&cap), vec!["A", "B"]);
        assert_eq!(*vm.state(), VmState::Halted);
    }

    #[test]
    fn pause_holds_position_until_resume() {
        let (mut vm, cap) = build("echo \"one\"\npause\necho \"two\"");
        vm.execute().unwrap();
        assert_eq!(*vm.state(), VmState::Paused);
        assert_eq!(echoes(&cap), vec!["one"]);
        vm.resume().unwrap();
        assert_eq!(echoes(&cap), vec!["one", "two"]);
        assert_eq!(*vm.state(), VmState::Halted);
    }

    #[test]
    fn variable_read_falls_back_to_constants_then_empty() {
        let (mut vm, _) = build("$line := $currentline\n$ghost := $nosuchvar");
        vm.consts
            .write()
            .unwrap()
            .update_current_line("prompt>", "prompt>");
        vm.execute().unwrap();
        assert_eq!(vm.get_var("line"), Value::Str("prompt>".into()));
        assert_eq!(vm.get_var("ghost"), Value::Str("".into()));
    }

    #[test]
    fn branch_jumps_unless_exactly_one() {
        let (mut vm, cap) = build(
            "branch \"1 = 1\" :skip\necho \"ran\"\n:skip\nbranch \"2\" :done\necho \"never\"\n:done",
        );
        vm.execute().unwrap();
        // 1 = 1 evaluates to 1: no jump. 2 is not 1: jump taken.
        assert_eq!(echoes(&cap), vec!["ran"]);
    }
}
