//! Script table and stream plumbing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use core_host::{GameStore, MenuHost, NetHost};
use core_lang::{CompileError, IncludeResolver, Program};
use core_vm::{AnsiStripper, SystemConstants, TextSink, Vm};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("no script with id {0}")]
    UnknownScript(u64),
    #[error("script {0} did not run to completion")]
    DidNotComplete(u64),
}

/// One loaded script: compiled program plus its owning VM.
struct Script {
    id: u64,
    name: String,
    path: Option<PathBuf>,
    vm: Vm,
    running: bool,
    system: bool,
}

/// Listing row for `list()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInfo {
    pub id: u64,
    pub name: String,
    pub running: bool,
    pub system: bool,
}

#[derive(Default)]
struct Handlers {
    send: Option<TextSink>,
    echo: Option<TextSink>,
    output: Option<TextSink>,
}

pub struct Engine {
    scripts: RwLock<HashMap<u64, Arc<Mutex<Script>>>>,
    next_id: AtomicU64,
    consts: Arc<RwLock<SystemConstants>>,
    stripper: Mutex<AnsiStripper>,
    line_buf: Mutex<String>,
    raw_line_buf: Mutex<String>,
    raw_taps: RwLock<Vec<TextSink>>,
    handlers: RwLock<Handlers>,
    store: RwLock<Option<Arc<dyn GameStore>>>,
    menus: RwLock<Option<Arc<dyn MenuHost>>>,
    net: RwLock<Option<Arc<dyn NetHost>>>,
    base_path: PathBuf,
}

impl Engine {
    pub fn new(base_path: &Path) -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            consts: Arc::new(RwLock::new(SystemConstants::new())),
            stripper: Mutex::new(AnsiStripper::new()),
            line_buf: Mutex::new(String::new()),
            raw_line_buf: Mutex::new(String::new()),
            raw_taps: RwLock::new(Vec::new()),
            handlers: RwLock::new(Handlers::default()),
            store: RwLock::new(None),
            menus: RwLock::new(None),
            net: RwLock::new(None),
            base_path: base_path.to_path_buf(),
        }
    }

    pub fn constants(&self) -> Arc<RwLock<SystemConstants>> {
        self.consts.clone()
    }

    // ---- handler wiring ----------------------------------------------

    /// Raw-stream taps run on every inbound chunk before ANSI stripping.
    pub fn add_raw_tap(&self, tap: TextSink) {
        self.raw_taps.write().unwrap().push(tap);
    }

    pub fn set_send_handler(&self, sink: TextSink) {
        self.handlers.write().unwrap().send = Some(sink.clone());
        self.for_each_script(|script| script.vm.set_send_handler(sink.clone()));
    }

    pub fn set_echo_handler(&self, sink: TextSink) {
        self.handlers.write().unwrap().echo = Some(sink.clone());
        self.for_each_script(|script| script.vm.set_echo_handler(sink.clone()));
    }

    pub fn set_output_handler(&self, sink: TextSink) {
        self.handlers.write().unwrap().output = Some(sink.clone());
        self.for_each_script(|script| script.vm.set_output_handler(sink.clone()));
    }

    /// Attach or swap the persistent store; every loaded VM follows. The game
    /// detector calls this when a session's database changes.
    pub fn swap_store(&self, store: Arc<dyn GameStore>) {
        *self.store.write().unwrap() = Some(store.clone());
        self.for_each_script(|script| script.vm.attach_store(store.clone()));
    }

    pub fn attach_menus(&self, menus: Arc<dyn MenuHost>) {
        *self.menus.write().unwrap() = Some(menus.clone());
        self.for_each_script(|script| script.vm.attach_menus(menus.clone()));
    }

    pub fn attach_net(&self, net: Arc<dyn NetHost>) {
        *self.net.write().unwrap() = Some(net.clone());
        self.for_each_script(|script| script.vm.attach_net(net.clone()));
    }

    fn for_each_script(&self, mut f: impl FnMut(&mut Script)) {
        let snapshot: Vec<_> = self.scripts.read().unwrap().values().cloned().collect();
        for script in snapshot {
            f(&mut script.lock().unwrap());
        }
    }

    // ---- lifecycle ----------------------------------------------------

    pub fn load_from_file(&self, path: &Path) -> Result<u64, EngineError> {
        let program = core_lang::compile_file(path, &self.base_path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.install(program, &name, Some(path.to_path_buf()), false))
    }

    pub fn load_from_string(&self, name: &str, source: &str) -> Result<u64, EngineError> {
        let program = core_lang::compile_source(source, name)?;
        let program = IncludeResolver::new(&self.base_path).resolve_in(program, name)?;
        Ok(self.install(program, name, None, false))
    }

    /// System scripts survive `stop_all`.
    pub fn load_system_script(&self, name: &str, source: &str) -> Result<u64, EngineError> {
        let id = self.load_from_string(name, source)?;
        if let Some(script) = self.get_script(id) {
            script.lock().unwrap().system = true;
        }
        Ok(id)
    }

    fn install(&self, program: Program, name: &str, path: Option<PathBuf>, system: bool) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut vm = Vm::new(id, name, Arc::new(program), self.consts.clone());
        {
            let handlers = self.handlers.read().unwrap();
            if let Some(sink) = &handlers.send {
                vm.set_send_handler(sink.clone());
            }
            if let Some(sink) = &handlers.echo {
                vm.set_echo_handler(sink.clone());
            }
            if let Some(sink) = &handlers.output {
                vm.set_output_handler(sink.clone());
            }
        }
        if let Some(store) = self.store.read().unwrap().clone() {
            vm.attach_store(store);
        }
        if let Some(menus) = self.menus.read().unwrap().clone() {
            vm.attach_menus(menus);
        }
        if let Some(net) = self.net.read().unwrap().clone() {
            vm.attach_net(net);
        }
        let script = Script {
            id,
            name: name.to_string(),
            path,
            vm,
            running: false,
            system,
        };
        info!(target: "engine", id, name = %script.name, "script loaded");
        self.scripts
            .write()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(script)));
        id
    }

    fn get_script(&self, id: u64) -> Option<Arc<Mutex<Script>>> {
        self.scripts.read().unwrap().get(&id).cloned()
    }

    /// Start a script: execute until it halts or suspends. The script stays
    /// registered as running while it is suspended on triggers or input.
    pub fn run(&self, id: u64) -> Result<(), EngineError> {
        let script = self.get_script(id).ok_or(EngineError::UnknownScript(id))?;
        let mut script = script.lock().unwrap();
        script.running = true;
        let result = script.vm.execute();
        if let Err(e) = result {
            debug!(target: "engine", id, error = %e, "script ended with error");
        }
        script.running = script.vm.state().is_alive();
        Ok(())
    }

    /// Run a script that must complete without suspending, then unload it.
    pub fn run_sync(&self, id: u64) -> Result<(), EngineError> {
        self.run(id)?;
        let completed = self
            .get_script(id)
            .map(|s| !s.lock().unwrap().vm.state().is_alive())
            .unwrap_or(false);
        self.unload(id)?;
        if completed {
            Ok(())
        } else {
            Err(EngineError::DidNotComplete(id))
        }
    }

    pub fn stop(&self, id: u64) -> Result<(), EngineError> {
        let script = self.get_script(id).ok_or(EngineError::UnknownScript(id))?;
        let mut script = script.lock().unwrap();
        script.vm.halt();
        script.running = false;
        info!(target: "engine", id, name = %script.name, "script stopped");
        Ok(())
    }

    /// Halt every non-system script. Graceful: triggers die with their VMs.
    pub fn stop_all(&self) {
        self.for_each_script(|script| {
            if !script.system && script.running {
                script.vm.halt();
                script.running = false;
            }
        });
    }

    pub fn unload(&self, id: u64) -> Result<(), EngineError> {
        let script = self
            .scripts
            .write()
            .unwrap()
            .remove(&id)
            .ok_or(EngineError::UnknownScript(id))?;
        script.lock().unwrap().vm.halt();
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<ScriptInfo> {
        self.get_script(id).map(|s| {
            let s = s.lock().unwrap();
            ScriptInfo {
                id: s.id,
                name: s.name.clone(),
                running: s.running,
                system: s.system,
            }
        })
    }

    pub fn list(&self) -> Vec<ScriptInfo> {
        let mut out: Vec<ScriptInfo> = self
            .scripts
            .read()
            .unwrap()
            .values()
            .map(|s| {
                let s = s.lock().unwrap();
                ScriptInfo {
                    id: s.id,
                    name: s.name.clone(),
                    running: s.running,
                    system: s.system,
                }
            })
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn get_running(&self) -> Vec<u64> {
        self.list()
            .into_iter()
            .filter(|s| s.running)
            .map(|s| s.id)
            .collect()
    }

    pub fn script_path(&self, id: u64) -> Option<PathBuf> {
        self.get_script(id).and_then(|s| s.lock().unwrap().path.clone())
    }

    // ---- text streams -------------------------------------------------

    /// Inbound chunk from the remote, arbitrary split points allowed.
    pub fn process_text(&self, raw: &str) {
        for tap in self.raw_taps.read().unwrap().iter() {
            tap(raw);
        }
        let stripped = self.stripper.lock().unwrap().push(raw);
        let mut units: Vec<(String, String, bool)> = Vec::new();
        {
            let mut buf = self.line_buf.lock().unwrap();
            let mut raw_buf = self.raw_line_buf.lock().unwrap();
            buf.push_str(&stripped);
            raw_buf.push_str(raw);
            while let Some(pos) = buf.find('\n') {
                let mut line: String = buf[..pos].to_string();
                if line.ends_with('\r') {
                    line.pop();
                }
                buf.drain(..=pos);
                let raw_line = match raw_buf.find('\n') {
                    Some(raw_pos) => {
                        let r: String = raw_buf[..raw_pos].trim_end_matches('\r').to_string();
                        raw_buf.drain(..=raw_pos);
                        r
                    }
                    None => std::mem::take(&mut *raw_buf),
                };
                units.push((line, raw_line, true));
            }
            if !stripped.is_empty() && !buf.is_empty() {
                units.push((buf.clone(), raw_buf.clone(), false));
            }
        }
        for (unit, raw_unit, complete) in units {
            if let Ok(mut consts) = self.consts.write() {
                consts.update_current_line(&unit, &raw_unit);
            }
            self.fan_out(&unit, complete);
        }
    }

    fn fan_out(&self, unit: &str, complete: bool) {
        let snapshot: Vec<_> = self.scripts.read().unwrap().values().cloned().collect();
        for script in snapshot {
            let mut script = script.lock().unwrap();
            if !script.running {
                continue;
            }
            if complete && script.vm.logging_inbound() {
                script.vm.echo_line(&format!("{unit}\r\n"));
            }
            if let Err(e) = script.vm.process_incoming_text(unit, complete) {
                warn!(target: "engine.text", id = script.id, error = %e, "script failed on inbound text");
            }
            script.running = script.vm.state().is_alive();
        }
    }

    /// Outgoing text (local user input on its way to the remote).
    pub fn process_text_out(&self, text: &str) {
        self.for_each_running(|vm| vm.process_text_out(text));
    }

    /// Engine lifecycle and script-raised events.
    pub fn process_event(&self, event: &str) {
        self.for_each_running(|vm| vm.process_event(event));
    }

    /// Drive delay-trigger expiry; the binary calls this on a periodic tick.
    pub fn tick(&self, now: Instant) {
        self.for_each_running(|vm| vm.check_delay_triggers(now));
    }

    /// Connection lifecycle: updates `%CONNECTED` and raises the matching
    /// event for event triggers.
    pub fn set_connected(&self, connected: bool) {
        if let Ok(mut consts) = self.consts.write() {
            consts.set_connected(connected);
        }
        self.process_event(if connected { "CONNECT" } else { "DISCONNECT" });
    }

    fn for_each_running(&self, f: impl Fn(&mut Vm) -> Result<(), core_vm::VmError>) {
        let snapshot: Vec<_> = self.scripts.read().unwrap().values().cloned().collect();
        for script in snapshot {
            let mut script = script.lock().unwrap();
            if !script.running {
                continue;
            }
            if let Err(e) = f(&mut script.vm) {
                warn!(target: "engine", id = script.id, error = %e, "script failed");
            }
            script.running = script.vm.state().is_alive();
        }
    }

    /// Feed collected console input to the first script waiting on it.
    /// Returns true when a script consumed the input.
    pub fn supply_input(&self, input: &str) -> bool {
        let snapshot: Vec<_> = self.scripts.read().unwrap().values().cloned().collect();
        for script in snapshot {
            let mut script = script.lock().unwrap();
            if script.running && script.vm.awaiting_input() {
                if let Err(e) = script.vm.resume_with_input(input) {
                    warn!(target: "engine", id = script.id, error = %e, "script failed on input");
                }
                script.running = script.vm.state().is_alive();
                return true;
            }
        }
        false
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scripts", &self.scripts.read().unwrap().len())
            .field("base_path", &self.base_path)
            .finish()
    }
}
