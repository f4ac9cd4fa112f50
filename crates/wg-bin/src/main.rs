//! Warpgate entrypoint: the proxy that sits between a terminal client and a
//! line-oriented game server, hosting the script engine and game detector.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use core_config::Config;
use core_detect::{DetectorCallbacks, GameDetector};
use core_engine::Engine;
use core_host::MemoryStore;
use core_vm::TextSink;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "warpgate", version, about = "Scriptable proxy for line-oriented game servers")]
struct Args {
    /// Script files to load and start after connecting.
    pub scripts: Vec<PathBuf>,
    /// Configuration file path (overrides discovery of `warpgate.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Remote host (overrides the config file).
    #[arg(long)]
    pub host: Option<String>,
    /// Remote port (overrides the config file).
    #[arg(long)]
    pub port: Option<u16>,
    /// Local listen port for the terminal client.
    #[arg(long)]
    pub listen: Option<u16>,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self, config: &Config) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));
        match &config.log.dir {
            Some(dir) => {
                let appender = tracing_appender::rolling::daily(dir, "warpgate.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                self.log_guard = Some(guard);
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
            None => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        let default = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!(target: "runtime", %info, "panic");
            default(info);
        }));
    }
}

/// Swaps the engine's backing store as game sessions come and go.
struct DbBridge {
    engine: Arc<Engine>,
}

impl DetectorCallbacks for DbBridge {
    fn on_database_loaded(&self, game: &str, db_name: &str) -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let path = PathBuf::from(db_name);
        if path.is_file() {
            if let Err(e) = store.load_snapshot(&path) {
                warn!(target: "db", db = %db_name, error = %e, "snapshot load failed, starting fresh");
            }
        }
        self.engine.swap_store(store);
        if let Ok(mut consts) = self.engine.constants().write() {
            consts.set_game(game);
        }
        info!(target: "db", game, db = %db_name, "database loaded");
        Ok(())
    }

    fn on_database_state_changed(
        &self,
        game: &str,
        host: &str,
        port: u16,
        db_name: &str,
        is_loaded: bool,
    ) {
        info!(target: "db", game, host, port, db = %db_name, is_loaded, "database state changed");
        if !is_loaded {
            self.engine.swap_store(Arc::new(MemoryStore::new()));
            if let Ok(mut consts) = self.engine.constants().write() {
                consts.set_game("");
            }
        }
    }
}

fn effective_config(args: &Args) -> Result<Config> {
    let mut config = core_config::load(args.config.as_deref())?;
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(listen) = args.listen {
        config.proxy.listen = listen;
    }
    Ok(config)
}

fn byte_sink(tx: UnboundedSender<Vec<u8>>) -> TextSink {
    Arc::new(move |text: &str| {
        let _ = tx.send(text.as_bytes().to_vec());
    })
}

async fn pump_writer(
    mut queue: UnboundedReceiver<Vec<u8>>,
    mut writer: tokio::net::tcp::OwnedWriteHalf,
) {
    while let Some(bytes) = queue.recv().await {
        if writer.write_all(&bytes).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = effective_config(&args)?;
    let mut startup = AppStartup::new();
    startup.configure_logging(&config)?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", server = %config.server_addr(), listen = config.proxy.listen, "startup");

    let result = run(&config, &args).await;
    if let Err(e) = &result {
        error!(target: "runtime", error = %e, "fatal");
    }
    drop(startup.log_guard);
    result
}

async fn run(config: &Config, args: &Args) -> Result<()> {
    let engine = Arc::new(Engine::new(&config.base_path()));
    engine.swap_store(Arc::new(MemoryStore::new()));

    // Remote connection first; without it there is nothing to proxy.
    let remote = TcpStream::connect(config.server_addr())
        .await
        .with_context(|| format!("cannot connect to {}", config.server_addr()))?;
    let (mut remote_read, remote_write) = remote.into_split();
    let (to_remote, remote_queue) = unbounded_channel::<Vec<u8>>();
    tokio::spawn(pump_writer(remote_queue, remote_write));

    // Then the local terminal client.
    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("cannot listen on {}", config.listen_addr()))?;
    info!(target: "runtime", addr = %config.listen_addr(), "awaiting terminal client");
    let (client, peer) = listener.accept().await?;
    info!(target: "runtime", %peer, "terminal client attached");
    let (mut client_read, client_write) = client.into_split();
    let (to_client, client_queue) = unbounded_channel::<Vec<u8>>();
    tokio::spawn(pump_writer(client_queue, client_write));

    engine.set_send_handler(byte_sink(to_remote.clone()));
    engine.set_echo_handler(byte_sink(to_client.clone()));
    engine.set_output_handler(byte_sink(to_client.clone()));

    let bridge = Arc::new(DbBridge {
        engine: engine.clone(),
    });
    let detector = Arc::new(GameDetector::new(
        &config.server.host,
        config.server.port,
        bridge,
    ));
    {
        let detector = detector.clone();
        engine.add_raw_tap(Arc::new(move |raw: &str| detector.process_chunk(raw)));
    }

    engine.set_connected(true);

    for path in config.scripts.autorun.iter().chain(args.scripts.iter()) {
        match engine.load_from_file(path) {
            Ok(id) => {
                info!(target: "runtime", script = %path.display(), id, "autorun");
                let _ = engine.run(id);
            }
            Err(e) => warn!(target: "runtime", script = %path.display(), error = %e, "script load failed"),
        }
    }

    // Delay triggers and the detector's inactivity watchdog run off a plain
    // tick thread so the async pumps stay I/O-only.
    {
        let engine = engine.clone();
        let detector = detector.clone();
        std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(Duration::from_millis(250));
            while ticker.recv().is_ok() {
                let now = Instant::now();
                engine.tick(now);
                detector.check_timeout(now);
            }
        });
    }

    let inbound = {
        let engine = engine.clone();
        let to_client = to_client.clone();
        async move {
            let mut buf = vec![0u8; 4096];
            loop {
                match remote_read.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        engine.process_text(&text);
                        if to_client.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
            engine.set_connected(false);
            info!(target: "runtime", "remote closed");
        }
    };

    let outbound = {
        let engine = engine.clone();
        let to_remote = to_remote.clone();
        async move {
            let mut buf = vec![0u8; 1024];
            let mut line = String::new();
            let mut prev_cr = false;
            loop {
                match client_read.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                        for ch in text.chars() {
                            if ch == '\n' && prev_cr {
                                // Second half of a CRLF already handled.
                                prev_cr = false;
                                continue;
                            }
                            prev_cr = ch == '\r';
                            if ch == '\n' || ch == '\r' {
                                let completed = std::mem::take(&mut line);
                                // A script waiting on GETINPUT consumes the
                                // line; otherwise it goes to the remote.
                                if engine.supply_input(&completed) {
                                    continue;
                                }
                                engine.process_text_out(&completed);
                                let mut bytes = completed.into_bytes();
                                bytes.extend_from_slice(b"\r\n");
                                if to_remote.send(bytes).is_err() {
                                    return;
                                }
                            } else {
                                line.push(ch);
                            }
                        }
                    }
                }
            }
            info!(target: "runtime", "client closed");
        }
    };

    tokio::select! {
        _ = inbound => {}
        _ = outbound => {}
    }
    engine.stop_all();
    Ok(())
}
