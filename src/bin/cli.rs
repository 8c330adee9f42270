use anyhow::{bail, Context, Result};
use crossbeam_channel::{select, unbounded, Receiver};
use isocam::platform::{CountingSurface, Surface, SyntheticCamera, SyntheticConfig};
use isocam::recording::Mp4RecordingSink;
use isocam::timing::{SystemClock, WallClock};
use isocam::{activation_parts, CaptureHandle, IsoCamConfig, SessionEvent, StatusSnapshot};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "commands: start | stop | toggle | status | surface | lose-surface | unplug | quit";

struct Options {
    config: Option<PathBuf>,
    deny_permission: bool,
    json: bool,
}

fn parse_args() -> Result<Options> {
    let mut options = Options {
        config: None,
        deny_permission: false,
        json: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                options.config = Some(PathBuf::from(path));
            }
            "--deny-permission" => options.deny_permission = true,
            "--json" => options.json = true,
            "-h" | "--help" => {
                println!("Usage: isocam-cli [--config <file>] [--deny-permission] [--json]");
                println!("{HELP}");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(options)
}

fn load_config(options: &Options) -> Result<IsoCamConfig> {
    let config = match &options.config {
        Some(path) => IsoCamConfig::load_from_file(path)?,
        None => IsoCamConfig::load_or_default(),
    };
    if let Err(e) = config.validate() {
        bail!("invalid configuration: {e}");
    }
    Ok(config)
}

fn print_event(event: &SessionEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("cannot encode event: {e}"),
        }
        return;
    }
    match event {
        SessionEvent::ModeChanged { mode, .. } => println!("mode: {mode}"),
        SessionEvent::DeviceOpened { device_id } => println!("camera {device_id} opened"),
        SessionEvent::DeviceClosed { device_id } => println!("camera {device_id} closed"),
        SessionEvent::Diagnostic(d) => println!("[{}] {}", d.kind, d.message),
        SessionEvent::ShutDown => println!("shut down"),
    }
}

fn print_status(status: &StatusSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(status)?);
        return Ok(());
    }
    println!(
        "mode={} device_open={} surface_ready={} permission={} logged={} discarded={}",
        status.mode,
        status.device_open,
        status.surface_ready,
        status.permission,
        status.samples_logged,
        status.frames_discarded
    );
    if let Some(elapsed) = status.recording_elapsed_ms(SystemClock.now_millis()) {
        println!("recording for {:.1}s", elapsed as f64 / 1000.0);
    }
    if let Some(path) = &status.log_path {
        println!("telemetry log: {}", path.display());
    }
    Ok(())
}

fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    isocam::init_logging();
    let options = parse_args()?;
    let config = load_config(&options)?;

    let camera = SyntheticCamera::new(SyntheticConfig::from_config(&config));
    let controller = camera.controller();
    let parts = activation_parts(&config, Box::new(camera), Box::new(Mp4RecordingSink::new()));
    let mut capture = CaptureHandle::spawn(parts)?;

    let json = options.json;
    let mut events = capture.subscribe();
    let printer = std::thread::spawn(move || loop {
        match events.blocking_recv() {
            Ok(event) => print_event(&event, json),
            Err(RecvError::Lagged(n)) => eprintln!("({n} events skipped)"),
            Err(RecvError::Closed) => break,
        }
    });

    let (interrupt_tx, interrupts) = unbounded();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })
    .context("cannot install Ctrl-C handler")?;

    let preview_counter = Arc::new(CountingSurface::new("preview"));
    let preview: Surface = preview_counter.clone();
    capture.on_surface_ready(preview.clone())?;
    if options.deny_permission {
        capture.on_permission_denied()?;
    } else {
        capture.on_permission_granted()?;
    }

    if !json {
        println!("{HELP}");
    }
    let lines = stdin_lines();
    loop {
        select! {
            recv(interrupts) -> _ => break,
            recv(lines) -> line => {
                let Ok(line) = line else { break };
                match line.trim() {
                    "" => {}
                    "start" => capture.on_start_recording()?,
                    "stop" => capture.on_stop_recording()?,
                    "toggle" => capture.toggle_recording()?,
                    "status" => {
                        print_status(&capture.status(), json)?;
                        if !json {
                            println!("preview frames shown: {}", preview_counter.frames());
                        }
                    }
                    "surface" => capture.on_surface_ready(preview.clone())?,
                    "lose-surface" => capture.on_surface_lost()?,
                    "unplug" => {
                        if !controller.disconnect() {
                            println!("no camera is open");
                        }
                    }
                    "quit" | "exit" => break,
                    other => println!("unknown command '{other}'; {HELP}"),
                }
            }
        }
    }

    capture.on_shutdown()?;
    let status = capture.status();
    drop(capture);
    if printer.join().is_err() {
        eprintln!("event printer panicked");
    }
    if let Some(path) = &status.log_path {
        println!("telemetry: {} samples in {}", status.samples_logged, path.display());
    }
    println!("recording: {}", config.recording_path().display());
    Ok(())
}
