use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use gridseq_app::config::REGION_PATH_ENV;
use gridseq_app::snapshot::{self, SnapshotDocument};
use gridseq_app::EngineBridge;

const USAGE: &str = "usage: gridseq-cli <command>

commands:
  watch [region]           print playback state every 16 ms
  export [region] <out>    write a snapshot of a running engine
  validate <snapshot.json> check a snapshot document
  inspect <snapshot.json>  summarize a snapshot document

The region defaults to $GRIDSEQ_REGION_PATH.";

fn region_path(arg: Option<&String>) -> Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(PathBuf::from(path));
    }
    match std::env::var_os(REGION_PATH_ENV) {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("no region given and {} is not set", REGION_PATH_ENV),
    }
}

fn watch(path: PathBuf) -> Result<()> {
    let bridge = EngineBridge::open(&path)?;
    log::info!("watching {}", path.display());
    loop {
        let read = bridge.playback();
        let playback = read.value;
        println!(
            "ok={} step={} section={} loop={} bpm={} playing={} song={}",
            read.ok,
            playback.current_step,
            playback.current_section,
            playback.current_section_loop,
            playback.bpm,
            playback.is_playing(),
            playback.song_mode()
        );
        thread::sleep(Duration::from_millis(16));
    }
}

fn export(path: PathBuf, out: &str) -> Result<()> {
    let bridge = EngineBridge::open(&path)?;
    let name = std::path::Path::new(out)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let json = snapshot::export_json(&bridge, &name, None)?;
    std::fs::write(out, json).with_context(|| format!("failed to write {}", out))?;
    let counters = bridge.counters();
    if counters.fallbacks > 0 {
        log::warn!("{} block reads fell back to defaults", counters.fallbacks);
    }
    println!("wrote {}", out);
    Ok(())
}

fn read_document(path: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))
}

fn validate(path: &str) -> Result<()> {
    let json = read_document(path)?;
    if !snapshot::validate_json(&json) {
        bail!("{} is not a schema {} snapshot", path, snapshot::SCHEMA_VERSION);
    }
    snapshot::parse_document(&json).with_context(|| format!("{} failed to parse", path))?;
    println!("{}: ok", path);
    Ok(())
}

fn inspect(path: &str) -> Result<()> {
    let json = read_document(path)?;
    let SnapshotDocument { snapshot } = snapshot::parse_document(&json)?;
    let table = &snapshot.source.table;
    let playback = &snapshot.source.playback;
    println!("{} ({})", snapshot.name, snapshot.id);
    println!("created {} by version {}", snapshot.created_at, snapshot.version);
    if let Some(description) = &snapshot.description {
        println!("{}", description);
    }
    println!(
        "bpm {}, {} mode, region {}..{}",
        playback.bpm,
        if playback.song_mode != 0 { "song" } else { "loop" },
        playback.region_start,
        playback.region_end
    );
    for (index, section) in table.sections.iter().enumerate() {
        let end = (section.start_step + section.num_steps).max(0) as usize;
        let start = (section.start_step.max(0) as usize).min(end);
        let cells = table
            .table_cells
            .iter()
            .take(end)
            .skip(start)
            .flatten()
            .filter(|cell| cell.sample_slot >= 0)
            .count();
        let loops = playback.sections_loops_num.get(index).copied().unwrap_or(0);
        println!(
            "  section {}: steps {}..{} x{} loops, {} cells",
            index, section.start_step, end, loops, cells
        );
    }
    for (slot, sample) in snapshot.source.sample_bank.samples.iter().enumerate() {
        if sample.loaded {
            println!(
                "  slot {}: {}",
                snapshot::slot_letter(slot),
                sample
                    .display_name
                    .as_deref()
                    .or(sample.file_path.as_deref())
                    .unwrap_or("?")
            );
        }
    }
    Ok(())
}

fn run(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("watch") => watch(region_path(args.get(1))?),
        Some("export") => match args.len() {
            2 => export(region_path(None)?, &args[1]),
            3 => export(region_path(args.get(1))?, &args[2]),
            _ => bail!("{}", USAGE),
        },
        Some("validate") if args.len() == 2 => validate(&args[1]),
        Some("inspect") if args.len() == 2 => inspect(&args[1]),
        _ => bail!("{}", USAGE),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(&args) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
