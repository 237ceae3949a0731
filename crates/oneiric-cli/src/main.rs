mod host;
mod ui;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use oneiric_core::config::CapabilityMode;
use oneiric_core::config::Config;
use oneiric_core::elements::aggregate;
use oneiric_core::elements::progress;
use oneiric_core::elements::tiles;
use oneiric_core::elements::TileState;
use oneiric_core::elements::CODEX_CATEGORIES;
use oneiric_core::elements::CODEX_SAMPLE_GOAL;
use oneiric_core::logging;
use oneiric_core::store::DreamStore;
use oneiric_core::store::FileKeyValueStore;
use oneiric_core::store::ProfileStore;
use oneiric_core::AppState;
use oneiric_core::CaptureResult;
use oneiric_core::User;
use oneiric_core::UserAction;
use oneiric_core::VideoStatus;
use oneiric_exec::AudioSource;
use oneiric_exec::AudioVault;
use oneiric_exec::ClipboardShare;
use oneiric_exec::CommandAudioSource;
use oneiric_exec::CommandCapability;
use oneiric_exec::DreamCapability;
use oneiric_exec::FileAudioSource;
use oneiric_exec::Player;
use oneiric_exec::SimulatedCapability;

use crate::host::Host;

/// Upper bound for a headless command waiting on the backend.
const HEADLESS_TIMEOUT: Duration = Duration::from_secs(600);

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let command = args.next();
    let rest: Vec<String> = args.collect();

    match command.as_deref() {
        Some("--help" | "-h" | "help") => {
            print_help();
            return Ok(());
        }
        Some("--version" | "-V" | "version") => {
            println!("oneiric {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load()?;
    let _log_guard = logging::init(&config.logging)?;
    tracing::info!(
        command = command.as_deref().unwrap_or("tui"),
        capability = config.capability.mode.label(),
        "starting"
    );

    match command.as_deref() {
        None | Some("tui") => {
            let (mut state, mut host) = open(&config, recorder_source(&config))?;
            ui::run(&mut state, &mut host)
        }
        Some("capture") => {
            let path = parse_audio_arg(&rest)?;
            let (mut state, mut host) = open(&config, Arc::new(FileAudioSource::new(path)))?;
            capture(&mut state, &mut host)
        }
        Some("list") => {
            let json = match rest.as_slice() {
                [] => false,
                [flag] if flag == "--json" => true,
                _ => return Err("usage: oneiric list [--json]".into()),
            };
            let (state, _host) = open(&config, recorder_source(&config))?;
            list(&state, json)
        }
        Some("codex") => {
            let (state, _host) = open(&config, recorder_source(&config))?;
            codex(&state);
            Ok(())
        }
        Some("video") => {
            let id = single_id(&rest, "video")?;
            let (mut state, mut host) = open(&config, recorder_source(&config))?;
            video(&mut state, &mut host, id)
        }
        Some("analyze") => {
            let id = single_id(&rest, "analyze")?;
            let (mut state, mut host) = open(&config, recorder_source(&config))?;
            analyze(&mut state, &mut host, id)
        }
        Some("delete") => {
            let id = single_id(&rest, "delete")?;
            let (mut state, mut host) = open(&config, recorder_source(&config))?;
            delete(&mut state, &mut host, id)
        }
        Some("pro") => {
            let enable = match rest.as_slice() {
                [value] if value == "on" => true,
                [value] if value == "off" => false,
                _ => return Err("usage: oneiric pro on|off".into()),
            };
            let (mut state, mut host) = open(&config, recorder_source(&config))?;
            if state.user().is_pro != enable {
                host.user(&mut state, UserAction::TogglePro);
                report_notices(&state);
            }
            println!(
                "{}: {}",
                state.user().name,
                if state.user().is_pro { "专业会员" } else { "免费账户" }
            );
            Ok(())
        }
        Some(other) => {
            print_help();
            Err(format!("unknown command: {other}").into())
        }
    }
}

fn print_help() {
    println!("oneiric {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage:");
    println!("  oneiric                      open the dream journal");
    println!("  oneiric capture --audio PATH record a dream from an audio file");
    println!("  oneiric list [--json]        list recorded dreams");
    println!("  oneiric codex                show collected dream symbols");
    println!("  oneiric video ID             generate the video for a dream");
    println!("  oneiric analyze ID           show the deep analysis of a dream");
    println!("  oneiric delete ID            forget a dream");
    println!("  oneiric pro on|off           switch the membership tier");
    println!();
    println!("Config: {}", Config::config_path().display());
    println!("Logs:   {}", Config::log_path().display());
}

fn parse_audio_arg(args: &[String]) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut audio = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--audio" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--audio requires a path".into());
                };
                audio = Some(PathBuf::from(value));
                i += 2;
            }
            other => {
                return Err(format!("unsupported argument: {other}").into());
            }
        }
    }
    audio.ok_or_else(|| "capture requires --audio PATH".into())
}

fn single_id<'a>(args: &'a [String], command: &str) -> Result<&'a str, Box<dyn std::error::Error>> {
    match args {
        [id] => Ok(id.as_str()),
        _ => Err(format!("usage: oneiric {command} ID").into()),
    }
}

fn recorder_source(config: &Config) -> Arc<dyn AudioSource> {
    Arc::new(CommandAudioSource::new(
        config.audio.recorder_program.clone(),
        config.audio.recorder_args.clone(),
    ))
}

fn capability(config: &Config) -> Result<Arc<dyn DreamCapability>, Box<dyn std::error::Error>> {
    match config.capability.mode {
        CapabilityMode::Simulated => Ok(Arc::new(SimulatedCapability::new(
            Duration::from_millis(config.capability.latency_ms),
        ))),
        CapabilityMode::Command => {
            let Some(program) = config.capability.program.clone() else {
                return Err("capability.program must be set when mode = \"command\"".into());
            };
            Ok(Arc::new(CommandCapability::new(
                program,
                config.capability.args.clone(),
            )))
        }
    }
}

fn open(
    config: &Config,
    audio_source: Arc<dyn AudioSource>,
) -> Result<(AppState, Host), Box<dyn std::error::Error>> {
    let data_dir = config.data_dir();
    let backend = FileKeyValueStore::open(&data_dir)?;
    let dreams = DreamStore::load(Box::new(backend.clone()))?;
    let profile = ProfileStore::load(
        Box::new(backend),
        User::with_name(config.profile.default_name.clone()),
    )?;

    let host = Host::new(
        capability(config)?,
        audio_source,
        AudioVault::new(&data_dir),
        Player::new(
            config.audio.player_program.clone(),
            config.audio.player_args.clone(),
        ),
        Box::new(ClipboardShare),
    );
    Ok((AppState::new(dreams, profile), host))
}

fn report_notices(state: &AppState) {
    for notice in state.notices.iter() {
        eprintln!("[{:?}] {}", notice.level, notice.message);
    }
}

fn require_dream(state: &AppState, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if state.dreams.contains(id) {
        Ok(())
    } else {
        Err(oneiric_core::Error::NotFound(id.to_string()).into())
    }
}

fn capture(state: &mut AppState, host: &mut Host) -> Result<(), Box<dyn std::error::Error>> {
    host.user(state, UserAction::StartRecording);
    let settled = host.settle(state, HEADLESS_TIMEOUT, |state| {
        state.capture.stage.is_idle() && state.capture.last_outcome.is_some()
    });
    report_notices(state);
    if !settled {
        return Err("capture did not finish in time".into());
    }

    match state.capture.last_outcome.as_ref().map(|outcome| &outcome.result) {
        Some(CaptureResult::Succeeded { dream_id }) => {
            if let Some(dream) = state.dreams.get(dream_id) {
                print_dream(dream);
            }
            Ok(())
        }
        Some(CaptureResult::Failed(kind)) => Err(format!("capture failed: {}", kind.label()).into()),
        Some(CaptureResult::Cancelled) | None => Err("nothing was recorded".into()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRow<'a> {
    id: &'a str,
    date: String,
    title: &'a str,
    mood: Option<&'a str>,
    video_status: &'static str,
    elements: &'a [String],
}

fn list(state: &AppState, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let rows: Vec<ListRow<'_>> = state
        .dreams
        .dreams()
        .iter()
        .map(|dream| ListRow {
            id: &dream.id,
            date: dream.date.to_rfc3339(),
            title: &dream.title,
            mood: dream.mood.as_deref(),
            video_status: dream.video_status.label(),
            elements: &dream.elements,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("还没有记录任何梦境。");
        return Ok(());
    }
    for row in rows {
        println!(
            "{}  {}  {}  [{}]  {}",
            row.id,
            &row.date[..10],
            row.title,
            row.video_status,
            row.mood.unwrap_or("-")
        );
    }
    Ok(())
}

fn codex(state: &AppState) {
    let index = aggregate(state.dreams.dreams());
    println!("梦境图鉴  {} / {}", index.len(), CODEX_SAMPLE_GOAL);
    for category in CODEX_CATEGORIES {
        let (collected, total) = progress(category, &index);
        println!();
        println!(
            "{} · {}  {collected}/{total}",
            category.label(),
            category.description()
        );
        let line: Vec<String> = tiles(category, &index)
            .iter()
            .map(|tile| match tile.state {
                TileState::Locked => "??".to_string(),
                TileState::Collected => format!("{}×{}", tile.name, tile.entry.map_or(0, |e| e.count)),
                TileState::Mastered => format!("★{}×{}", tile.name, tile.entry.map_or(0, |e| e.count)),
            })
            .collect();
        println!("  {}", line.join("  "));
    }
}

fn video(
    state: &mut AppState,
    host: &mut Host,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    require_dream(state, id)?;
    host.user(state, UserAction::TriggerVideo { id: id.to_string() });
    host.settle(state, HEADLESS_TIMEOUT, |state| {
        state
            .dreams
            .get(id)
            .map_or(true, |dream| dream.video_status != VideoStatus::Processing)
    });
    report_notices(state);

    let Some(dream) = state.dreams.get(id) else {
        return Err(oneiric_core::Error::NotFound(id.to_string()).into());
    };
    match (dream.video_status, dream.video_url.as_deref()) {
        (VideoStatus::Completed, Some(url)) => {
            println!("{url}");
            Ok(())
        }
        (status, _) => Err(format!("video is {}", status.label()).into()),
    }
}

fn analyze(
    state: &mut AppState,
    host: &mut Host,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    require_dream(state, id)?;
    host.user(state, UserAction::SelectDream { id: id.to_string() });
    host.user(state, UserAction::OpenDeepAnalysis);
    host.settle(state, HEADLESS_TIMEOUT, |state| {
        state.enrichment.deep_analysis_in_flight.is_empty()
    });
    report_notices(state);

    match state.dreams.get(id).and_then(|dream| dream.detailed_analysis.as_deref()) {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => Err("deep analysis unavailable".into()),
    }
}

fn delete(
    state: &mut AppState,
    host: &mut Host,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    require_dream(state, id)?;
    host.user(state, UserAction::DeleteDream { id: id.to_string() });
    report_notices(state);
    println!("已遗忘 {id}");
    Ok(())
}

fn print_dream(dream: &oneiric_core::Dream) {
    println!("{}", dream.id);
    println!("【{}】 {}", dream.title, dream.date.to_rfc3339());
    if let Some(mood) = dream.mood.as_deref() {
        println!("情绪: {mood}  色彩: {}", dream.color);
    }
    if !dream.key_points.is_empty() {
        println!("要点: {}", dream.key_points.join(" / "));
    }
    println!("{}", dream.interpretation);
    if let Some(image) = dream.image_url.as_deref() {
        println!("画面: {image}");
    }
}
