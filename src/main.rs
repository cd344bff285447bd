use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use setlist_sync::config::Config;
use setlist_sync::config_persistence::{
    default_config_path, load_or_create_config, resolve_database_path,
};
use setlist_sync::db_manager::{DbManager, SetlistStore};
use setlist_sync::drag::{DragReorderController, DragThresholds, PointerKind, PointerPoint};
use setlist_sync::headless_host::HeadlessPlayerHost;
use setlist_sync::lookup_worker::LookupWorker;
use setlist_sync::oembed_lookup::OEmbedTitleLookup;
use setlist_sync::platform::PlatformCapabilities;
use setlist_sync::player::PlayerController;
use setlist_sync::protocol::{
    Message, NotificationLevel, PlaybackMessage, ReferenceMessage, SessionMessage, SetlistMessage,
};
use setlist_sync::session::{SessionSettings, SetlistSession};
use setlist_sync::setlist::Setlist;
use setlist_sync::song::Song;

const TICK_INTERVAL: Duration = Duration::from_millis(50);
const HEADLESS_DURATION_SECONDS: f64 = 240.0;
const ROW_HEIGHT_PX: f32 = 48.0;

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn load_catalog(path: &Path) -> Result<Vec<Song>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read catalog {}: {err}", path.display()))?;
    let songs: Vec<Song> = serde_json::from_str(&content)
        .map_err(|err| format!("failed to parse catalog {}: {err}", path.display()))?;
    let admitted: Vec<Song> = songs
        .into_iter()
        .filter(|song| {
            let admissible = song.is_admissible();
            if !admissible {
                warn!("Catalog: song {} has no file variants, skipping", song.id);
            }
            admissible
        })
        .collect();
    Ok(admitted)
}

fn row_point(index: usize) -> PointerPoint {
    PointerPoint::new(0.0, index as f32 * ROW_HEIGHT_PX)
}

fn parse_index(value: Option<&str>, what: &str) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("missing {what}"))?;
    value
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .ok_or_else(|| format!("{what} must be a row number starting at 1"))
}

/// Translates one line of shell input into bus messages. Row numbers are 1-based.
fn parse_command(line: &str, generation: Uuid) -> Result<Vec<Message>, String> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(Vec::new());
    };
    let messages = match command {
        "play" | "p" => vec![Message::Playback(PlaybackMessage::TogglePlay(parse_index(
            parts.next(),
            "row",
        )?))],
        "remove" | "rm" => vec![Message::Setlist(SetlistMessage::RemoveEntry(parse_index(
            parts.next(),
            "row",
        )?))],
        "move" | "mv" => {
            let from = parse_index(parts.next(), "source row")?;
            let to = parse_index(parts.next(), "target row")?;
            vec![
                Message::Setlist(SetlistMessage::PointerDown {
                    index: from,
                    kind: PointerKind::Mouse,
                    point: row_point(from),
                }),
                Message::Setlist(SetlistMessage::PointerMove {
                    over_index: Some(to),
                    point: row_point(to),
                }),
                Message::Setlist(SetlistMessage::PointerUp),
            ]
        }
        "mute" => vec![Message::Playback(PlaybackMessage::ToggleMute)],
        "seek" => {
            let seconds = parts
                .next()
                .and_then(|value| value.parse::<f64>().ok())
                .ok_or_else(|| "seek needs a number of seconds".to_string())?;
            vec![Message::Playback(PlaybackMessage::Seek(seconds))]
        }
        "variant" => {
            let song_id = parts.next().ok_or("variant needs a song id")?;
            let variant_key = parts.next().ok_or("variant needs a key")?;
            vec![Message::Setlist(SetlistMessage::SelectVariant {
                song_id: song_id.to_string(),
                variant_key: variant_key.to_string(),
            })]
        }
        "ref" => {
            let song_id = parts.next().ok_or("ref needs a song id")?;
            vec![Message::Setlist(SetlistMessage::SelectReference {
                song_id: song_id.to_string(),
                url: parts.next().unwrap_or_default().to_string(),
            })]
        }
        "labels" => {
            let song_id = parts.next().ok_or("labels needs a song id")?;
            vec![Message::Reference(ReferenceMessage::LabelsRequested {
                song_id: song_id.to_string(),
            })]
        }
        "ended" => vec![Message::Playback(PlaybackMessage::PlayerStateChanged {
            generation,
            code: 0,
        })],
        "error" => {
            let code = parts
                .next()
                .and_then(|value| value.parse::<i32>().ok())
                .ok_or_else(|| "error needs a numeric code".to_string())?;
            vec![Message::Playback(PlaybackMessage::PlayerError { generation, code })]
        }
        "save" => vec![Message::Setlist(SetlistMessage::SaveRequested)],
        "quit" | "exit" => vec![Message::Session(SessionMessage::Unmount)],
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(messages)
}

fn print_message(message: &Message) {
    match message {
        Message::Setlist(SetlistMessage::RowsChanged(rows)) => {
            println!("--- setlist ---");
            for (index, row) in rows.iter().enumerate() {
                println!(
                    "{}{:>3}. {}{} [{}]",
                    if row.is_bound { ">" } else { " " },
                    index + 1,
                    row.title,
                    row.duplicate_label,
                    row.selected_variant_key
                );
            }
        }
        Message::Setlist(SetlistMessage::RowTapped(index)) => {
            println!("row {} tapped", index + 1);
        }
        Message::Playback(PlaybackMessage::StateChanged(state)) => {
            if let Some(key) = &state.bound_item_key {
                println!(
                    "playing {} {:.0}/{:.0}s{}",
                    key,
                    state.current_time_seconds,
                    state.duration_seconds,
                    if state.is_muted { " (muted)" } else { "" }
                );
            }
        }
        Message::Reference(ReferenceMessage::LabelsResolved { song_id, labels }) => {
            println!("references for {}:", song_id);
            for label in labels {
                println!("  {} <{}>", label.label, label.url);
            }
        }
        Message::Session(SessionMessage::Notification(notification)) => {
            let prefix = match notification.level {
                NotificationLevel::Info => "info",
                NotificationLevel::Warning => "warning",
                NotificationLevel::Error => "error",
            };
            println!("[{}] {}", prefix, notification.message);
        }
        _ => {}
    }
}

const USAGE: &str = "usage: setlist-sync <catalog.json> [setlist-id] | --list | --delete <setlist-id>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellMode {
    Run {
        catalog_path: PathBuf,
        setlist_id: String,
    },
    ListSetlists,
    DeleteSetlist(String),
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<ShellMode, String> {
    let first = args.next().ok_or(USAGE)?;
    match first.as_str() {
        "--list" => Ok(ShellMode::ListSetlists),
        "--delete" => args
            .next()
            .map(ShellMode::DeleteSetlist)
            .ok_or_else(|| USAGE.to_string()),
        _ => Ok(ShellMode::Run {
            catalog_path: PathBuf::from(first),
            setlist_id: args.next().unwrap_or_else(|| "default".to_string()),
        }),
    }
}

fn load_config() -> Config {
    let config = match default_config_path() {
        Some(path) => load_or_create_config(&path),
        None => {
            warn!("No config directory available. Using defaults");
            Config::default()
        }
    };
    log::set_max_level(config.logging.level_filter());
    debug!("Loaded config: {:?}", config);
    config
}

fn open_database(config: &Config) -> Result<DbManager, rusqlite::Error> {
    match resolve_database_path(config).map(|path| DbManager::new(&path)) {
        Some(Ok(db_manager)) => Ok(db_manager),
        Some(Err(err)) => {
            warn!("Failed to open setlist database: {}. Using in-memory storage", err);
            DbManager::new_in_memory()
        }
        None => {
            warn!("No data directory available. Using in-memory storage");
            DbManager::new_in_memory()
        }
    }
}

fn run_maintenance(
    mode: ShellMode,
    db_manager: &mut DbManager,
) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        ShellMode::ListSetlists => {
            for setlist in db_manager.get_all_setlists()? {
                println!("{}\t{}", setlist.id, setlist.name);
            }
        }
        ShellMode::DeleteSetlist(setlist_id) => {
            db_manager.delete_setlist(&setlist_id)?;
            info!("Deleted setlist {}", setlist_id);
        }
        ShellMode::Run { .. } => {}
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Trace);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let (catalog_path, setlist_id) = match parse_args(std::env::args().skip(1))? {
        ShellMode::Run {
            catalog_path,
            setlist_id,
        } => (catalog_path, setlist_id),
        maintenance => {
            let config = load_config();
            let mut db_manager = open_database(&config)?;
            return run_maintenance(maintenance, &mut db_manager);
        }
    };

    let config = load_config();

    let catalog = load_catalog(&catalog_path)?;
    info!("Loaded {} songs from {}", catalog.len(), catalog_path.display());

    let db_manager = open_database(&config)?;
    let has_saved_rows = !db_manager.load_setlist(&setlist_id)?.is_empty();

    let (bus_sender, _) = broadcast::channel(1024);
    let generation = Uuid::new_v4();

    // Printer
    let printer_bus_receiver = bus_sender.subscribe();
    thread::spawn(move || {
        let mut receiver = printer_bus_receiver;
        loop {
            match receiver.blocking_recv() {
                Ok(message) => print_message(&message),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Lookup worker
    if config.lookup.enabled {
        let mut lookup_worker = LookupWorker::new(
            bus_sender.subscribe(),
            bus_sender.clone(),
            Box::new(OEmbedTitleLookup::new(&config.lookup)),
        );
        thread::spawn(move || {
            let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                lookup_worker.run();
            }));
            if let Err(payload) = run_result {
                log::error!(
                    "LookupWorker thread terminated due to panic: {}",
                    panic_payload_to_string(payload.as_ref())
                );
            }
        });
    }

    // Ticker
    let ticker_bus_sender = bus_sender.clone();
    thread::spawn(move || loop {
        thread::sleep(TICK_INTERVAL);
        if ticker_bus_sender
            .send(Message::Session(SessionMessage::Tick))
            .is_err()
        {
            break;
        }
    });

    // Shell input
    let input_bus_sender = bus_sender.clone();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_command(&line, generation) {
                Ok(messages) => {
                    for message in messages {
                        let _ = input_bus_sender.send(message);
                    }
                }
                Err(err) => println!("[error] {}", err),
            }
        }
        let _ = input_bus_sender.send(Message::Session(SessionMessage::Unmount));
    });

    let capabilities = PlatformCapabilities::resolve(
        config.playback.requires_muted_autoplay,
        config.playback.user_agent.as_deref(),
    );
    let host = HeadlessPlayerHost::new(bus_sender.clone(), generation, HEADLESS_DURATION_SECONDS);
    let player = PlayerController::new(
        host,
        capabilities,
        Duration::from_millis(config.playback.debounce_ms),
        config.playback.restricted_error_codes.clone(),
    );
    let settings = SessionSettings {
        setlist_name: setlist_id.clone(),
        setlist_id,
        locale: config.display.locale,
        lookup_enabled: config.lookup.enabled,
    };
    let mut session = SetlistSession::new(
        bus_sender.subscribe(),
        bus_sender.clone(),
        Setlist::from_songs(catalog.clone()),
        player,
        DragReorderController::new(DragThresholds::from(&config.drag)),
        settings,
    )
    .with_store(Box::new(db_manager));

    if has_saved_rows {
        session.restore(&catalog)?;
    }
    session.mount(generation);
    session.player().host().announce_ready();
    session.run();

    info!("Application exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_args, parse_command, run_maintenance, ShellMode};
    use setlist_sync::db_manager::{DbManager, SetlistStore};
    use setlist_sync::protocol::{
        Message, PersistedEntry, PlaybackMessage, SessionMessage, SetlistMessage,
    };
    use std::path::PathBuf;
    use uuid::Uuid;

    #[test]
    fn test_move_command_expands_to_full_gesture() {
        let messages = parse_command("move 3 1", Uuid::new_v4()).expect("valid command");
        assert_eq!(messages.len(), 3);
        assert!(matches!(
            messages[0],
            Message::Setlist(SetlistMessage::PointerDown { index: 2, .. })
        ));
        assert!(matches!(
            messages[1],
            Message::Setlist(SetlistMessage::PointerMove {
                over_index: Some(0),
                ..
            })
        ));
        assert!(matches!(
            messages[2],
            Message::Setlist(SetlistMessage::PointerUp)
        ));
    }

    #[test]
    fn test_row_numbers_are_one_based() {
        let messages = parse_command("play 1", Uuid::new_v4()).expect("valid command");
        assert!(matches!(
            messages[0],
            Message::Playback(PlaybackMessage::TogglePlay(0))
        ));
        assert!(parse_command("play 0", Uuid::new_v4()).is_err());
        assert!(parse_command("remove", Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_simulated_player_events_carry_generation() {
        let generation = Uuid::new_v4();
        let messages = parse_command("error 150", generation).expect("valid command");
        assert!(matches!(
            messages[0],
            Message::Playback(PlaybackMessage::PlayerError { generation: g, code: 150 }) if g == generation
        ));
    }

    #[test]
    fn test_blank_and_unknown_input() {
        assert!(parse_command("   ", Uuid::new_v4())
            .expect("blank is fine")
            .is_empty());
        assert!(parse_command("dance", Uuid::new_v4()).is_err());
        assert!(matches!(
            parse_command("quit", Uuid::new_v4()).expect("valid")[0],
            Message::Session(SessionMessage::Unmount)
        ));
    }

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_parse_args_selects_mode() {
        assert_eq!(
            parse_args(args(&["songs.json"])),
            Ok(ShellMode::Run {
                catalog_path: PathBuf::from("songs.json"),
                setlist_id: "default".to_string(),
            })
        );
        assert_eq!(parse_args(args(&["--list"])), Ok(ShellMode::ListSetlists));
        assert_eq!(
            parse_args(args(&["--delete", "sunday"])),
            Ok(ShellMode::DeleteSetlist("sunday".to_string()))
        );
        assert!(parse_args(args(&["--delete"])).is_err());
        assert!(parse_args(args(&[])).is_err());
    }

    #[test]
    fn test_delete_mode_removes_saved_setlist() {
        let mut db = DbManager::new_in_memory().expect("in-memory db");
        let rows = vec![PersistedEntry {
            song_id: "a".to_string(),
            position: 0,
            selected_variant_key: "C".to_string(),
            selected_reference_url: String::new(),
        }];
        db.save_setlist("sunday", "Sunday", &rows).expect("save");
        db.save_setlist("monday", "Monday", &rows).expect("save");

        run_maintenance(ShellMode::DeleteSetlist("sunday".to_string()), &mut db)
            .expect("delete succeeds");
        let remaining = db.get_all_setlists().expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "monday");
        run_maintenance(ShellMode::ListSetlists, &mut db).expect("list succeeds");
    }
}
