mod bot;
mod frequency_regulator;
mod term_render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use battle_sync::store::DEFAULT_PREFIX;
use battle_sync::{
    unix_now, BattleSession, CoreEvent, GameConfig, HttpStore, MatchStore, MemoryStore, Phase,
    Role, RoomId, SessionExt, SyncClient, SyncConfig, WireGrid, ZenohStore,
};
use clap::{Parser, ValueEnum};
use console::{Key, Term};
use zenoh::key_expr::KeyExpr;

use crate::bot::Bot;
use crate::frequency_regulator::FrequencyRegulator;
use crate::term_render::{AnsiTermStyle, DuelField, PlainTermStyle, TermRender, TermStyle, WellField};

const TICK_MS: u64 = 16;
const RENDER_INTERVAL: Duration = Duration::from_millis(50);
const LOG_LINES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Both players in this process
    Memory,
    /// Firebase Realtime Database REST API
    Http,
    /// Room document served over zenoh
    Zenoh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    P1,
    P2,
    Auto,
}

/// z_battle - falling-block battle between two bots over a shared room document
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Where the room document lives
    #[arg(short, long, value_enum, default_value_t = StoreKind::Memory)]
    store: StoreKind,

    /// Room name (generated if omitted)
    #[arg(short, long)]
    room: Option<String>,

    /// Slot to take in the room
    #[arg(long, value_enum, default_value_t = RoleArg::Auto)]
    role: RoleArg,

    /// Database URL for the http store
    #[arg(long)]
    url: Option<String>,

    /// Auth token for the http store
    #[arg(long)]
    auth: Option<String>,

    /// Key expression prefix for the zenoh store
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Path to Zenoh config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve the room document from this process (zenoh store)
    #[arg(long)]
    host_room: bool,

    /// Rounds in the series
    #[arg(long, default_value_t = 3)]
    best_of: u32,

    /// Seed of the piece generator
    #[arg(long)]
    seed: Option<u64>,

    /// Delay between two bot inputs
    #[arg(long, default_value_t = 120)]
    bot_delay_ms: u64,

    /// Render without colours
    #[arg(long)]
    plain: bool,
}

/// A session with the bot that drives it and a short event log
struct Player {
    session: BattleSession,
    bot: Bot,
    log: Vec<String>,
}

impl Player {
    fn new(session: BattleSession, bot_delay_ms: u64) -> Self {
        Player {
            session,
            bot: Bot::new(FrequencyRegulator::every(bot_delay_ms, TICK_MS)),
            log: Vec::new(),
        }
    }

    fn step(&mut self, now: f64, dt: f32) {
        for input in self.bot.next_inputs(&self.session) {
            let events = self.session.handle_input(input);
            self.note(events);
        }
        let events = self.session.tick(now, dt);
        self.note(events);
    }

    fn note(&mut self, events: Vec<CoreEvent>) {
        let role = self.session.sync().role();
        for event in events {
            tracing::debug!("Player '{}' event: {:?}", role, event);
            let line = match event {
                CoreEvent::LineCleared(clear) => format!("cleared {} line(s)", clear.count),
                CoreEvent::HazardEliminated(hit) => format!("stomp at {},{}", hit.x, hit.y),
                CoreEvent::GarbageReceived { lines } => format!("took {} garbage", lines),
                CoreEvent::CountdownStarted { .. } => "countdown".to_string(),
                CoreEvent::RoundStarted { round } => format!("round {} started", round),
                CoreEvent::RoundLost => "round lost".to_string(),
                CoreEvent::RoundWon => "round won".to_string(),
                CoreEvent::BackToLobby => "back to lobby".to_string(),
                CoreEvent::MatchOver { winner } => format!("match over, {} wins", winner),
            };
            self.log.push(line);
        }
        if self.log.len() > LOG_LINES {
            let excess = self.log.len() - LOG_LINES;
            self.log.drain(..excess);
        }
    }

    fn status(&self, room: &RoomId, now: f64) -> Vec<String> {
        let session = &self.session;
        let sync = session.sync();
        let coordinator = session.coordinator();
        let (p1_wins, p2_wins) = sync
            .view()
            .doc()
            .map(|doc| (doc.p1.match_wins, doc.p2.match_wins))
            .unwrap_or((0, 0));
        let stats = sync.stats();

        let mut lines = vec![
            format!("room  {}", room),
            format!("you   {}", sync.role()),
            format!("phase {}", session.phase()),
            format!("round {} / bo{}", coordinator.round(), coordinator.best_of()),
            format!("wins  p1 {} - {} p2", p1_wins, p2_wins),
            format!("score {}", session.score()),
            format!("stomp {}", session.stomps()),
            format!("sent  {}", sync.sent_total()),
            format!("push  {}/{}", stats.pushes, stats.push_failures),
            format!("pull  {}/{}", stats.pulls, stats.pull_failures),
        ];
        if sync.is_stale(now) {
            lines.push("opponent view stale".to_string());
        }
        lines.push(String::new());
        lines.extend(self.log.iter().cloned());
        lines
    }

    fn banner(&self, now: f64) -> Option<String> {
        let coordinator = self.session.coordinator();
        match self.session.phase() {
            Phase::Waiting if self.session.is_ready() => Some("READY".to_string()),
            Phase::Waiting => Some("WAITING".to_string()),
            Phase::Countdown => coordinator
                .countdown_remaining(now)
                .map(|left| format!("{}", left.ceil() as u32)),
            Phase::Playing => None,
            Phase::RoundOver => Some("ROUND OVER".to_string()),
            Phase::MatchOver if coordinator.match_winner() == Some(coordinator.role()) => {
                Some("YOU WIN".to_string())
            }
            Phase::MatchOver => Some("YOU LOSE".to_string()),
        }
    }

    fn opponent_banner(&self) -> Option<String> {
        let opponent = self.session.sync().role().opponent();
        let doc = self.session.sync().view().doc()?;
        let player = doc.player(opponent);
        if !player.joined {
            Some("EMPTY".to_string())
        } else if player.lost {
            Some("LOST".to_string())
        } else {
            None
        }
    }

    fn field(&self, room: &RoomId, now: f64) -> DuelField {
        let session = &self.session;
        let hazards = session
            .hazards()
            .actors()
            .iter()
            .map(|actor| actor.cell())
            .collect();
        let player = WellField::new(WireGrid::from_board(session.board()), "YOU")
            .with_hazards(hazards)
            .with_banner(self.banner(now));
        let opponent = WellField::new(session.sync().view().opponent_grid().clone(), "OPPONENT")
            .with_banner(self.opponent_banner());
        DuelField::new(player, opponent, self.status(room, now))
    }
}

async fn open_zenoh(config: Option<PathBuf>) -> anyhow::Result<zenoh::Session> {
    // Create zenoh config
    let zenoh_config = if let Some(config_path) = config {
        zenoh::Config::from_file(config_path)
            .map_err(|e| anyhow!("Failed to load config file: {}", e))?
    } else {
        zenoh::Config::default()
    };

    zenoh::open(zenoh_config)
        .await
        .map_err(|e| anyhow!("Failed to open zenoh session: {}", e))
}

async fn join(
    role: RoleArg,
    store: Arc<dyn MatchStore>,
    config: &SyncConfig,
    now: f64,
) -> anyhow::Result<SyncClient> {
    let role = match role {
        RoleArg::Auto => return Ok(SyncClient::join_auto(store, config.clone(), now).await?),
        RoleArg::P1 => Role::P1,
        RoleArg::P2 => Role::P2,
    };
    let mut client = SyncClient::new(role, store, config.clone());
    client.join(now).await?;
    Ok(client)
}

fn render(term: &Term, field: &DuelField, style: &impl TermStyle) -> anyhow::Result<()> {
    term.move_cursor_to(0, 0)?;
    for line in field.render(style) {
        term.write_line(&line)?;
    }
    term.flush()?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Logs go to stderr, the board owns stdout
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let sync_config = SyncConfig::default().with_best_of(args.best_of);
    let room = match &args.room {
        Some(name) => RoomId::from_name(name.as_str())?,
        None => RoomId::generate(),
    };
    let timeout = Duration::from_millis(sync_config.request_timeout_ms);

    let store: Arc<dyn MatchStore> = match args.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Http => {
            let url = args
                .url
                .clone()
                .context("--url is required with --store http")?;
            Arc::new(HttpStore::new(url, room.clone(), timeout)?.with_auth(args.auth.clone()))
        }
        StoreKind::Zenoh => {
            let session = open_zenoh(args.config.clone()).await?;
            let prefix = match args.prefix.clone() {
                Some(prefix) => prefix,
                None => KeyExpr::try_from(DEFAULT_PREFIX).map_err(|e| anyhow!("{}", e))?,
            };
            if args.host_room {
                let host = session
                    .declare_room_host(room.clone())
                    .prefix(prefix.clone())
                    .await?;
                tokio::spawn(async move {
                    if let Err(e) = host.serve().await {
                        tracing::warn!("Room host stopped: {}", e);
                    }
                });
            }
            Arc::new(ZenohStore::new(session, prefix, &room, timeout)?)
        }
    };

    let game_config = match args.seed {
        Some(seed) => GameConfig::default().with_seed(seed),
        None => GameConfig::default(),
    };

    let now = unix_now();
    let mut players = Vec::new();
    if args.store == StoreKind::Memory {
        // local duel: this process plays both slots
        for (role, seed_offset) in [(RoleArg::P1, 0), (RoleArg::P2, 1)] {
            let client = join(role, store.clone(), &sync_config, now).await?;
            let mut config = game_config.clone();
            if let Some(seed) = config.seed {
                config.seed = Some(seed.wrapping_add(seed_offset));
            }
            players.push(Player::new(BattleSession::new(client, config), args.bot_delay_ms));
        }
    } else {
        let client = join(args.role, store.clone(), &sync_config, now).await?;
        players.push(Player::new(
            BattleSession::new(client, game_config),
            args.bot_delay_ms,
        ));
    }

    println!("=== z_battle ===");
    println!("Room: {}", room);
    println!("Store: {:?}", args.store);
    for player in &players {
        println!("Playing as {}", player.session.sync().role());
    }
    println!("Press q to quit");

    // Keyboard thread with separate term; left detached since read_key blocks
    let (quit_tx, quit_rx) = flume::bounded::<()>(1);
    std::thread::spawn(move || {
        let input_term = Term::stdout();
        while let Ok(key) = input_term.read_key() {
            if matches!(key, Key::Char('q') | Key::Char('Q') | Key::Escape) {
                let _ = quit_tx.send(());
                break;
            }
        }
    });

    // Create rendering terminal (separate from input)
    let render_term = Term::stdout();
    render_term.clear_screen()?;
    let mut last_render = Instant::now();
    let mut last_tick = unix_now();
    let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Ok(()) = quit_rx.recv_async() => break,
            _ = interval.tick() => {}
        }
        let now = unix_now();
        let dt = (now - last_tick).max(0.0) as f32;
        last_tick = now;
        for player in &mut players {
            player.step(now, dt);
        }

        if last_render.elapsed() >= RENDER_INTERVAL {
            let field = players[0].field(&room, now);
            if args.plain {
                render(&render_term, &field, &PlainTermStyle)?;
            } else {
                render(&render_term, &field, &AnsiTermStyle)?;
            }
            last_render = Instant::now();
        }

        if players.iter().all(|p| p.session.phase() == Phase::MatchOver) {
            break;
        }
    }

    for player in &mut players {
        if let Some(winner) = player.session.coordinator().match_winner() {
            println!("{}: winner {}", player.session.sync().role(), winner);
        }
        if let Err(e) = player.session.leave().await {
            tracing::warn!("Failed to leave room {}: {}", room, e);
        }
    }

    println!("Game Over!");
    Ok(())
}
