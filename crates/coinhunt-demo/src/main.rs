//! Headless coinhunt match.
//!
//! Without flags a single player walks through a line of coins offline. With
//! `--host` the walk is played by a hosting player, which collects with
//! server authority. With `--join <address>` an idle in-process host is
//! started and a client joins it over the loopback transport to play the
//! walk, so the collection handshake and position sync can be watched in the
//! log.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p coinhunt-demo -- --host --log-level debug`.

use std::path::PathBuf;

use clap::Parser;
use coinhunt_config::{CliArgs, Config, default_config_dir};
use coinhunt_multiplayer::{GameNode, ReplicaKind};
use coinhunt_net::{LoopbackNetwork, LoopbackTransport};
use coinhunt_player::PlayerInputFrame;
use glam::{Vec2, Vec3};
use tracing::{info, warn};

const FRAME: f32 = 1.0 / 60.0;
const WALK_SECS: f32 = 4.0;
const SETTLE_SECS: f32 = 1.5;
const COINS: [Vec3; 3] = [
    Vec3::new(0.0, 0.0, 4.0),
    Vec3::new(0.0, 0.0, 8.0),
    Vec3::new(0.0, 0.0, 12.0),
];

fn coin_name(index: usize) -> String {
    format!("Coin_{index}")
}

fn spawn_coins(node: &mut GameNode<LoopbackTransport>) {
    for (i, position) in COINS.iter().enumerate() {
        node.spawn_coin(coin_name(i), *position);
    }
}

fn walk_frame(walking: bool) -> PlayerInputFrame {
    PlayerInputFrame {
        move_axis: if walking { Vec2::Y } else { Vec2::ZERO },
        ..PlayerInputFrame::default()
    }
}

fn remaining_coins(node: &GameNode<LoopbackTransport>) -> usize {
    (0..COINS.len())
        .filter(|i| node.coin(&coin_name(*i)).is_some())
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Offline,
    Host,
    Client,
}

impl Mode {
    fn from_args(args: &CliArgs) -> Self {
        if args.host {
            Mode::Host
        } else if args.join.is_some() {
            Mode::Client
        } else {
            Mode::Offline
        }
    }
}

fn walk(node: &mut GameNode<LoopbackTransport>) {
    let mut elapsed = 0.0;
    while elapsed < WALK_SECS + SETTLE_SECS {
        node.tick(FRAME, walk_frame(elapsed < WALK_SECS));
        elapsed += FRAME;
    }
}

fn run_offline(config: &Config) {
    let network = LoopbackNetwork::new();
    let mut solo = GameNode::new(config, network.endpoint(), ReplicaKind::Player);
    spawn_coins(&mut solo);
    walk(&mut solo);
    info!(
        position = ?solo.player().position(),
        facing = ?solo.facing(),
        state = %solo.player().state(),
        remaining = remaining_coins(&solo),
        "offline run finished"
    );
}

fn run_host(config: &Config, kind: ReplicaKind) {
    let network = LoopbackNetwork::new();
    let mut host = GameNode::new(config, network.endpoint(), kind);
    host.host_game(config.network.server_port);
    spawn_coins(&mut host);
    walk(&mut host);

    if !host.session().is_hosting() {
        warn!(port = config.network.server_port, "hosting failed");
    }
    info!(
        peers = host.session().peer_count(),
        position = ?host.player().position(),
        facing = ?host.facing(),
        remaining = remaining_coins(&host),
        "host run finished"
    );
    host.disconnect();
    host.tick(FRAME, PlayerInputFrame::default());
}

fn run_client(config: &Config, kind: ReplicaKind) {
    let network = LoopbackNetwork::new();
    let port = config.network.server_port;

    let mut host_config = config.clone();
    host_config.network.player_name = format!("{}_host", config.network.player_name);
    let mut host = GameNode::new(&host_config, network.endpoint(), kind);
    host.host_game(port);
    let mut client = GameNode::new(config, network.endpoint(), kind);
    client.join_game(config.network.server_address.clone(), port);

    spawn_coins(&mut host);
    spawn_coins(&mut client);

    let mut elapsed = 0.0;
    while elapsed < WALK_SECS + SETTLE_SECS {
        host.tick(FRAME, PlayerInputFrame::default());
        client.tick(FRAME, walk_frame(elapsed < WALK_SECS));
        elapsed += FRAME;
    }

    if !client.session().is_online() {
        warn!("client never came online");
    }
    info!(
        peers = host.session().peer_count(),
        host_remaining = remaining_coins(&host),
        client_remaining = remaining_coins(&client),
        client_position = ?client.player().position(),
        client_facing = ?client.facing(),
        "client run finished"
    );

    client.disconnect();
    host.tick(FRAME, PlayerInputFrame::default());
    client.tick(FRAME, PlayerInputFrame::default());
    host.disconnect();
    host.tick(FRAME, PlayerInputFrame::default());
    info!(peers = host.session().peer_count(), "session closed");
}

fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from(".coinhunt"));

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    coinhunt_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    info!(
        player = %config.network.player_name,
        port = config.network.server_port,
        "coinhunt demo starting"
    );

    match Mode::from_args(&args) {
        Mode::Offline => run_offline(&config),
        Mode::Host => run_host(&config, ReplicaKind::Player),
        Mode::Client => run_client(&config, ReplicaKind::Player),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(argv: &[&str]) -> Mode {
        Mode::from_args(&CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_flags_select_distinct_modes() {
        assert_eq!(mode(&["coinhunt"]), Mode::Offline);
        assert_eq!(mode(&["coinhunt", "--host"]), Mode::Host);
        assert_eq!(mode(&["coinhunt", "--join", "10.0.0.2"]), Mode::Client);
        assert_eq!(mode(&["coinhunt", "--port", "9100"]), Mode::Offline);
    }
}
