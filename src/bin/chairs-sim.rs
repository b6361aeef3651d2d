use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use chairs::config::Config;
use chairs::engine::Half;
use chairs::events::{self, EventBus, SeatEvent};
use chairs::logging;
use chairs::sim::{BlockState, SimWorld};
use chairs::{
    BlockPos, ClickAction, Dispatcher, Facing, HostEvent, Orientation, PlayerId, Pose, Position,
    SeatRegistry,
};

#[derive(Parser)]
#[command(name = "chairs-sim")]
#[command(about = "Run a scripted sitting scenario against an in-memory world")]
pub struct Args {
    /// Number of players, each given their own stair
    #[arg(short, long, default_value = "6")]
    players: u32,

    /// Enables debug logging (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Also write logs to the data directory
    #[arg(long)]
    log_file: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Tally of seat events seen on the bus
#[derive(Default)]
struct EventCounts {
    seated: AtomicU32,
    released: AtomicU32,
    discarded: AtomicU32,
    declined: AtomicU32,
}

async fn count_events(mut receiver: broadcast::Receiver<events::EventEnvelope>, counts: Arc<EventCounts>) {
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                events::log_event(&envelope);
                let counter = match envelope.event {
                    SeatEvent::Seated { .. } => &counts.seated,
                    SeatEvent::Released { .. } => &counts.released,
                    SeatEvent::Discarded { .. } => &counts.discarded,
                    SeatEvent::Declined { .. } => &counts.declined,
                };
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Event counter lagged, missed {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn right_click(player: PlayerId, block: BlockPos) -> HostEvent {
    HostEvent::Interact {
        player,
        block: Some(block),
        action: ClickAction::RightClickBlock,
        holding_item: false,
    }
}

/// One scripted step: change the world, or deliver an event about it
enum Step {
    ClearBlock(BlockPos),
    PushBlock(BlockPos, Facing),
    Event(HostEvent),
}

impl Step {
    fn apply(self, sim: &SimWorld) -> Option<HostEvent> {
        match self {
            Step::ClearBlock(pos) => {
                sim.clear_block(pos);
                None
            }
            Step::PushBlock(pos, direction) => {
                sim.shift_blocks(&[pos], direction);
                None
            }
            Step::Event(event) => Some(event),
        }
    }
}

/// Build the world and the script to run against it
fn scenario(sim: &SimWorld, players: u32) -> Vec<Step> {
    let mut seats = Vec::new();
    let mut ids = Vec::new();

    for i in 0..players as i32 {
        let seat = BlockPos::new(sim.world(), i * 3, 64, 0);
        sim.set_block(seat, BlockState::stairs(Facing::North, Half::Bottom));
        let standing = Pose::new(
            Position::new(sim.world(), seat.x as f64, 64.0, -1.0),
            Orientation::looking(Facing::South),
        );
        seats.push(seat);
        ids.push(sim.add_player(standing));
    }

    let mut script: Vec<Step> = ids
        .iter()
        .zip(&seats)
        .map(|(player, seat)| Step::Event(right_click(*player, *seat)))
        .collect();

    // Someone already sitting clicks again, and a latecomer finds every seat taken
    if let (Some(first), Some(seat)) = (ids.first(), seats.last()) {
        script.push(Step::Event(right_click(*first, *seat)));
        let latecomer = sim.add_player(Pose::new(
            Position::new(sim.world(), seat.x as f64, 64.0, -1.0),
            Orientation::default(),
        ));
        script.push(Step::Event(right_click(latecomer, *seat)));
    }

    if let Some(seat) = seats.get(1) {
        script.push(Step::ClearBlock(*seat));
        script.push(Step::Event(HostEvent::BlockRemoved { pos: *seat }));
    }
    if let Some(seat) = seats.get(2) {
        script.push(Step::PushBlock(*seat, Facing::East));
        script.push(Step::Event(HostEvent::BlocksMoved {
            positions: std::iter::once(*seat)
                .chain(seat.relative(Facing::East))
                .collect(),
        }));
    }
    if let Some(player) = ids.get(3) {
        script.push(Step::Event(HostEvent::PlayerDied { player: *player }));
    }
    if let Some(player) = ids.get(4) {
        script.push(Step::Event(HostEvent::ConnectionClosed { player: *player }));
    }

    script.push(Step::Event(HostEvent::Shutdown));
    script
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?;
    let level = match args.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _guard = logging::init_logging("chairs-sim", level, args.log_file || config.logging.file)?;

    info!("Starting chairs simulation with {} players", args.players);

    let (bus, receiver) = EventBus::new(config.event_capacity);
    let counts = Arc::new(EventCounts::default());
    let counter = tokio::spawn(count_events(receiver, counts.clone()));

    let sim = Arc::new(SimWorld::new());
    let script = scenario(&sim, args.players);
    let registry = Arc::new(SeatRegistry::new(config.seats.clone()).with_events(bus));
    let dispatcher = Dispatcher::new(registry.clone(), sim.clone());

    let seats = registry.config();
    info!(
        "Seats need tag {:?}, reach squared {}, mount offset {:?}",
        seats.tag, seats.reach_squared, seats.mount_offset
    );

    let mut handled = 0;
    for step in script {
        if let Some(event) = step.apply(&sim) {
            let outcome = dispatcher.handle(event);
            tracing::debug!("{:?}", outcome);
            handled += 1;
        }
    }

    // Dropping the last registry handle closes the bus and ends the counter
    let remaining = registry.len();
    drop(dispatcher);
    drop(registry);
    counter.await?;

    let teleports = sim.teleports();
    let sync_teleports = teleports
        .iter()
        .filter(|t| t.mode == chairs::engine::TeleportMode::Sync)
        .count();

    println!("Events handled:     {}", handled);
    println!("Sat down:           {}", counts.seated.load(Ordering::SeqCst));
    println!("Stood up:           {}", counts.released.load(Ordering::SeqCst));
    println!("Discarded:          {}", counts.discarded.load(Ordering::SeqCst));
    println!("Declined:           {}", counts.declined.load(Ordering::SeqCst));
    println!("Teleports:          {} ({} sync)", teleports.len(), sync_teleports);
    println!("Proxies spawned:    {}", sim.spawned_count());
    println!("Proxies left alive: {}", sim.live_actor_count());
    println!("Sessions left:      {}", remaining);

    Ok(())
}
