// Thin adapter between the host's event feed and the seat registry.
// One arm per trigger; the registry never sees host events directly.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::engine::{ActorHandle, BlockProbe, Engine, PlayerId};
use crate::geometry::BlockPos;
use crate::registry::{DeclineReason, SeatRegistry, Session, SitOutcome};

/// How a player clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickAction {
    LeftClickAir,
    LeftClickBlock,
    RightClickAir,
    RightClickBlock,
    /// Stepping on a pressure plate and the like
    Physical,
}

/// Events the host delivers
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Interact {
        player: PlayerId,
        block: Option<BlockPos>,
        action: ClickAction,
        holding_item: bool,
    },
    BlockRemoved {
        pos: BlockPos,
    },
    /// A mechanism (piston push or pull) moved these blocks
    BlocksMoved {
        positions: Vec<BlockPos>,
    },
    /// The engine took a rider off its vehicle
    RiderUnmounted {
        rider: PlayerId,
        vehicle: ActorHandle,
    },
    PlayerDied {
        player: PlayerId,
    },
    ConnectionClosed {
        player: PlayerId,
    },
    Shutdown,
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Seated(Session),
    Declined(DeclineReason),
    Released(Vec<PlayerId>),
    Discarded(PlayerId),
    Drained(usize),
    /// Not relevant to seats
    Ignored,
}

pub struct Dispatcher<E: Engine + BlockProbe> {
    registry: Arc<SeatRegistry>,
    engine: Arc<E>,
}

impl<E: Engine + BlockProbe> Dispatcher<E> {
    pub fn new(registry: Arc<SeatRegistry>, engine: Arc<E>) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &SeatRegistry {
        &self.registry
    }

    pub fn handle(&self, event: HostEvent) -> Handled {
        let engine = self.engine.as_ref();
        match event {
            HostEvent::Interact {
                player,
                block,
                action,
                holding_item,
            } => {
                // Only an empty-handed right click on a block is a sit request
                let Some(block) = block else {
                    return Handled::Ignored;
                };
                if action != ClickAction::RightClickBlock || holding_item {
                    return Handled::Ignored;
                }
                let Some(pose) = engine.current_pose(player) else {
                    debug!("Interact from unknown player {}", player);
                    return Handled::Ignored;
                };

                match self.registry.try_sit(engine, engine, block, player, pose) {
                    SitOutcome::Seated(session) => Handled::Seated(session),
                    SitOutcome::Declined(reason) => Handled::Declined(reason),
                }
            }
            HostEvent::BlockRemoved { pos } => self.release_affected([pos]),
            HostEvent::BlocksMoved { positions } => self.release_affected(positions),
            HostEvent::RiderUnmounted { rider, vehicle } => {
                if !self.registry.is_proxy(&vehicle) {
                    return Handled::Ignored;
                }
                // The proxy decides whose session ends, whoever the host named as rider
                match self.registry.release_proxy(engine, vehicle, false) {
                    Some(occupant) => {
                        if occupant != rider {
                            debug!("Proxy {} unmounted {} but was held by {}", vehicle, rider, occupant);
                        }
                        Handled::Released(vec![occupant])
                    }
                    None => Handled::Ignored,
                }
            }
            HostEvent::PlayerDied { player } => {
                if self.registry.discard(engine, player) {
                    Handled::Discarded(player)
                } else {
                    Handled::Ignored
                }
            }
            HostEvent::ConnectionClosed { player } => {
                if self.registry.release(engine, player, true) {
                    Handled::Released(vec![player])
                } else {
                    Handled::Ignored
                }
            }
            HostEvent::Shutdown => Handled::Drained(self.registry.shutdown(engine)),
        }
    }

    fn release_affected<I: IntoIterator<Item = BlockPos>>(&self, positions: I) -> Handled {
        let engine = self.engine.as_ref();
        let released: Vec<PlayerId> = self
            .registry
            .occupants_affected_by_positions(engine, positions)
            .into_iter()
            .filter(|player| self.registry.release(engine, *player, false))
            .collect();

        if released.is_empty() {
            Handled::Ignored
        } else {
            Handled::Released(released)
        }
    }

    /// Handle events until the feed closes or a shutdown arrives. Returns the
    /// number of events handled.
    pub async fn run(&self, mut events: UnboundedReceiver<HostEvent>) -> usize {
        let mut handled = 0;
        while let Some(event) = events.recv().await {
            let shutdown = event == HostEvent::Shutdown;
            let outcome = self.handle(event);
            debug!("Dispatched event: {:?}", outcome);
            handled += 1;
            if shutdown {
                info!("Shutdown received, dispatcher stopping");
                break;
            }
        }
        handled
    }
}
