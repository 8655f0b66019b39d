use strum_macros::{Display, EnumDiscriminants, EnumIter};

/// A single flight command, created per intent and consumed by the gate right away.
///
/// `Move` carries normalized stick deflections in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Display, EnumDiscriminants)]
#[strum_discriminants(name(CommandKind))]
#[strum_discriminants(derive(EnumIter, Display, Hash))]
pub enum Command {
    TakeOff,
    Land,
    Emergency,
    FlatTrim,
    EnterHover,
    LeaveHover,
    ChangeCamera,
    Move { roll: f32, pitch: f32, yaw: f32, gaz: f32 },
}

impl Command {
    /// A `Move` with every axis centered.
    pub const NEUTRAL_MOVE: Command = Command::Move { roll: 0.0, pitch: 0.0, yaw: 0.0, gaz: 0.0 };

    pub fn kind(&self) -> CommandKind { CommandKind::from(self) }

    /// Stick commands are sent every control tick and are too noisy for the command trace.
    pub fn is_continuous(&self) -> bool { matches!(self, Command::Move { .. }) }
}

impl CommandKind {
    /// A representative command of this kind, used to probe the gate.
    pub fn sample(self) -> Command {
        match self {
            CommandKind::TakeOff => Command::TakeOff,
            CommandKind::Land => Command::Land,
            CommandKind::Emergency => Command::Emergency,
            CommandKind::FlatTrim => Command::FlatTrim,
            CommandKind::EnterHover => Command::EnterHover,
            CommandKind::LeaveHover => Command::LeaveHover,
            CommandKind::ChangeCamera => Command::ChangeCamera,
            CommandKind::Move => Command::NEUTRAL_MOVE,
        }
    }
}
