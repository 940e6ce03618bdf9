//! Fixed rules of the game and default tuning knobs.

/// Copies of each role in the deck.
pub const ROLE_COPIES: usize = 3;

/// Total roles in circulation across deck, hands, and exchange buffer.
pub const DECK_SIZE: usize = 15;

/// Influence cards dealt to each seat.
pub const CARDS_PER_PLAYER: usize = 2;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 6;

pub const STARTING_COINS: u32 = 2;

pub const INCOME_AMOUNT: u32 = 1;
pub const FOREIGN_AID_AMOUNT: u32 = 2;
pub const TAX_AMOUNT: u32 = 3;
/// Upper bound on a steal; a poorer target loses only what they have.
pub const STEAL_AMOUNT: u32 = 2;

pub const ASSASSINATE_COST: u32 = 3;
pub const COUP_COST: u32 = 7;

/// Cards drawn from the deck when an exchange opens.
pub const EXCHANGE_DRAWS: usize = 2;

/// Seconds the obligated player has to choose an action, settle a loss, or
/// finish an exchange before the table removes their seat.
pub const ACTION_WINDOW_SECS: i64 = 60;

/// Seconds the table has to challenge or block before the open question
/// resolves as an implicit unanimous pass.
pub const REACTION_WINDOW_SECS: i64 = 30;

/// Bounded history kept on the session record.
pub const LOG_CAPACITY: usize = 100;
