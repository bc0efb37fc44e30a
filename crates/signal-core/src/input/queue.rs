use crate::economy::upgrades::UpgradeId;

/// Player actions the loop understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameInput {
    /// One tap on the signal button.
    Tap,
    /// Buy one level of an upgrade.
    Buy(UpgradeId),
    /// Perform a Rite.
    Rite,
}

/// A queue of player actions.
/// JS pushes actions as they happen; the loop drains them on its next tick.
pub struct InputQueue {
    events: Vec<GameInput>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(32),
        }
    }

    pub fn push(&mut self, event: GameInput) {
        self.events.push(event);
    }

    /// Drain all pending actions. Returns a Vec and clears the queue.
    pub fn drain(&mut self) -> Vec<GameInput> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain() {
        let mut q = InputQueue::new();
        q.push(GameInput::Tap);
        q.push(GameInput::Buy(UpgradeId::Relay));
        assert_eq!(q.len(), 2);
        let events = q.drain();
        assert_eq!(events, vec![GameInput::Tap, GameInput::Buy(UpgradeId::Relay)]);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_preserves_order() {
        let mut q = InputQueue::new();
        q.push(GameInput::Rite);
        q.push(GameInput::Tap);
        assert_eq!(q.drain(), vec![GameInput::Rite, GameInput::Tap]);
    }
}
