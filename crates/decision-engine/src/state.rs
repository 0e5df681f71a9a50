use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::Decision;

/// Latest decision, for read-only consumers such as the advisor.
///
/// The whole `Arc` is swapped on every evaluation, so a reader holds either
/// the previous decision or the new one.
#[derive(Debug, Default)]
pub struct EngineState {
    last: RwLock<Option<Arc<Decision>>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, decision: Arc<Decision>) {
        *self.last.write() = Some(decision);
    }

    pub fn latest(&self) -> Option<Arc<Decision>> {
        self.last.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    #[test]
    fn test_replace_swaps_whole_value() {
        let state = EngineState::new();
        assert!(state.latest().is_none());

        state.replace(Arc::new(Decision::hold("first", 0.0)));
        let held = state.latest().unwrap();

        state.replace(Arc::new(Decision::buy(Side::Yes, 0.7, "second")));
        assert_eq!(held.reasoning(), "first");
        assert_eq!(state.latest().unwrap().reasoning(), "second");
    }
}
