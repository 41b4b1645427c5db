use super::{EvalChain, Slot, Step};

/// Runs each step as soon as it is added
///
/// No change streams are started.
#[derive(Debug)]
pub struct GetChain {
    state: Slot,
}

impl GetChain {
    pub fn new() -> Self {
        Self {
            state: Slot::initial(),
        }
    }
}

impl Default for GetChain {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalChain for GetChain {
    type Output = String;

    fn then(&mut self, step: Step) {
        self.state = step.run(&self.state, false).0;
    }

    fn break_on_non_null(&mut self) -> bool {
        self.state.rendered().is_some()
    }

    fn finish(self) -> String {
        match self.state {
            Slot::Rendered(Some(text)) => text,
            _ => String::new(),
        }
    }
}
