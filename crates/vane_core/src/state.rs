//! Open set of state flags
//!
//! Any string is a valid state; presence is all that matters. The runtime
//! itself uses `init`, `render`, `disable` and `dispose`, widgets add their
//! own (`zoom`, `full`, ...).

use indexmap::IndexSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateSet {
    states: IndexSet<String>,
}

impl StateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    pub fn add(&mut self, state: &str) {
        if !self.states.contains(state) {
            self.states.insert(state.to_string());
        }
    }

    pub fn remove(&mut self, state: &str) {
        self.states.shift_remove(state);
    }

    /// Flip `state`, or force it on (`Some(true)`) or off (`Some(false)`)
    pub fn toggle(&mut self, state: &str, force: Option<bool>) {
        if force.unwrap_or_else(|| !self.is(state)) {
            self.add(state);
        } else {
            self.remove(state);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for StateSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = StateSet::new();
        for state in iter {
            set.add(state);
        }
        set
    }
}
