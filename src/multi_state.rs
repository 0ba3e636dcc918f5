//! Flag engine that fires one-shot actions once a combination of flags has been reached.
//!
//! Registrations carry plain values (usually an action enum) rather than closures. Mutations
//! return the actions that fired, in order, and the owner runs them before doing anything else.
//! Running an action may set more flags, which fires further actions depth-first.

use std::fmt;

use bitflags::Flags;

pub struct MultiStateCallback<F, A> {
    state: F,
    registrations: Vec<(F, A)>,
    change_listeners: Vec<(F, fn(bool) -> A)>,
}

impl<F: Flags + Copy, A> MultiStateCallback<F, A> {
    pub fn new() -> Self {
        Self {
            state: F::empty(),
            registrations: Vec::new(),
            change_listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> F {
        self.state
    }

    /// Whether any flag of `mask` is set.
    pub fn has_state(&self, mask: F) -> bool {
        self.state.intersects(mask)
    }

    /// Whether every flag of `mask` is set.
    pub fn has_states(&self, mask: F) -> bool {
        self.state.contains(mask)
    }

    /// Adds `flags` and returns the actions whose masks are now fully covered.
    pub fn set_state(&mut self, flags: F) -> Vec<A> {
        let old = self.state;
        self.state = old.union(flags);

        let mut fired = Vec::new();
        let mut i = 0;
        while i < self.registrations.len() {
            if self.state.contains(self.registrations[i].0) {
                fired.push(self.registrations.remove(i).1);
            } else {
                i += 1;
            }
        }

        self.notify_change_listeners(old, &mut fired);
        fired
    }

    /// Removes `flags`. Only change listeners can fire from this.
    pub fn clear_state(&mut self, flags: F) -> Vec<A> {
        let old = self.state;
        self.state = old.difference(flags);

        let mut fired = Vec::new();
        self.notify_change_listeners(old, &mut fired);
        fired
    }

    /// Registers `action` to fire once `mask` is reached.
    ///
    /// Returns the action right away, without registering it, if `mask` is already reached.
    #[must_use]
    pub fn run_once_at_state(&mut self, mask: F, action: A) -> Option<A> {
        if self.state.contains(mask) {
            return Some(action);
        }
        self.registrations.push((mask, action));
        None
    }

    /// Reports every edge of "`mask` fully reached" through `action`.
    pub fn add_change_listener(&mut self, mask: F, action: fn(bool) -> A) {
        self.change_listeners.push((mask, action));
    }

    pub fn pending_registrations(&self) -> usize {
        self.registrations.len()
    }

    fn notify_change_listeners(&self, old: F, fired: &mut Vec<A>) {
        for (mask, action) in &self.change_listeners {
            let was_on = old.contains(*mask);
            let is_on = self.state.contains(*mask);
            if was_on != is_on {
                fired.push(action(is_on));
            }
        }
    }
}

impl<F: Flags + Copy, A> Default for MultiStateCallback<F, A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists the names of the set flags, `|`-separated.
pub struct FlagNames<F>(pub F);

impl<F: Flags> fmt::Display for FlagNames<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, _) in self.0.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            f.write_str("(none)")?;
        }
        Ok(())
    }
}

impl<F: Flags + Copy, A> fmt::Debug for MultiStateCallback<F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiStateCallback")
            .field("state", &FlagNames(self.state).to_string())
            .field("registrations", &self.registrations.len())
            .field("change_listeners", &self.change_listeners.len())
            .finish()
    }
}
