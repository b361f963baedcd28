use std::fmt;

/// Canonical presence signal handed to notifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Home,
    NotHome,
}

impl Signal {
    /// Wire representation of the signal
    pub const fn as_str(self) -> &'static str {
        match self {
            Signal::Home => "home",
            Signal::NotHome => "not_home",
        }
    }

    pub const fn is_present(self) -> bool {
        matches!(self, Signal::Home)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for Signal {
    fn from(presence: bool) -> Self {
        translate(presence)
    }
}

/// Map a presence outcome to its signal.
pub const fn translate(presence: bool) -> Signal {
    if presence { Signal::Home } else { Signal::NotHome }
}
