use super::Command;

/// Recorded command stream, submitted to a stream as a unit.
///
/// Performance characteristics:
/// - `append()` is O(1) amortized
/// - iteration is forward, in append order
///
/// A list is move-only. Passing it to `dispatch` moves every command to the
/// backend; dropping or clearing it releases the remaining commands once.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    /// Appends `cmd` at the tail.
    #[inline]
    pub fn append(&mut self, cmd: impl Into<Command>) -> &mut Self {
        self.commands.push(cmd.into());
        self
    }

    /// Returns commands in append order.
    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops every recorded command. Keeps allocated capacity for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Moves the recorded commands out, leaving the list empty.
    #[inline]
    pub fn drain(&mut self) -> std::vec::Drain<'_, Command> {
        self.commands.drain(..)
    }
}

impl From<Vec<Command>> for CommandList {
    #[inline]
    fn from(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

impl<C: Into<Command>> Extend<C> for CommandList {
    fn extend<I: IntoIterator<Item = C>>(&mut self, iter: I) {
        self.commands.extend(iter.into_iter().map(Into::into));
    }
}

impl<C: Into<Command>> FromIterator<C> for CommandList {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl IntoIterator for CommandList {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
