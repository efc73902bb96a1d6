use std::fmt;

use parking_lot::Mutex;

/// The two independently saved fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Title,
    Content,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Title => f.write_str("title"),
            Channel::Content => f.write_str("content"),
        }
    }
}

/// Snapshot of both dirty flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyState {
    pub title_dirty: bool,
    pub content_dirty: bool,
}

impl DirtyState {
    pub fn is_any(&self) -> bool {
        self.title_dirty || self.content_dirty
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Flag {
    dirty: bool,
    // Bumped on every mark, so a save can tell whether an edit arrived while it ran.
    revision: u64,
}

#[derive(Debug, Default)]
struct Flags {
    title: Flag,
    content: Flag,
}

impl Flags {
    fn get_mut(&mut self, channel: Channel) -> &mut Flag {
        match channel {
            Channel::Title => &mut self.title,
            Channel::Content => &mut self.content,
        }
    }
}

/// Tracks which fields have unsaved edits.
///
/// Both flags start clean. Only [`mark`](Self::mark) sets them; every save path clears its own
/// flag after the attempt and the close interceptor clears both before its flush.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    flags: Mutex<Flags>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `channel` dirty and returns its new revision.
    pub fn mark(&self, channel: Channel) -> u64 {
        let mut flags = self.flags.lock();
        let flag = flags.get_mut(channel);
        flag.dirty = true;
        flag.revision += 1;
        flag.revision
    }

    pub fn mark_title_dirty(&self) -> u64 {
        self.mark(Channel::Title)
    }

    pub fn mark_content_dirty(&self) -> u64 {
        self.mark(Channel::Content)
    }

    pub fn clear(&self, channel: Channel) {
        self.flags.lock().get_mut(channel).dirty = false;
    }

    pub fn clear_title_dirty(&self) {
        self.clear(Channel::Title)
    }

    pub fn clear_content_dirty(&self) {
        self.clear(Channel::Content)
    }

    /// Clears `channel` only if it has not been marked since `revision`.
    ///
    /// Returns whether `revision` is still the latest.
    pub fn clear_if_current(&self, channel: Channel, revision: u64) -> bool {
        let mut flags = self.flags.lock();
        let flag = flags.get_mut(channel);
        if flag.revision == revision {
            flag.dirty = false;
            true
        } else {
            false
        }
    }

    pub fn clear_all(&self) {
        let mut flags = self.flags.lock();
        flags.title.dirty = false;
        flags.content.dirty = false;
    }

    pub fn is_dirty(&self, channel: Channel) -> bool {
        self.flags.lock().get_mut(channel).dirty
    }

    pub fn is_any_dirty(&self) -> bool {
        self.state().is_any()
    }

    pub fn revision(&self, channel: Channel) -> u64 {
        self.flags.lock().get_mut(channel).revision
    }

    pub fn state(&self) -> DirtyState {
        let flags = self.flags.lock();
        DirtyState {
            title_dirty: flags.title.dirty,
            content_dirty: flags.content.dirty,
        }
    }
}
