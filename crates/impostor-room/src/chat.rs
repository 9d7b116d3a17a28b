//! Player chat.

use impostor_protocol::{PlayerId, RoomCode};

use crate::{ChatMessage, MessageKind, RoomError, RoomStore};

impl RoomStore {
    /// Appends a chat line from `author`, who must be an active player.
    ///
    /// The log is a ring buffer; a full log silently drops its oldest entry.
    pub fn add_message(
        &mut self,
        code: &RoomCode,
        author: PlayerId,
        content: impl Into<String>,
    ) -> Result<&ChatMessage, RoomError> {
        let room = self.room_mut(code)?;
        let nickname = room.require_active(author)?.nickname().to_string();
        room.touch();
        Ok(room
            .messages
            .push(Some((author, &nickname)), content, MessageKind::Chat))
    }
}
