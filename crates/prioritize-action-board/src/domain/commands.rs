//! Commands for the Action Board context.

use prioritize_core::event::Event;
use prioritize_core::listener::Destination;
use uuid::Uuid;

/// Marker trait for commands that can be dispatched.
pub trait Command: Send + Sync {
    /// Returns the command type identifier.
    fn command_type(&self) -> &'static str;

    /// Returns the correlation ID for tracing.
    fn correlation_id(&self) -> Uuid;
}

/// Command to create an action board.
#[derive(Debug, Clone)]
pub struct CreateActionBoard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Unique board name.
    pub name: String,
    /// Board description.
    pub description: String,
    /// The object owning the board.
    pub owner: Option<Destination>,
}

impl Command for CreateActionBoard {
    fn command_type(&self) -> &'static str {
        "action_board.create"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to change a board's name, description and owner.
#[derive(Debug, Clone)]
pub struct EditActionBoard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The board to edit.
    pub board_id: i64,
    /// New name.
    pub name: String,
    /// New description.
    pub description: String,
    /// New owner.
    pub owner: Option<Destination>,
}

impl Command for EditActionBoard {
    fn command_type(&self) -> &'static str {
        "action_board.edit"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a board together with its entries and subscribers.
#[derive(Debug, Clone)]
pub struct RemoveActionBoard {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The board to delete.
    pub board_id: i64,
}

impl Command for RemoveActionBoard {
    fn command_type(&self) -> &'static str {
        "action_board.remove"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to post an entry to a board.
#[derive(Debug, Clone)]
pub struct PostEntry {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The board to post to.
    pub board_id: i64,
    /// Entry headline.
    pub title: String,
    /// Entry body.
    pub message: String,
    /// The event that prompted the post.
    pub source: Option<Event>,
}

impl Command for PostEntry {
    fn command_type(&self) -> &'static str {
        "action_board.post_entry"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to delete a posted entry.
#[derive(Debug, Clone)]
pub struct RemoveEntry {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The entry to delete.
    pub entry_id: Uuid,
}

impl Command for RemoveEntry {
    fn command_type(&self) -> &'static str {
        "action_board.remove_entry"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to subscribe a destination to a board's new entries.
#[derive(Debug, Clone)]
pub struct AddSubscriber {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The board to watch.
    pub board_id: i64,
    /// Who gets notified.
    pub subscriber: Destination,
}

impl Command for AddSubscriber {
    fn command_type(&self) -> &'static str {
        "action_board.add_subscriber"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct RemoveSubscriber {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The board the subscription belongs to.
    pub board_id: i64,
    /// The listener created by the subscription.
    pub listener_id: Uuid,
}

impl Command for RemoveSubscriber {
    fn command_type(&self) -> &'static str {
        "action_board.remove_subscriber"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
