//! Pointer event types and the accumulated interaction sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An input event delivered to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    /// Pointer movement
    Move,
    /// Click at client coordinates
    Click { x: i32, y: i32 },
    /// Scroll of the page
    Scroll,
}

impl PointerEvent {
    /// The observation kind this event belongs to.
    pub fn kind(&self) -> InteractionKind {
        match self {
            PointerEvent::Move => InteractionKind::Movement,
            PointerEvent::Click { .. } => InteractionKind::Clicks,
            PointerEvent::Scroll => InteractionKind::Scroll,
        }
    }
}

/// The kinds of observation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Movement,
    Clicks,
    Scroll,
}

impl InteractionKind {
    pub const ALL: [InteractionKind; 3] = [
        InteractionKind::Movement,
        InteractionKind::Clicks,
        InteractionKind::Scroll,
    ];
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionKind::Movement => write!(f, "movement"),
            InteractionKind::Clicks => write!(f, "clicks"),
            InteractionKind::Scroll => write!(f, "scroll"),
        }
    }
}

/// A recorded click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub x: i32,
    pub y: i32,
    /// Epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}

/// Interaction accumulated over the observation windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSample {
    /// Pointer movement events observed
    pub mouse_movement: u32,
    /// Clicks in arrival order
    pub click_pattern: Vec<ClickRecord>,
    /// Scroll events observed
    pub scroll_behavior: u32,
    /// When observation started
    pub interaction_time: DateTime<Utc>,
}

impl InteractionSample {
    pub fn empty(started: DateTime<Utc>) -> Self {
        Self {
            mouse_movement: 0,
            click_pattern: Vec::new(),
            scroll_behavior: 0,
            interaction_time: started,
        }
    }

    /// Record one event at the given instant.
    pub fn record(&mut self, event: PointerEvent, at: DateTime<Utc>) {
        match event {
            PointerEvent::Move => self.mouse_movement += 1,
            PointerEvent::Click { x, y } => self.click_pattern.push(ClickRecord { x, y, time: at }),
            PointerEvent::Scroll => self.scroll_behavior += 1,
        }
    }

    /// Fold another window's sample into this one.
    pub fn merge(&mut self, other: InteractionSample) {
        self.mouse_movement += other.mouse_movement;
        self.scroll_behavior += other.scroll_behavior;
        self.click_pattern.extend(other.click_pattern);
        self.click_pattern.sort_by_key(|c| c.time);
        self.interaction_time = self.interaction_time.min(other.interaction_time);
    }

    pub fn event_count(&self) -> usize {
        self.mouse_movement as usize + self.click_pattern.len() + self.scroll_behavior as usize
    }
}
