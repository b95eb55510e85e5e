// src/ui.rs
//! The two on-screen controls and the application flags they drive.
//!
//! Button presses are plain state flips with a label change. Hosts that receive input on another
//! thread post `UiEvent`s through the channel handed out by the frame loop; the loop drains it at
//! the start of each tick, so the flags have a single owner.

use crossbeam::channel::{unbounded, Receiver, Sender};

pub const PLACE_LABEL: &str = "Confirm Place";
pub const RESET_PLACE_LABEL: &str = "Reset Place";
pub const START_LABEL: &str = "Start";
pub const STOP_LABEL: &str = "Stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// Place / confirm / reset the anchor.
    TogglePlacement,
    /// Start / stop dropping shapes.
    ToggleSpawning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub label: &'static str,
    pub visible: bool,
}

/// Application flags plus the state of both buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPanel {
    anchor_placed: bool,
    spawning_active: bool,
    placement: Button,
    spawn: Button,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            anchor_placed: false,
            spawning_active: false,
            placement: Button { label: PLACE_LABEL, visible: true },
            spawn: Button { label: START_LABEL, visible: false },
        }
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_placed(&self) -> bool {
        self.anchor_placed
    }

    pub fn spawning_active(&self) -> bool {
        self.spawning_active
    }

    pub fn placement_button(&self) -> Button {
        self.placement
    }

    pub fn spawn_button(&self) -> Button {
        self.spawn
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::TogglePlacement => self.toggle_placement(),
            UiEvent::ToggleSpawning => {
                self.toggle_spawning();
            }
        }
    }

    pub fn toggle_placement(&mut self) {
        if self.anchor_placed {
            self.anchor_placed = false;
            self.spawn.visible = false;
            self.placement.label = PLACE_LABEL;
            log::debug!("Anchor released");
        } else {
            self.anchor_placed = true;
            self.spawn.visible = true;
            self.placement.label = RESET_PLACE_LABEL;
            log::debug!("Anchor placed");
        }
    }

    /// Flips spawning. A hidden button cannot be pressed; returns whether the press landed.
    pub fn toggle_spawning(&mut self) -> bool {
        if !self.spawn.visible {
            log::debug!("Ignoring start/stop while the button is hidden");
            return false;
        }
        self.spawning_active = !self.spawning_active;
        self.spawn.label = if self.spawning_active { STOP_LABEL } else { START_LABEL };
        log::debug!("Spawning {}", if self.spawning_active { "started" } else { "stopped" });
        true
    }

    /// Per-tick state while the anchor is not placed.
    pub fn enforce_unplaced(&mut self) {
        self.spawn.visible = false;
        self.spawning_active = false;
        self.spawn.label = START_LABEL;
    }

    /// Per-tick state once the anchor is placed.
    pub fn show_spawn_control(&mut self) {
        self.spawn.visible = true;
    }
}

/// Single-owner inbox for button presses.
#[derive(Debug)]
pub struct UiInbox {
    tx: Sender<UiEvent>,
    rx: Receiver<UiEvent>,
}

impl Default for UiInbox {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl UiInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle hosts can clone and send from anywhere.
    pub fn sender(&self) -> Sender<UiEvent> {
        self.tx.clone()
    }

    /// Applies every pending event in arrival order. Returns how many were applied.
    pub fn drain_into(&self, panel: &mut ControlPanel) -> usize {
        let mut applied = 0;
        for event in self.rx.try_iter() {
            panel.apply(event);
            applied += 1;
        }
        applied
    }
}
