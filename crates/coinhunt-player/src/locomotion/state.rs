//! Leaf states and the handler layers above them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A concrete (leaf) locomotion state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StateId {
    /// Waiting for `Enable`.
    #[default]
    Disabled,
    /// Terminal. Accepts no input.
    Dead,
    /// Grounded, not moving.
    Idle,
    /// Grounded, moving.
    Moving,
    /// Grounded, moving with sprint held.
    Sprinting,
    /// Crouched, not moving.
    CrouchIdle,
    /// Crouched, moving.
    CrouchMoving,
    /// Grounded dash in progress.
    Dashing,
    /// Rising after a jump.
    Jumping,
    /// Descending.
    Falling,
    /// Left the floor without jumping, still rising.
    Liftoff,
}

/// A handler layer. Every leaf is also a layer; the abstract layers only
/// carry shared behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Alive,
    Grounded,
    Crouching,
    Airborne,
    Disabled,
    Dead,
    Idle,
    Moving,
    Sprinting,
    CrouchIdle,
    CrouchMoving,
    Dashing,
    Jumping,
    Falling,
    Liftoff,
}

impl StateId {
    /// Handler layers from the leaf up to the root. Input dispatch walks this
    /// slice in order and stops at the first layer that declares the input.
    pub fn lineage(self) -> &'static [Layer] {
        use Layer as L;
        match self {
            StateId::Disabled => &[L::Disabled],
            StateId::Dead => &[L::Dead],
            StateId::Idle => &[L::Idle, L::Grounded, L::Alive],
            StateId::Moving => &[L::Moving, L::Grounded, L::Alive],
            StateId::Sprinting => &[L::Sprinting, L::Moving, L::Grounded, L::Alive],
            StateId::CrouchIdle => &[L::CrouchIdle, L::Crouching, L::Grounded, L::Alive],
            StateId::CrouchMoving => &[L::CrouchMoving, L::Crouching, L::Grounded, L::Alive],
            StateId::Dashing => &[L::Dashing, L::Grounded, L::Alive],
            StateId::Jumping => &[L::Jumping, L::Airborne, L::Alive],
            StateId::Falling => &[L::Falling, L::Airborne, L::Alive],
            StateId::Liftoff => &[L::Liftoff, L::Airborne, L::Alive],
        }
    }

    /// Whether `layer` is part of this state's lineage.
    pub fn is_in(self, layer: Layer) -> bool {
        self.lineage().contains(&layer)
    }

    /// Layers entered when moving from `self` to `target`, root first.
    pub fn entered_layers(self, target: StateId) -> impl Iterator<Item = Layer> {
        let from = self.lineage();
        target
            .lineage()
            .iter()
            .rev()
            .copied()
            .filter(move |layer| !from.contains(layer))
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StateId; 11] = [
        StateId::Disabled,
        StateId::Dead,
        StateId::Idle,
        StateId::Moving,
        StateId::Sprinting,
        StateId::CrouchIdle,
        StateId::CrouchMoving,
        StateId::Dashing,
        StateId::Jumping,
        StateId::Falling,
        StateId::Liftoff,
    ];

    #[test]
    fn test_every_lineage_starts_at_its_leaf() {
        for state in ALL {
            let first = state.lineage()[0];
            assert_eq!(format!("{first:?}"), format!("{state:?}"));
        }
    }

    #[test]
    fn test_grounded_and_airborne_are_exclusive() {
        for state in ALL {
            assert!(!(state.is_in(Layer::Grounded) && state.is_in(Layer::Airborne)));
        }
        assert!(StateId::Dashing.is_in(Layer::Grounded));
        assert!(StateId::Sprinting.is_in(Layer::Moving));
        assert!(!StateId::Disabled.is_in(Layer::Alive));
    }

    #[test]
    fn test_entered_layers_skips_shared_ancestors() {
        let entered: Vec<Layer> = StateId::Idle.entered_layers(StateId::Sprinting).collect();
        assert_eq!(entered, vec![Layer::Moving, Layer::Sprinting]);

        let entered: Vec<Layer> = StateId::Moving.entered_layers(StateId::Sprinting).collect();
        assert_eq!(entered, vec![Layer::Sprinting]);

        let entered: Vec<Layer> = StateId::Disabled.entered_layers(StateId::Idle).collect();
        assert_eq!(entered, vec![Layer::Alive, Layer::Grounded, Layer::Idle]);
    }
}
