use std::marker::PhantomData;

use bevy::prelude::{App, Plugin, Res, Update};

use crate::controller::{CoroutineController, FaultPolicy};

/// Inserts a [`CoroutineController<Y>`] resource and updates it once per frame, during
/// [`Update`].
pub struct CoroutinePlugin<Y = ()> {
    pub fault_policy: FaultPolicy,
    _phantom: PhantomData<fn() -> Y>,
}

impl<Y> CoroutinePlugin<Y> {
    pub fn new(fault_policy: FaultPolicy) -> Self {
        Self {
            fault_policy,
            _phantom: PhantomData,
        }
    }
}

impl<Y> Default for CoroutinePlugin<Y> {
    fn default() -> Self {
        Self::new(FaultPolicy::default())
    }
}

impl<Y: Send + 'static> Plugin for CoroutinePlugin<Y> {
    fn build(&self, app: &mut App) {
        app.insert_resource(CoroutineController::<Y>::with_policy(self.fault_policy))
            .add_systems(Update, run_coroutines::<Y>);
    }
}

/// Steps all coroutines of the [`CoroutineController<Y>`] resource.
pub fn run_coroutines<Y: Send + 'static>(controller: Res<CoroutineController<Y>>) {
    controller.update();
}
