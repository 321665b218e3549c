use super::store::EntityStore;

/// Per-tick game logic run by [`EntityStore::update`] after incoming state
/// has been applied and before deleted entities are culled.
pub trait EntitySystem {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn update(&mut self, store: &mut EntityStore, frame_time: f32);
}

impl<F> EntitySystem for F
where
    F: FnMut(&mut EntityStore, f32),
{
    fn update(&mut self, store: &mut EntityStore, frame_time: f32) {
        self(store, frame_time)
    }
}
